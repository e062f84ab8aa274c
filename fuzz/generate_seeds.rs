#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn header(width: i32, height: i32, bpp: u16, compression: u32, extra: usize, pixels: usize) -> Vec<u8> {
    let offset = 54 + extra;
    let mut bmp = vec![0u8; 54];
    bmp[0] = b'B'; bmp[1] = b'M';
    bmp[2..6].copy_from_slice(&((offset + pixels) as u32).to_le_bytes()); // file size
    bmp[10..14].copy_from_slice(&(offset as u32).to_le_bytes()); // data offset
    bmp[14..18].copy_from_slice(&40u32.to_le_bytes()); // DIB header size
    bmp[18..22].copy_from_slice(&width.to_le_bytes());
    bmp[22..26].copy_from_slice(&height.to_le_bytes());
    bmp[26..28].copy_from_slice(&1u16.to_le_bytes()); // planes
    bmp[28..30].copy_from_slice(&bpp.to_le_bytes());
    bmp[30..34].copy_from_slice(&compression.to_le_bytes());
    if compression != 0 {
        bmp[34..38].copy_from_slice(&(pixels as u32).to_le_bytes()); // image size
    }
    bmp
}

fn main() {
    use std::fs;
    for target in ["fuzz_decode", "fuzz_roundtrip"] {
        let dir = format!("fuzz/corpus/{target}");
        fs::create_dir_all(&dir).unwrap();

        // 1x1 24-bit
        let mut bmp = header(1, 1, 24, 0, 0, 4);
        bmp.extend_from_slice(&[0xff, 0x00, 0x00, 0x00]);
        fs::write(format!("{dir}/rgb24_1x1.bmp"), bmp).unwrap();

        // 2x2 top-down 8-bit with a grey palette
        let mut bmp = header(2, -2, 8, 0, 1024, 8);
        bmp.extend((0..256u32).flat_map(|i| [i as u8, i as u8, i as u8, 0]));
        bmp.extend_from_slice(&[0, 255, 0, 0, 128, 64, 0, 0]);
        fs::write(format!("{dir}/pal8_2x2.bmp"), bmp).unwrap();

        // 4x2 RLE8: run, end of line, absolute, end of bitmap
        let stream = [4, 1, 0, 0, 0, 3, 2, 3, 4, 0, 0, 1];
        let mut bmp = header(4, 2, 8, 1, 1024, stream.len());
        bmp.extend((0..256u32).flat_map(|i| [i as u8, 0, 255 - i as u8, 0]));
        bmp.extend_from_slice(&stream);
        fs::write(format!("{dir}/rle8_4x2.bmp"), bmp).unwrap();

        // 5x1 RLE4 with a delta
        let stream = [3, 0x12, 0, 2, 1, 0, 1, 0xf0, 0, 1];
        let mut bmp = header(5, 1, 4, 2, 64, stream.len());
        bmp.extend((0..16u32).flat_map(|i| [(i * 16) as u8, 0, 0, 0]));
        bmp.extend_from_slice(&stream);
        fs::write(format!("{dir}/rle4_5x1.bmp"), bmp).unwrap();

        // 2x1 16-bit 565 bitfields
        let mut bmp = header(2, 1, 16, 3, 12, 4);
        for mask in [0xF800u32, 0x07E0, 0x001F] {
            bmp.extend_from_slice(&mask.to_le_bytes());
        }
        bmp.extend_from_slice(&[0x00, 0xF8, 0x1F, 0x00]);
        fs::write(format!("{dir}/bitfields565_2x1.bmp"), bmp).unwrap();

        // Truncated/malformed seeds for edge coverage
        fs::write(format!("{dir}/empty.bin"), b"").unwrap();
        fs::write(format!("{dir}/bm_short.bin"), b"BM\x00\x00").unwrap();
        fs::write(format!("{dir}/header_only.bin"), header(16, 16, 24, 0, 0, 768)).unwrap();
    }

    println!("Generated seed corpus in fuzz/corpus/");
}
