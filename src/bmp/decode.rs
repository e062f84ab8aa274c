//! Pixel-data decoder: raw BMP pixel bytes to a top-down BGRA framebuffer.
//!
//! Rows are visited in file storage order; [`Traversal`] maps each stored
//! row onto its output row so no flip pass is needed afterwards.

use enough::Stop;

use super::bitfields::{self, Bitfields};
use super::header::{CompressionKind, InfoHeader};
use super::measure::{row_payload, row_stride};
use super::rle::{self, RleDeltaMode};
use crate::error::BmpError;
use crate::pixel::{COLOR_SIZE, write_opaque};

/// Output-row iteration order derived from the signed height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Traversal {
    /// Output row of the first stored row.
    pub start: i64,
    /// One past the last output row, in `direction`.
    pub end: i64,
    /// `-1` for bottom-up storage, `+1` for top-down.
    pub direction: i64,
}

impl Traversal {
    pub(crate) fn new(height: i32) -> Self {
        let rows = i64::from(height.unsigned_abs());
        if height >= 0 {
            Self {
                start: rows - 1,
                end: -1,
                direction: -1,
            }
        } else {
            Self {
                start: 0,
                end: rows,
                direction: 1,
            }
        }
    }

    /// Output row indices in storage order.
    pub(crate) fn rows(self) -> impl Iterator<Item = usize> {
        let mut row = self.start;
        core::iter::from_fn(move || {
            if row == self.end {
                return None;
            }
            let current = row as usize;
            row += self.direction;
            Some(current)
        })
    }
}

/// Everything the decoder reads: header, palette, masks and raw pixel bytes.
pub(crate) struct PixelSource<'a> {
    pub info: &'a InfoHeader,
    /// Raw BGRA palette entries (empty for direct color).
    pub palette: &'a [u8],
    pub bitfields: Option<Bitfields>,
    pub pixels: &'a [u8],
}

/// Decode `src` into `out`, a `4 * width * abs(height)` BGRA buffer.
pub(crate) fn decode_pixel_data(
    src: &PixelSource<'_>,
    out: &mut [u8],
    rle_delta: RleDeltaMode,
    stop: &dyn Stop,
) -> Result<(), BmpError> {
    let info = src.info;
    let needed = (info.width_px() as usize)
        .checked_mul(info.abs_height() as usize)
        .and_then(|px| px.checked_mul(COLOR_SIZE))
        .ok_or(BmpError::DimensionsTooLarge {
            width: info.width_px(),
            height: info.abs_height(),
        })?;
    if out.len() < needed {
        return Err(BmpError::BufferTooSmall {
            needed,
            actual: out.len(),
        });
    }
    let out = &mut out[..needed];
    let traversal = Traversal::new(info.height);

    match info.compression {
        CompressionKind::Rgb => match info.bits_per_pixel {
            1 | 2 | 4 | 8 => {
                log::debug!("indexed decode, {} bpp", info.bits_per_pixel);
                decode_indexed(src, traversal, out, stop)
            }
            16 | 24 | 32 => {
                let fields = bitfields::resolve(info, None)?;
                log::debug!("direct-color decode, {} bpp, default masks", info.bits_per_pixel);
                decode_direct(src, &fields, traversal, out, stop)
            }
            bpp => Err(BmpError::UnsupportedBitDepth(bpp)),
        },
        CompressionKind::Bitfields | CompressionKind::AlphaBitfields => {
            let fields = bitfields::resolve(info, src.bitfields)?;
            log::debug!("direct-color decode, masks {:08x?}", fields.masks());
            decode_direct(src, &fields, traversal, out, stop)
        }
        CompressionKind::Rle8 | CompressionKind::Rle4 => {
            log::debug!("{:?} decode", info.compression);
            rle::decode(src, traversal, rle_delta, out, stop)
        }
        unsupported @ (CompressionKind::Jpeg
        | CompressionKind::Png
        | CompressionKind::Cmyk
        | CompressionKind::CmykRle8
        | CompressionKind::CmykRle4) => Err(BmpError::UnsupportedCompression(unsupported)),
    }
}

/// Copy palette entry `index` into `out` as an opaque pixel.
#[inline]
pub(crate) fn write_palette_entry(palette: &[u8], index: usize, out: &mut [u8]) {
    let off = index * COLOR_SIZE;
    match palette.get(off..off + COLOR_SIZE) {
        Some(entry) => write_opaque(out, entry[0], entry[1], entry[2]),
        None => write_opaque(out, 0, 0, 0),
    }
}

fn stored_rows<'a>(src: &PixelSource<'a>) -> Result<impl Iterator<Item = &'a [u8]>, BmpError> {
    let info = src.info;
    let stride = usize::try_from(row_stride(info.bits_per_pixel, info.width_px()))
        .map_err(|_| BmpError::DimensionsTooLarge {
            width: info.width_px(),
            height: info.abs_height(),
        })?;
    let payload = row_payload(info.bits_per_pixel, info.width_px()) as usize;
    let pixels = src.pixels;
    let rows = info.abs_height() as usize;
    let needed = stride.checked_mul(rows).ok_or(BmpError::TruncatedStream)?;
    if pixels.len() < needed {
        log::debug!("pixel data has {} bytes, rows need {needed}", pixels.len());
        return Err(BmpError::TruncatedStream);
    }
    Ok((0..rows).map(move |i| &pixels[i * stride..i * stride + payload]))
}

/// Palette-indexed rows at 1, 2, 4 or 8 bits per pixel.
fn decode_indexed(
    src: &PixelSource<'_>,
    traversal: Traversal,
    out: &mut [u8],
    stop: &dyn Stop,
) -> Result<(), BmpError> {
    let bpp = usize::from(src.info.bits_per_pixel);
    let width = src.info.width_px() as usize;
    let pixels_per_byte = 8 / bpp;
    let bitmask: u8 = ((1u16 << bpp) - 1) as u8;
    let row_bytes = width * COLOR_SIZE;

    for (stored, (row, row_data)) in traversal.rows().zip(stored_rows(src)?).enumerate() {
        if stored % 16 == 0 {
            stop.check()?;
        }
        let out_row = &mut out[row * row_bytes..(row + 1) * row_bytes];
        for (col, px) in out_row.chunks_exact_mut(COLOR_SIZE).enumerate() {
            let byte_index = col / pixels_per_byte;
            let bit_shift = (pixels_per_byte - 1 - col % pixels_per_byte) * bpp;
            let index = (row_data[byte_index] >> bit_shift) & bitmask;
            write_palette_entry(src.palette, usize::from(index), px);
        }
    }
    Ok(())
}

/// Direct-color rows at 16, 24 or 32 bits per pixel.
///
/// Alpha is written as 255 even when the masks carry an alpha channel.
fn decode_direct(
    src: &PixelSource<'_>,
    fields: &Bitfields,
    traversal: Traversal,
    out: &mut [u8],
    stop: &dyn Stop,
) -> Result<(), BmpError> {
    let bytes_per_pixel = usize::from(src.info.bits_per_pixel / 8);
    let width = src.info.width_px() as usize;
    let row_bytes = width * COLOR_SIZE;

    for (stored, (row, row_data)) in traversal.rows().zip(stored_rows(src)?).enumerate() {
        if stored % 16 == 0 {
            stop.check()?;
        }
        let out_row = &mut out[row * row_bytes..(row + 1) * row_bytes];
        for (raw, px) in row_data
            .chunks_exact(bytes_per_pixel)
            .zip(out_row.chunks_exact_mut(COLOR_SIZE))
        {
            let value = raw
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << (8 * i)));
            write_opaque(
                px,
                fields.blue.extract_and_normalize(value),
                fields.green.extract_and_normalize(value),
                fields.red.extract_and_normalize(value),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use enough::Unstoppable;

    use super::*;

    fn info(width: i32, height: i32, bpp: u16, compression: CompressionKind) -> InfoHeader {
        InfoHeader {
            width,
            height,
            bits_per_pixel: bpp,
            compression,
            image_size: 0,
            colors_used: 0,
            important_colors: 0,
        }
    }

    fn run(src: &PixelSource<'_>) -> Result<Vec<u8>, BmpError> {
        let mut out = vec![0u8; src.info.width_px() as usize * src.info.abs_height() as usize * 4];
        decode_pixel_data(src, &mut out, RleDeltaMode::Skip, &Unstoppable)?;
        Ok(out)
    }

    #[test]
    fn traversal_orders() {
        let up: Vec<usize> = Traversal::new(3).rows().collect();
        assert_eq!(up, [2, 1, 0]);
        let down: Vec<usize> = Traversal::new(-3).rows().collect();
        assert_eq!(down, [0, 1, 2]);
        assert_eq!(Traversal::new(3).direction, -1);
        assert_eq!(Traversal::new(-3).direction, 1);
    }

    #[test]
    fn indexed_8bit_single_pixel() {
        let mut palette = vec![0u8; 1024];
        palette[20..24].copy_from_slice(&[10, 20, 30, 0]);
        let header = info(1, 1, 8, CompressionKind::Rgb);
        let pixels = [0x05, 0, 0, 0];
        let src = PixelSource {
            info: &header,
            palette: &palette,
            bitfields: None,
            pixels: &pixels,
        };
        assert_eq!(run(&src).unwrap(), [10, 20, 30, 255]);
    }

    #[test]
    fn indexed_1bit_msb_first() {
        let palette = [0, 0, 0, 0, 255, 255, 255, 0];
        let header = info(10, -1, 1, CompressionKind::Rgb);
        // 1011_0000 01xx_xxxx
        let pixels = [0b1011_0000, 0b0100_0000, 0, 0];
        let src = PixelSource {
            info: &header,
            palette: &palette,
            bitfields: None,
            pixels: &pixels,
        };
        let out = run(&src).unwrap();
        let bits: Vec<u8> = out.chunks_exact(4).map(|p| p[0] / 255).collect();
        assert_eq!(bits, [1, 0, 1, 1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn indexed_2bit_and_4bit() {
        let mut palette = vec![0u8; 64];
        for i in 0..16 {
            palette[i * 4] = i as u8;
        }
        let header = info(4, 1, 2, CompressionKind::Rgb);
        let pixels = [0b00_01_10_11, 0, 0, 0];
        let src = PixelSource {
            info: &header,
            palette: &palette,
            bitfields: None,
            pixels: &pixels,
        };
        let blues: Vec<u8> = run(&src).unwrap().chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(blues, [0, 1, 2, 3]);

        let header = info(3, 1, 4, CompressionKind::Rgb);
        let pixels = [0xAB, 0xC0, 0, 0];
        let src = PixelSource {
            info: &header,
            palette: &palette,
            bitfields: None,
            pixels: &pixels,
        };
        let blues: Vec<u8> = run(&src).unwrap().chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(blues, [0xA, 0xB, 0xC]);
    }

    #[test]
    fn bottom_up_rows_land_reversed() {
        let header = info(1, 2, 24, CompressionKind::Rgb);
        // stored row 0 (bottom) is blue, stored row 1 (top) is red
        let pixels = [255, 0, 0, 0, 0, 0, 255, 0];
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &pixels,
        };
        assert_eq!(run(&src).unwrap(), [0, 0, 255, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn rgb555_default_masks() {
        let header = info(1, 1, 16, CompressionKind::Rgb);
        // r=31 g=0 b=16
        let value: u16 = (31 << 10) | 16;
        let [lo, hi] = value.to_le_bytes();
        let pixels = [lo, hi, 0, 0];
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &pixels,
        };
        assert_eq!(run(&src).unwrap(), [131, 0, 255, 255]);
    }

    #[test]
    fn alpha_bitfields_still_opaque() {
        let header = info(1, 1, 32, CompressionKind::AlphaBitfields);
        let fields = Bitfields::from_masks(0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000);
        let pixels = [1, 2, 3, 0x10];
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: Some(fields),
            pixels: &pixels,
        };
        assert_eq!(run(&src).unwrap(), [3, 2, 1, 255]);
    }

    #[test]
    fn missing_masks_are_rejected() {
        let header = info(1, 1, 32, CompressionKind::Bitfields);
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 4],
        };
        assert!(matches!(run(&src), Err(BmpError::InvalidHeader(_))));
    }

    #[test]
    fn short_pixel_data_is_truncated() {
        let header = info(2, 2, 24, CompressionKind::Rgb);
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 12],
        };
        assert!(matches!(run(&src), Err(BmpError::TruncatedStream)));
        // every row carries its padding, the last one included
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 14],
        };
        assert!(matches!(run(&src), Err(BmpError::TruncatedStream)));
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 16],
        };
        assert!(run(&src).is_ok());
    }

    #[test]
    fn unsupported_compression_fails() {
        let header = info(1, 1, 24, CompressionKind::Png);
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 4],
        };
        assert!(matches!(
            run(&src),
            Err(BmpError::UnsupportedCompression(CompressionKind::Png))
        ));
    }

    #[test]
    fn small_output_buffer_rejected() {
        let header = info(2, 1, 24, CompressionKind::Rgb);
        let src = PixelSource {
            info: &header,
            palette: &[],
            bitfields: None,
            pixels: &[0; 8],
        };
        let mut out = [0u8; 4];
        assert!(matches!(
            decode_pixel_data(&src, &mut out, RleDeltaMode::Skip, &Unstoppable),
            Err(BmpError::BufferTooSmall { needed: 8, actual: 4 })
        ));
    }
}
