//! RLE4/RLE8 decoding as an explicit state machine.
//!
//! The stream is a sequence of two-byte records. A non-zero first byte is an
//! encoded run; a zero first byte is an escape whose second byte selects
//! end-of-line (0), end-of-bitmap (1), delta (2) or an absolute run (3..=255).
//! Absolute runs are padded so every record spans an even number of bytes.

use enough::Stop;

use super::cursor::Cursor;
use super::decode::{PixelSource, Traversal, write_palette_entry};
use super::header::CompressionKind;
use crate::error::BmpError;
use crate::pixel::COLOR_SIZE;

/// What to do with the pixels a delta record jumps over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RleDeltaMode {
    /// Leave skipped pixels untouched (zeroed, fully transparent).
    #[default]
    Skip,
    /// Paint skipped pixels with this palette index.
    Fill(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Nibbles {
    /// One palette index per byte.
    Rle8,
    /// Two palette indices per byte, high nibble first.
    Rle4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RleState {
    ScanControlPair,
    EndOfLine,
    EndOfBitmap,
    Delta,
    AbsoluteRun { count: u8 },
    EncodedRun { count: u8, value: u8 },
}

struct RleDecoder<'s, 'o> {
    cursor: Cursor<'s>,
    palette: &'s [u8],
    out: &'o mut [u8],
    nibbles: Nibbles,
    width: i64,
    height: i64,
    direction: i64,
    row: i64,
    col: i64,
    delta_mode: RleDeltaMode,
}

/// Decode an RLE4 or RLE8 stream from `src` into the BGRA buffer `out`.
pub(crate) fn decode(
    src: &PixelSource<'_>,
    traversal: Traversal,
    delta_mode: RleDeltaMode,
    out: &mut [u8],
    stop: &dyn Stop,
) -> Result<(), BmpError> {
    let nibbles = match src.info.compression {
        CompressionKind::Rle8 => Nibbles::Rle8,
        CompressionKind::Rle4 => Nibbles::Rle4,
        other => return Err(BmpError::UnsupportedCompression(other)),
    };
    let decoder = RleDecoder {
        cursor: Cursor::new(src.pixels),
        palette: src.palette,
        out,
        nibbles,
        width: i64::from(src.info.width_px()),
        height: i64::from(src.info.abs_height()),
        direction: traversal.direction,
        row: traversal.start,
        col: 0,
        delta_mode,
    };
    decoder.run(stop)
}

impl RleDecoder<'_, '_> {
    fn run(mut self, stop: &dyn Stop) -> Result<(), BmpError> {
        let mut state = RleState::ScanControlPair;
        let mut records = 0u32;
        while state != RleState::EndOfBitmap {
            if state == RleState::ScanControlPair {
                records = records.wrapping_add(1);
                if records % 1024 == 0 {
                    stop.check()?;
                }
            }
            state = self.step(state)?;
        }
        if self.cursor.remaining() > 0 {
            log::warn!(
                "{} bytes after RLE end-of-bitmap ignored",
                self.cursor.remaining()
            );
        }
        Ok(())
    }

    /// Execute one state and return its successor.
    fn step(&mut self, state: RleState) -> Result<RleState, BmpError> {
        match state {
            RleState::ScanControlPair => self.scan_control_pair(),
            RleState::EndOfLine => {
                self.col = 0;
                self.row += self.direction;
                Ok(RleState::ScanControlPair)
            }
            RleState::EndOfBitmap => Ok(RleState::EndOfBitmap),
            RleState::Delta => self.delta(),
            RleState::AbsoluteRun { count } => self.absolute_run(count),
            RleState::EncodedRun { count, value } => self.encoded_run(count, value),
        }
    }

    fn scan_control_pair(&mut self) -> Result<RleState, BmpError> {
        let first = self.cursor.read_u8()?;
        let second = self.cursor.read_u8()?;
        Ok(match (first, second) {
            (0, 0) => RleState::EndOfLine,
            (0, 1) => RleState::EndOfBitmap,
            (0, 2) => RleState::Delta,
            (0, count) => RleState::AbsoluteRun { count },
            (count, value) => RleState::EncodedRun { count, value },
        })
    }

    fn delta(&mut self) -> Result<RleState, BmpError> {
        let dx = i64::from(self.cursor.read_u8()?);
        let dy = i64::from(self.cursor.read_u8()?);
        let target_row = self.row + dy * self.direction;
        let target_col = self.col + dx;
        if let RleDeltaMode::Fill(index) = self.delta_mode {
            if dy == 0 {
                self.fill_span(self.row, self.col, target_col, index);
            } else {
                self.fill_span(self.row, self.col, self.width, index);
                let mut row = self.row + self.direction;
                while row != target_row {
                    self.fill_span(row, 0, self.width, index);
                    row += self.direction;
                }
                self.fill_span(target_row, 0, target_col, index);
            }
        }
        self.row = target_row;
        self.col = target_col;
        Ok(RleState::ScanControlPair)
    }

    fn absolute_run(&mut self, count: u8) -> Result<RleState, BmpError> {
        let count = usize::from(count);
        let byte_len = match self.nibbles {
            Nibbles::Rle8 => count,
            Nibbles::Rle4 => count.div_ceil(2),
        };
        let literal = self.cursor.read_bytes(byte_len)?;
        self.check_span(count, "absolute run crosses the end of the row")?;
        for i in 0..count {
            let index = match self.nibbles {
                Nibbles::Rle8 => literal[i],
                Nibbles::Rle4 => nibble(literal[i / 2], i),
            };
            self.emit(index)?;
        }
        if byte_len % 2 == 1 {
            self.cursor.skip(1)?;
        }
        Ok(RleState::ScanControlPair)
    }

    fn encoded_run(&mut self, count: u8, value: u8) -> Result<RleState, BmpError> {
        let count = usize::from(count);
        self.check_span(count, "encoded run crosses the end of the row")?;
        for i in 0..count {
            let index = match self.nibbles {
                Nibbles::Rle8 => value,
                Nibbles::Rle4 => nibble(value, i),
            };
            self.emit(index)?;
        }
        Ok(RleState::ScanControlPair)
    }

    fn check_span(&self, count: usize, what: &'static str) -> Result<(), BmpError> {
        if self.col + count as i64 > self.width {
            return Err(BmpError::MalformedRle(what));
        }
        Ok(())
    }

    fn emit(&mut self, index: u8) -> Result<(), BmpError> {
        let slot = self
            .slot(self.row, self.col)
            .ok_or(BmpError::MalformedRle("pixel outside the image"))?;
        write_palette_entry(
            self.palette,
            usize::from(index),
            &mut self.out[slot..slot + COLOR_SIZE],
        );
        self.col += 1;
        Ok(())
    }

    /// Paint `[from, to)` of `row`, clipped to the image.
    fn fill_span(&mut self, row: i64, from: i64, to: i64, index: u8) {
        for col in from.max(0)..to.min(self.width) {
            if let Some(slot) = self.slot(row, col) {
                write_palette_entry(
                    self.palette,
                    usize::from(index),
                    &mut self.out[slot..slot + COLOR_SIZE],
                );
            }
        }
    }

    fn slot(&self, row: i64, col: i64) -> Option<usize> {
        if !(0..self.height).contains(&row) || !(0..self.width).contains(&col) {
            return None;
        }
        Some(((row * self.width + col) as usize) * COLOR_SIZE)
    }
}

/// The `i`-th pixel of a nibble pair: even positions take the high nibble.
#[inline]
fn nibble(byte: u8, i: usize) -> u8 {
    if i % 2 == 0 { byte >> 4 } else { byte & 0x0F }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use enough::Unstoppable;

    use super::*;
    use crate::bmp::header::InfoHeader;

    /// Palette where entry `i` is `{b: i, g: 0, r: 0}`.
    fn ramp_palette(entries: usize) -> Vec<u8> {
        let mut palette = vec![0u8; entries * 4];
        for (i, entry) in palette.chunks_exact_mut(4).enumerate() {
            entry[0] = i as u8;
        }
        palette
    }

    fn decoder<'s, 'o>(
        stream: &'s [u8],
        palette: &'s [u8],
        out: &'o mut [u8],
        nibbles: Nibbles,
        width: i64,
        height: i64,
    ) -> RleDecoder<'s, 'o> {
        RleDecoder {
            cursor: Cursor::new(stream),
            palette,
            out,
            nibbles,
            width,
            height,
            direction: -1,
            row: height - 1,
            col: 0,
            delta_mode: RleDeltaMode::Skip,
        }
    }

    fn blues(out: &[u8]) -> Vec<u8> {
        out.chunks_exact(4).map(|p| p[0]).collect()
    }

    fn decode_stream(
        stream: &[u8],
        compression: CompressionKind,
        width: i32,
        height: i32,
        delta_mode: RleDeltaMode,
    ) -> Result<Vec<u8>, BmpError> {
        let info = InfoHeader {
            width,
            height,
            bits_per_pixel: if compression == CompressionKind::Rle8 { 8 } else { 4 },
            compression,
            image_size: stream.len() as u32,
            colors_used: 0,
            important_colors: 0,
        };
        let palette = ramp_palette(256);
        let src = PixelSource {
            info: &info,
            palette: &palette,
            bitfields: None,
            pixels: stream,
        };
        let mut out = vec![0u8; width as usize * height.unsigned_abs() as usize * 4];
        decode(&src, Traversal::new(height), delta_mode, &mut out, &Unstoppable)?;
        Ok(out)
    }

    #[test]
    fn scan_classifies_records() {
        let stream = [0, 0, 0, 1, 0, 2, 0, 3, 5, 9];
        let palette = ramp_palette(1);
        let mut out = [0u8; 4];
        let mut dec = decoder(&stream, &palette, &mut out, Nibbles::Rle8, 1, 1);
        assert_eq!(dec.scan_control_pair().unwrap(), RleState::EndOfLine);
        assert_eq!(dec.scan_control_pair().unwrap(), RleState::EndOfBitmap);
        assert_eq!(dec.scan_control_pair().unwrap(), RleState::Delta);
        assert_eq!(
            dec.scan_control_pair().unwrap(),
            RleState::AbsoluteRun { count: 3 }
        );
        assert_eq!(
            dec.scan_control_pair().unwrap(),
            RleState::EncodedRun { count: 5, value: 9 }
        );
        assert!(matches!(
            dec.scan_control_pair(),
            Err(BmpError::TruncatedStream)
        ));
    }

    #[test]
    fn end_of_line_moves_by_direction() {
        let palette = ramp_palette(1);
        let mut out = [0u8; 8];
        let mut dec = decoder(&[], &palette, &mut out, Nibbles::Rle8, 1, 2);
        dec.col = 1;
        assert_eq!(
            dec.step(RleState::EndOfLine).unwrap(),
            RleState::ScanControlPair
        );
        assert_eq!((dec.row, dec.col), (0, 0));
    }

    #[test]
    fn rle8_absolute_consumes_padding() {
        let stream = [0x00, 0x03, 0x01, 0x02, 0x03, 0x00];
        let palette = ramp_palette(256);
        let mut out = [0u8; 3 * 4];
        let mut dec = decoder(&stream, &palette, &mut out, Nibbles::Rle8, 3, 1);
        let state = dec.step(RleState::ScanControlPair).unwrap();
        assert_eq!(state, RleState::AbsoluteRun { count: 3 });
        assert_eq!(dec.step(state).unwrap(), RleState::ScanControlPair);
        assert_eq!(dec.cursor.position(), 6);
        assert_eq!(dec.col, 3);
        assert_eq!(blues(&out), [1, 2, 3]);
    }

    #[test]
    fn rle4_absolute_padding_follows_byte_count() {
        // 3 pixels -> 2 bytes, even, no pad
        let stream = [0x12, 0x30, 0xAA];
        let palette = ramp_palette(16);
        let mut out = [0u8; 4 * 4];
        let mut dec = decoder(&stream, &palette, &mut out, Nibbles::Rle4, 4, 1);
        dec.step(RleState::AbsoluteRun { count: 3 }).unwrap();
        assert_eq!(dec.cursor.position(), 2);
        assert_eq!(blues(&out)[..3], [1, 2, 3]);

        // 5 pixels -> 3 bytes, odd, one pad byte
        let stream = [0x12, 0x34, 0x50, 0x00];
        let mut out = [0u8; 5 * 4];
        let mut dec = decoder(&stream, &palette, &mut out, Nibbles::Rle4, 5, 1);
        dec.step(RleState::AbsoluteRun { count: 5 }).unwrap();
        assert_eq!(dec.cursor.position(), 4);
        assert_eq!(blues(&out), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn rle4_run_alternates_per_pixel() {
        let palette = ramp_palette(16);
        let mut out = [0u8; 5 * 4];
        let mut dec = decoder(&[], &palette, &mut out, Nibbles::Rle4, 5, 1);
        dec.step(RleState::EncodedRun {
            count: 5,
            value: 0x9C,
        })
        .unwrap();
        assert_eq!(dec.cursor.position(), 0);
        assert_eq!(blues(&out), [9, 12, 9, 12, 9]);
    }

    #[test]
    fn runs_past_row_end_are_malformed() {
        let palette = ramp_palette(256);
        let mut out = [0u8; 2 * 4];
        let mut dec = decoder(&[], &palette, &mut out, Nibbles::Rle8, 2, 1);
        assert!(matches!(
            dec.step(RleState::EncodedRun { count: 3, value: 1 }),
            Err(BmpError::MalformedRle(_))
        ));
        let stream = [1, 2, 3, 0];
        let mut dec = decoder(&stream, &palette, &mut out, Nibbles::Rle8, 2, 1);
        assert!(matches!(
            dec.step(RleState::AbsoluteRun { count: 3 }),
            Err(BmpError::MalformedRle(_))
        ));
    }

    #[test]
    fn pixels_above_image_are_malformed() {
        // EOL moves past the top row, then a run tries to paint there.
        let stream = [0, 0, 1, 4, 0, 1];
        assert!(matches!(
            decode_stream(&stream, CompressionKind::Rle8, 1, 1, RleDeltaMode::Skip),
            Err(BmpError::MalformedRle(_))
        ));
    }

    #[test]
    fn rle8_single_run_row() {
        let stream = [0x04, 0x07, 0x00, 0x00, 0x00, 0x01];
        let out = decode_stream(&stream, CompressionKind::Rle8, 4, 1, RleDeltaMode::Skip).unwrap();
        assert_eq!(blues(&out), [7, 7, 7, 7]);
        assert!(out.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[test]
    fn bottom_up_rows_fill_from_the_end() {
        // stored row 0 = bottom row
        let stream = [2, 5, 0, 0, 2, 6, 0, 1];
        let out = decode_stream(&stream, CompressionKind::Rle8, 2, 2, RleDeltaMode::Skip).unwrap();
        assert_eq!(blues(&out), [6, 6, 5, 5]);
        let out = decode_stream(&stream, CompressionKind::Rle8, 2, -2, RleDeltaMode::Skip).unwrap();
        assert_eq!(blues(&out), [5, 5, 6, 6]);
    }

    #[test]
    fn end_of_bitmap_ignores_trailing_bytes() {
        let stream = [1, 3, 0, 1, 0xFF, 0xFF, 0xFF];
        let out = decode_stream(&stream, CompressionKind::Rle8, 2, 1, RleDeltaMode::Skip).unwrap();
        assert_eq!(out, [3, 0, 0, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn missing_end_of_bitmap_is_truncated() {
        let stream = [2, 3, 0, 0];
        assert!(matches!(
            decode_stream(&stream, CompressionKind::Rle8, 2, 1, RleDeltaMode::Skip),
            Err(BmpError::TruncatedStream)
        ));
    }

    #[test]
    fn delta_skips_without_painting() {
        // 3x2, bottom-up. Start bottom-left, jump right 1 and up 1, paint one pixel.
        let stream = [0, 2, 1, 1, 1, 9, 0, 1];
        let out = decode_stream(&stream, CompressionKind::Rle8, 3, 2, RleDeltaMode::Skip).unwrap();
        let alphas: Vec<u8> = out.chunks_exact(4).map(|p| p[3]).collect();
        assert_eq!(alphas, [0, 255, 0, 0, 0, 0]);
        assert_eq!(out[4], 9);
    }

    #[test]
    fn delta_fill_paints_skipped_pixels() {
        let stream = [0, 2, 1, 1, 1, 9, 0, 1];
        let out =
            decode_stream(&stream, CompressionKind::Rle8, 3, 2, RleDeltaMode::Fill(4)).unwrap();
        // bottom row (output row 1) fully skipped, top row col 0 skipped
        assert_eq!(blues(&out), [4, 9, 0, 4, 4, 4]);
        let alphas: Vec<u8> = out.chunks_exact(4).map(|p| p[3]).collect();
        assert_eq!(alphas, [255, 255, 0, 255, 255, 255]);
    }

    #[test]
    fn delta_fill_same_row() {
        let stream = [0, 2, 2, 0, 1, 9, 0, 1];
        let out =
            decode_stream(&stream, CompressionKind::Rle8, 4, 1, RleDeltaMode::Fill(1)).unwrap();
        assert_eq!(blues(&out), [1, 1, 9, 0]);
    }

    #[test]
    fn rle4_full_stream() {
        // run of 3 from 0x12, absolute of 3 (0x45 0x60), EOL, EOB
        let stream = [3, 0x12, 0, 3, 0x45, 0x60, 0, 0, 0, 1];
        let out = decode_stream(&stream, CompressionKind::Rle4, 6, 1, RleDeltaMode::Skip).unwrap();
        assert_eq!(blues(&out), [1, 2, 1, 4, 5, 6]);
    }
}
