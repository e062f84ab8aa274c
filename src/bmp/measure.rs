//! Buffer size arithmetic derived from header fields.

use crate::pixel::COLOR_SIZE;

/// Number of palette entries implied by a bit depth (0 for direct-color depths).
pub const fn color_table_entry_count(bits_per_pixel: u16) -> usize {
    match bits_per_pixel {
        1 => 2,
        2 => 4,
        4 => 16,
        8 => 256,
        _ => 0,
    }
}

/// Size in bytes of the full color table for a bit depth.
pub const fn color_table_size_bytes(bits_per_pixel: u16) -> usize {
    color_table_entry_count(bits_per_pixel) * COLOR_SIZE
}

/// Bytes per stored row, padded to a multiple of 4.
pub const fn row_stride(bits_per_pixel: u16, width: u32) -> u64 {
    (bits_per_pixel as u64 * width as u64).div_ceil(32) * 4
}

/// Bytes of uncompressed pixel data; `None` if the product overflows.
pub const fn pixel_data_size(bits_per_pixel: u16, width: u32, height: i32) -> Option<u64> {
    row_stride(bits_per_pixel, width).checked_mul(height.unsigned_abs() as u64)
}

/// Bytes a single row actually uses, without the alignment padding.
pub(crate) const fn row_payload(bits_per_pixel: u16, width: u32) -> u64 {
    (bits_per_pixel as u64 * width as u64).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTHS: [u16; 7] = [1, 2, 4, 8, 16, 24, 32];

    #[test]
    fn entry_counts() {
        assert_eq!(color_table_entry_count(1), 2);
        assert_eq!(color_table_entry_count(2), 4);
        assert_eq!(color_table_entry_count(4), 16);
        assert_eq!(color_table_entry_count(8), 256);
        assert_eq!(color_table_entry_count(16), 0);
        assert_eq!(color_table_entry_count(24), 0);
        assert_eq!(color_table_entry_count(32), 0);
        assert_eq!(color_table_size_bytes(8), 1024);
    }

    #[test]
    fn stride_is_aligned_and_large_enough() {
        for bpp in DEPTHS {
            for width in 1..=257u32 {
                let stride = row_stride(bpp, width);
                assert_eq!(stride % 4, 0, "bpp {bpp} width {width}");
                assert!(stride * 8 >= u64::from(bpp) * u64::from(width));
                assert!(stride >= row_payload(bpp, width));
            }
        }
    }

    #[test]
    fn known_strides() {
        assert_eq!(row_stride(24, 1), 4);
        assert_eq!(row_stride(24, 3), 12);
        assert_eq!(row_stride(1, 33), 8);
        assert_eq!(row_stride(4, 9), 8);
        assert_eq!(row_stride(32, 5), 20);
    }

    #[test]
    fn pixel_data_ignores_height_sign() {
        assert_eq!(pixel_data_size(24, 3, 2), Some(24));
        assert_eq!(pixel_data_size(24, 3, -2), Some(24));
        assert_eq!(pixel_data_size(32, u32::MAX, i32::MIN), None);
    }
}
