use alloc::format;

use crate::bmp::{InfoHeader, MemoryRequirements};
use crate::error::BmpError;

/// Caps checked against a [`crate::Prepass`] before a decode allocates.
///
/// Every field defaults to `None` (unlimited).
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    /// Applied to `abs(height)`.
    pub max_height: Option<u64>,
    /// Maximum `width * abs(height)`.
    pub max_pixels: Option<u64>,
    /// Maximum size of any one buffer requested from the allocator.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Check header dimensions and every buffer a decode would request.
    pub(crate) fn check_header(
        &self,
        info: &InfoHeader,
        requirements: &MemoryRequirements,
    ) -> Result<(), BmpError> {
        let width = u64::from(info.width_px());
        let height = u64::from(info.abs_height());
        exceeds("width", width, self.max_width)?;
        exceeds("height", height, self.max_height)?;
        exceeds("pixel count", width * height, self.max_pixels)?;

        for (buffer, size) in [
            ("bitmap buffer", requirements.bitmap_buffer_size),
            ("color table", requirements.color_table_buffer_size),
            ("pixel data", requirements.pixel_data_buffer_size),
        ] {
            exceeds(buffer, size as u64, self.max_memory_bytes)?;
        }
        Ok(())
    }
}

fn exceeds(what: &str, value: u64, limit: Option<u64>) -> Result<(), BmpError> {
    match limit {
        Some(max) if value > max => Err(BmpError::LimitExceeded(format!(
            "{what} {value} exceeds limit {max}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmp::CompressionKind;

    fn info(width: i32, height: i32) -> InfoHeader {
        InfoHeader {
            width,
            height,
            bits_per_pixel: 8,
            compression: CompressionKind::Rgb,
            image_size: 0,
            colors_used: 0,
            important_colors: 0,
        }
    }

    fn requirements(pixel_data: usize) -> MemoryRequirements {
        MemoryRequirements {
            bitmap_buffer_size: 400,
            color_table_buffer_size: 1024,
            pixel_data_buffer_size: pixel_data,
        }
    }

    #[test]
    fn unlimited_by_default() {
        let limits = Limits::default();
        assert!(limits.check_header(&info(i32::MAX, i32::MIN), &requirements(usize::MAX)).is_ok());
    }

    #[test]
    fn height_limit_ignores_sign() {
        let limits = Limits {
            max_height: Some(9),
            ..Default::default()
        };
        assert!(limits.check_header(&info(10, -9), &requirements(0)).is_ok());
        assert!(limits.check_header(&info(10, -10), &requirements(0)).is_err());
    }

    #[test]
    fn pixel_limit_uses_product() {
        let limits = Limits {
            max_pixels: Some(100),
            ..Default::default()
        };
        assert!(limits.check_header(&info(10, 10), &requirements(0)).is_ok());
        assert!(matches!(
            limits.check_header(&info(10, 11), &requirements(0)),
            Err(BmpError::LimitExceeded(_))
        ));
    }

    #[test]
    fn memory_limit_names_the_buffer() {
        let limits = Limits {
            max_memory_bytes: Some(1024),
            ..Default::default()
        };
        assert!(limits.check_header(&info(10, 10), &requirements(1024)).is_ok());
        match limits.check_header(&info(10, 10), &requirements(1025)) {
            Err(BmpError::LimitExceeded(msg)) => assert!(msg.starts_with("pixel data"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
