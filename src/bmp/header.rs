//! File/info header parsing and the prepass that sizes every decode buffer.
//!
//! Only the classic 40-byte `BITMAPINFOHEADER` layout is understood. Files
//! carrying V4/V5 headers are read at the same fixed offsets and will
//! misparse: the color table is always assumed to start at offset 54.

use alloc::format;

use super::cursor::Cursor;
use super::measure::{color_table_size_bytes, pixel_data_size};
use crate::error::BmpError;
use crate::pixel::COLOR_SIZE;

/// Size of the file header plus the 40-byte info header.
pub const COLOR_TABLE_OFFSET: usize = 54;
/// Size of the `BITMAPINFOHEADER` written by the encoder.
pub const INFO_HEADER_SIZE: u32 = 40;

/// The `biCompression` field.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    Rgb,
    Rle8,
    Rle4,
    Bitfields,
    Jpeg,
    Png,
    AlphaBitfields,
    Cmyk,
    CmykRle8,
    CmykRle4,
}

impl CompressionKind {
    /// Map the on-disk code, `None` for codes outside the known set.
    pub const fn from_u32(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Rgb,
            1 => Self::Rle8,
            2 => Self::Rle4,
            3 => Self::Bitfields,
            4 => Self::Jpeg,
            5 => Self::Png,
            6 => Self::AlphaBitfields,
            11 => Self::Cmyk,
            12 => Self::CmykRle8,
            13 => Self::CmykRle4,
            _ => return None,
        })
    }

    pub const fn to_u32(self) -> u32 {
        match self {
            Self::Rgb => 0,
            Self::Rle8 => 1,
            Self::Rle4 => 2,
            Self::Bitfields => 3,
            Self::Jpeg => 4,
            Self::Png => 5,
            Self::AlphaBitfields => 6,
            Self::Cmyk => 11,
            Self::CmykRle8 => 12,
            Self::CmykRle4 => 13,
        }
    }

    /// Whether this crate can decode pixel data stored with this compression.
    pub const fn is_decodable(self) -> bool {
        match self {
            Self::Rgb | Self::Rle8 | Self::Rle4 | Self::Bitfields | Self::AlphaBitfields => true,
            Self::Jpeg | Self::Png | Self::Cmyk | Self::CmykRle8 | Self::CmykRle4 => false,
        }
    }

    pub const fn is_rle(self) -> bool {
        matches!(self, Self::Rle8 | Self::Rle4)
    }

    /// Number of explicit channel masks stored after the info header.
    pub const fn mask_count(self) -> usize {
        match self {
            Self::Bitfields => 3,
            Self::AlphaBitfields => 4,
            _ => 0,
        }
    }
}

/// The 14-byte `BITMAPFILEHEADER` fields that matter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    pub file_size: u32,
    /// Absolute byte offset of the pixel data.
    pub data_offset: u32,
}

/// The `BITMAPINFOHEADER` fields that matter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoHeader {
    pub width: i32,
    /// Positive: rows stored bottom-up. Negative: top-down.
    pub height: i32,
    pub bits_per_pixel: u16,
    pub compression: CompressionKind,
    pub image_size: u32,
    pub colors_used: u32,
    pub important_colors: u32,
}

impl InfoHeader {
    /// Width as an unsigned pixel count. Valid after [`InfoHeader::validate`].
    pub fn width_px(&self) -> u32 {
        self.width.unsigned_abs()
    }

    pub fn abs_height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    pub fn is_bottom_up(&self) -> bool {
        self.height >= 0
    }

    pub fn has_palette(&self) -> bool {
        self.bits_per_pixel <= 8
    }

    /// Check the field combinations the decoder relies on.
    pub fn validate(&self) -> Result<(), BmpError> {
        if !matches!(self.bits_per_pixel, 1 | 2 | 4 | 8 | 16 | 24 | 32) {
            return Err(BmpError::UnsupportedBitDepth(self.bits_per_pixel));
        }
        if !self.compression.is_decodable() {
            return Err(BmpError::UnsupportedCompression(self.compression));
        }
        if self.width <= 0 {
            return Err(BmpError::InvalidHeader(format!(
                "width must be positive, got {}",
                self.width
            )));
        }
        if self.height == 0 {
            return Err(BmpError::InvalidHeader("height is zero".into()));
        }
        match (self.compression, self.bits_per_pixel) {
            (CompressionKind::Rle8, 8) | (CompressionKind::Rle4, 4) => {}
            (CompressionKind::Rle8 | CompressionKind::Rle4, bpp) => {
                return Err(BmpError::InvalidHeader(format!(
                    "{:?} requires {} bits per pixel, got {bpp}",
                    self.compression,
                    if self.compression == CompressionKind::Rle8 { 8 } else { 4 }
                )));
            }
            (CompressionKind::Bitfields | CompressionKind::AlphaBitfields, bpp) if bpp <= 8 => {
                return Err(BmpError::InvalidHeader(format!(
                    "{:?} is not valid for indexed depth {bpp}",
                    self.compression
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Byte sizes of the buffers a full decode needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Decoded BGRA framebuffer: `4 * width * abs(height)`.
    pub bitmap_buffer_size: usize,
    /// Full color table for the bit depth (0 for direct color).
    pub color_table_buffer_size: usize,
    /// Raw pixel bytes as stored in the file.
    pub pixel_data_buffer_size: usize,
}

/// Result of a header-only pass over a BMP file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prepass {
    pub file_header: FileHeader,
    pub info_header: InfoHeader,
    pub requirements: MemoryRequirements,
}

/// Parse and validate the headers of `data` and size the decode buffers.
///
/// Nothing is allocated. For uncompressed images the pixel-data size is
/// computed from the header; for RLE and bitfield images the `image_size`
/// field is trusted, falling back to a computed (bitfields) or remaining-bytes
/// (RLE) size when it is zero.
pub fn prepass(data: &[u8]) -> Result<Prepass, BmpError> {
    let magic = data.get(0..2).ok_or(BmpError::TruncatedStream)?;
    if magic != b"BM" {
        log::debug!("signature {magic:02x?} is not BM");
        return Err(BmpError::InvalidSignature);
    }

    let mut cursor = Cursor::at(data, 2)?;
    let file_size = cursor.read_u32_le()?;
    let reserved = cursor.read_u32_le()?;
    if reserved != 0 {
        log::warn!("BMP reserved field is {reserved:#x}, expected 0");
    }
    let data_offset = cursor.read_u32_le()?;
    let _header_size = cursor.read_u32_le()?;
    let width = cursor.read_i32_le()?;
    let height = cursor.read_i32_le()?;
    let _planes = cursor.read_u16_le()?;
    let bits_per_pixel = cursor.read_u16_le()?;
    let compression_code = cursor.read_u32_le()?;
    let image_size = cursor.read_u32_le()?;
    let _x_pixels_per_meter = cursor.read_u32_le()?;
    let _y_pixels_per_meter = cursor.read_u32_le()?;
    let colors_used = cursor.read_u32_le()?;
    let important_colors = cursor.read_u32_le()?;

    let compression = CompressionKind::from_u32(compression_code).ok_or_else(|| {
        BmpError::InvalidHeader(format!("unknown compression code {compression_code}"))
    })?;

    let info_header = InfoHeader {
        width,
        height,
        bits_per_pixel,
        compression,
        image_size,
        colors_used,
        important_colors,
    };
    log::trace!("BMP info header: {info_header:?}");
    info_header.validate()?;

    let file_header = FileHeader {
        file_size,
        data_offset,
    };
    let requirements = requirements_for(&info_header, data.len(), data_offset)?;

    Ok(Prepass {
        file_header,
        info_header,
        requirements,
    })
}

fn requirements_for(
    info: &InfoHeader,
    data_len: usize,
    data_offset: u32,
) -> Result<MemoryRequirements, BmpError> {
    let width = info.width_px();
    let height = info.abs_height();
    let too_large = || BmpError::DimensionsTooLarge { width, height };

    let bitmap_buffer_size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(COLOR_SIZE))
        .ok_or_else(too_large)?;

    let computed = pixel_data_size(info.bits_per_pixel, width, info.height)
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(too_large)?;

    let pixel_data_buffer_size = match info.compression {
        CompressionKind::Rgb => computed,
        _ if info.image_size != 0 => info.image_size as usize,
        CompressionKind::Rle8 | CompressionKind::Rle4 => {
            let remaining = data_len.saturating_sub(data_offset as usize);
            log::debug!("RLE image_size is 0, using {remaining} remaining bytes");
            remaining
        }
        _ => computed,
    };

    Ok(MemoryRequirements {
        bitmap_buffer_size,
        color_table_buffer_size: color_table_size_bytes(info.bits_per_pixel),
        pixel_data_buffer_size,
    })
}
