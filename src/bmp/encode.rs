//! Structural BMP encoder: writes a [`Dib`] back out verbatim.
//!
//! Pixel bytes are never re-compressed. Whatever the DIB holds (uncompressed
//! rows or an RLE stream) is copied after a freshly computed file header.

use alloc::vec::Vec;

use enough::Stop;

use super::header::{COLOR_TABLE_OFFSET, INFO_HEADER_SIZE};
use super::measure::color_table_size_bytes;
use crate::allocator::Allocator;
use crate::dib::Dib;
use crate::error::BmpError;

/// Offset of the pixel data for `dib` once encoded.
pub(crate) fn data_offset(dib: &Dib) -> usize {
    COLOR_TABLE_OFFSET
        + dib.info_header().compression.mask_count() * 4
        + color_table_size_bytes(dib.info_header().bits_per_pixel)
}

/// Serialize `dib` into a buffer obtained from `allocator`.
pub(crate) fn encode_dib(
    dib: &Dib,
    allocator: &dyn Allocator,
    stop: &dyn Stop,
) -> Result<Vec<u8>, BmpError> {
    let info = dib.info_header();
    let offset = data_offset(dib);
    let file_len = offset
        .checked_add(dib.pixel_data().len())
        .ok_or(BmpError::DimensionsTooLarge {
            width: info.width_px(),
            height: info.abs_height(),
        })?;
    let file_size = u32::try_from(file_len).map_err(|_| BmpError::DimensionsTooLarge {
        width: info.width_px(),
        height: info.abs_height(),
    })?;

    stop.check()?;

    let mut out = allocator.allocate(file_len)?;
    out.clear();

    // File header (14 bytes)
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // reserved
    out.extend_from_slice(&(offset as u32).to_le_bytes());

    // BITMAPINFOHEADER (40 bytes)
    out.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&info.width.to_le_bytes());
    out.extend_from_slice(&info.height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&info.bits_per_pixel.to_le_bytes());
    out.extend_from_slice(&info.compression.to_u32().to_le_bytes());
    out.extend_from_slice(&info.image_size.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]); // pixels per meter, x and y
    out.extend_from_slice(&info.colors_used.to_le_bytes());
    out.extend_from_slice(&info.important_colors.to_le_bytes());

    if let Some(fields) = dib.bitfields() {
        let count = info.compression.mask_count();
        for mask in fields.masks().iter().take(count) {
            out.extend_from_slice(&mask.to_le_bytes());
        }
    }

    out.extend_from_slice(dib.palette());
    stop.check()?;
    out.extend_from_slice(dib.pixel_data());

    debug_assert_eq!(out.len(), file_len);
    log::trace!("encoded BMP: {file_len} bytes, pixel data at {offset}");
    Ok(out)
}
