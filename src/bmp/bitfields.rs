//! Channel masks for direct-color (16/24/32 bpp) pixels.
//!
//! A channel of `depth` bits maps `[0, 2^depth - 1]` onto `[0, 255]` with
//! floor division, so 5-bit 31 becomes 255 and 5-bit 16 becomes 131.

use super::cursor::Cursor;
use super::header::{COLOR_TABLE_OFFSET, CompressionKind, InfoHeader};
use crate::error::BmpError;

/// One channel's position inside a packed pixel integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelBitfield {
    pub mask: u32,
    /// Trailing zero bits of `mask` (0 for an empty mask).
    pub shift: u32,
    /// Set bits in `mask`.
    pub depth: u32,
}

impl ChannelBitfield {
    pub const fn from_mask(mask: u32) -> Self {
        if mask == 0 {
            return Self {
                mask: 0,
                shift: 0,
                depth: 0,
            };
        }
        Self {
            mask,
            shift: mask.trailing_zeros(),
            depth: mask.count_ones(),
        }
    }

    /// Pull this channel out of `pixel` and rescale it to 8 bits.
    pub fn extract_and_normalize(&self, pixel: u32) -> u8 {
        if self.depth == 0 {
            return 0;
        }
        let raw = u64::from((pixel & self.mask) >> self.shift);
        let max = (1u64 << self.depth) - 1;
        // Non-contiguous masks can yield raw > max.
        (raw * 255 / max).min(255) as u8
    }
}

/// Red, green, blue and alpha channel layout of a direct-color pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bitfields {
    pub red: ChannelBitfield,
    pub green: ChannelBitfield,
    pub blue: ChannelBitfield,
    pub alpha: ChannelBitfield,
}

impl Bitfields {
    pub const fn from_masks(red: u32, green: u32, blue: u32, alpha: u32) -> Self {
        Self {
            red: ChannelBitfield::from_mask(red),
            green: ChannelBitfield::from_mask(green),
            blue: ChannelBitfield::from_mask(blue),
            alpha: ChannelBitfield::from_mask(alpha),
        }
    }

    /// Masks implied by `BI_RGB` at 16, 24 and 32 bits per pixel.
    pub const fn defaults_for_depth(bits_per_pixel: u16) -> Option<Self> {
        match bits_per_pixel {
            16 => Some(Self::from_masks(0x7C00, 0x03E0, 0x001F, 0)),
            24 => Some(Self::from_masks(0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0)),
            32 => Some(Self::from_masks(
                0x00FF_0000,
                0x0000_FF00,
                0x0000_00FF,
                0xFF00_0000,
            )),
            _ => None,
        }
    }

    /// Masks in on-disk order: R, G, B, A.
    pub const fn masks(&self) -> [u32; 4] {
        [
            self.red.mask,
            self.green.mask,
            self.blue.mask,
            self.alpha.mask,
        ]
    }
}

/// Read the explicit masks stored right after the info header.
///
/// Returns `None` unless the compression is `BITFIELDS` (R, G, B) or
/// `ALPHABITFIELDS` (R, G, B, A).
pub(crate) fn read_explicit(data: &[u8], info: &InfoHeader) -> Result<Option<Bitfields>, BmpError> {
    let count = info.compression.mask_count();
    if count == 0 {
        return Ok(None);
    }
    let mut cursor = Cursor::at(data, COLOR_TABLE_OFFSET)?;
    let mut masks = [0u32; 4];
    for mask in masks.iter_mut().take(count) {
        *mask = cursor.read_u32_le()?;
    }
    log::trace!("explicit bitfield masks: {masks:08x?}");
    let [r, g, b, a] = masks;
    Ok(Some(Bitfields::from_masks(r, g, b, a)))
}

/// Pick the bitfields a direct-color decode uses.
pub(crate) fn resolve(
    info: &InfoHeader,
    explicit: Option<Bitfields>,
) -> Result<Bitfields, BmpError> {
    match info.compression {
        CompressionKind::Bitfields | CompressionKind::AlphaBitfields => explicit.ok_or_else(|| {
            BmpError::InvalidHeader(alloc::format!(
                "{:?} image without channel masks",
                info.compression
            ))
        }),
        _ => Bitfields::defaults_for_depth(info.bits_per_pixel)
            .ok_or(BmpError::UnsupportedBitDepth(info.bits_per_pixel)),
    }
}
