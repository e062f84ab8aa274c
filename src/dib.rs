use alloc::format;
use alloc::vec::Vec;

use enough::Stop;

use crate::allocator::Allocator;
use crate::bitmap::Bitmap;
use crate::bmp::decode::{PixelSource, decode_pixel_data};
use crate::bmp::encode::encode_dib;
use crate::bmp::measure::{color_table_size_bytes, pixel_data_size};
use crate::bmp::{Bitfields, CompressionKind, InfoHeader, MemoryRequirements};
use crate::decode::DecodeOptions;
use crate::error::BmpError;
use crate::pixel::{COLOR_SIZE, Color, color_from_bytes};

/// Lossless device-independent bitmap: header, palette and the raw pixel
/// bytes exactly as stored (still RLE-compressed if the source was).
///
/// Re-encoding a `Dib` reproduces its palette and pixel bytes verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dib {
    info: InfoHeader,
    bitfields: Option<Bitfields>,
    palette: Vec<u8>,
    pixel_data: Vec<u8>,
}

impl Dib {
    /// Assemble a DIB from its parts.
    ///
    /// `palette` holds raw BGRA entries and must be exactly
    /// [`color_table_size_bytes`] long (empty above 8 bpp). `bitfields` is
    /// required for `BITFIELDS`/`ALPHABITFIELDS` and ignored otherwise.
    ///
    /// `pixel_data` must be exactly the size a reader of the encoded file
    /// will take back: the padded row size for `BI_RGB`, `image_size` when
    /// it is non-zero, the padded row size for bitfields without one. An RLE
    /// stream with `image_size == 0` may be any length.
    pub fn new(
        info: InfoHeader,
        bitfields: Option<Bitfields>,
        palette: Vec<u8>,
        pixel_data: Vec<u8>,
    ) -> Result<Self, BmpError> {
        info.validate()?;
        let expected = color_table_size_bytes(info.bits_per_pixel);
        if palette.len() != expected {
            return Err(BmpError::InvalidHeader(format!(
                "palette for {} bpp must be {expected} bytes, got {}",
                info.bits_per_pixel,
                palette.len()
            )));
        }
        let bitfields = if info.compression.mask_count() == 0 {
            None
        } else {
            Some(bitfields.ok_or_else(|| {
                BmpError::InvalidHeader(format!("{:?} requires channel masks", info.compression))
            })?)
        };
        if let Some(expected) = stored_pixel_bytes(&info)? {
            if pixel_data.len() != expected {
                return Err(BmpError::InvalidHeader(format!(
                    "{:?} pixel data must be {expected} bytes, got {}",
                    info.compression,
                    pixel_data.len()
                )));
            }
        }
        Ok(Self::from_parts(info, bitfields, palette, pixel_data))
    }

    pub(crate) fn from_parts(
        info: InfoHeader,
        bitfields: Option<Bitfields>,
        palette: Vec<u8>,
        pixel_data: Vec<u8>,
    ) -> Self {
        Self {
            info,
            bitfields,
            palette,
            pixel_data,
        }
    }

    pub fn info_header(&self) -> &InfoHeader {
        &self.info
    }

    /// Explicit channel masks, for `BITFIELDS`/`ALPHABITFIELDS` only.
    pub fn bitfields(&self) -> Option<Bitfields> {
        self.bitfields
    }

    /// Raw palette bytes, four per entry (B, G, R, reserved).
    pub fn palette(&self) -> &[u8] {
        &self.palette
    }

    /// Palette entry `index` with its reserved byte as alpha.
    pub fn palette_entry(&self, index: usize) -> Option<Color> {
        let off = index.checked_mul(COLOR_SIZE)?;
        self.palette
            .get(off..off + COLOR_SIZE)
            .map(color_from_bytes)
    }

    pub fn palette_len(&self) -> usize {
        self.palette.len() / COLOR_SIZE
    }

    pub fn pixel_data(&self) -> &[u8] {
        &self.pixel_data
    }

    /// Decode the retained pixel bytes with default options.
    pub fn to_bitmap(&self, stop: impl Stop) -> Result<Bitmap, BmpError> {
        self.to_bitmap_with(&DecodeOptions::default(), stop)
    }

    /// Decode the retained pixel bytes into a fresh [`Bitmap`].
    ///
    /// Only the framebuffer is allocated, so only its size is checked
    /// against the options' limits.
    pub fn to_bitmap_with(
        &self,
        options: &DecodeOptions<'_>,
        stop: impl Stop,
    ) -> Result<Bitmap, BmpError> {
        let width = self.info.width_px();
        let height = self.info.abs_height();
        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(COLOR_SIZE))
            .ok_or(BmpError::DimensionsTooLarge { width, height })?;
        options.check_limits(
            &self.info,
            &MemoryRequirements {
                bitmap_buffer_size: size,
                color_table_buffer_size: 0,
                pixel_data_buffer_size: 0,
            },
        )?;
        stop.check()?;

        let src = PixelSource {
            info: &self.info,
            palette: &self.palette,
            bitfields: self.bitfields,
            pixels: &self.pixel_data,
        };
        let rle_delta = options.rle_delta();
        let pixels = options.allocate_filled(size, |out| {
            decode_pixel_data(&src, out, rle_delta, &stop)
        })?;
        Ok(Bitmap::from_parts(pixels, width, height))
    }

    /// Serialize to BMP file bytes using the default allocator.
    pub fn encode(&self, stop: impl Stop) -> Result<Vec<u8>, BmpError> {
        encode_dib(self, crate::allocator::default_allocator(), &stop)
    }

    /// Write the encoded file to `writer`.
    #[cfg(feature = "std")]
    pub fn write_to<W: std::io::Write>(&self, mut writer: W, stop: impl Stop) -> Result<(), BmpError> {
        let bytes = self.encode(stop)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Hand the palette and pixel buffers back to the allocator.
    pub fn release(self, allocator: &dyn Allocator) {
        allocator.deallocate(self.palette);
        allocator.deallocate(self.pixel_data);
    }
}

/// Pixel-data length implied by the header, `None` for an unsized RLE stream.
fn stored_pixel_bytes(info: &InfoHeader) -> Result<Option<usize>, BmpError> {
    if info.compression != CompressionKind::Rgb && info.image_size != 0 {
        return Ok(Some(info.image_size as usize));
    }
    if info.compression.is_rle() {
        return Ok(None);
    }
    pixel_data_size(info.bits_per_pixel, info.width_px(), info.height)
        .and_then(|size| usize::try_from(size).ok())
        .map(Some)
        .ok_or(BmpError::DimensionsTooLarge {
            width: info.width_px(),
            height: info.abs_height(),
        })
}
