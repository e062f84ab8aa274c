use alloc::vec::Vec;

use enough::Stop;

use crate::allocator::{Allocator, default_allocator};
use crate::bitmap::Bitmap;
use crate::bmp::decode::{PixelSource, decode_pixel_data};
use crate::bmp::measure::color_table_entry_count;
use crate::bmp::{
    COLOR_TABLE_OFFSET, Cursor, InfoHeader, MemoryRequirements, Prepass, RleDeltaMode, prepass,
    read_explicit_bitfields,
};
use crate::dib::Dib;
use crate::error::BmpError;
use crate::limits::Limits;
use crate::pixel::COLOR_SIZE;

/// Settings shared by every decode entry point.
#[derive(Clone, Copy, Default)]
pub struct DecodeOptions<'a> {
    limits: Option<&'a Limits>,
    allocator: Option<&'a dyn Allocator>,
    rle_delta: RleDeltaMode,
}

impl<'a> DecodeOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Allocate through `allocator` instead of the process-wide default.
    pub fn with_allocator(mut self, allocator: &'a dyn Allocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// How RLE delta records treat the pixels they skip.
    pub fn with_rle_delta(mut self, mode: RleDeltaMode) -> Self {
        self.rle_delta = mode;
        self
    }

    pub fn allocator(&self) -> &'a dyn Allocator {
        match self.allocator {
            Some(allocator) => allocator,
            None => default_allocator(),
        }
    }

    pub fn rle_delta(&self) -> RleDeltaMode {
        self.rle_delta
    }

    pub(crate) fn check_limits(
        &self,
        info: &InfoHeader,
        requirements: &MemoryRequirements,
    ) -> Result<(), BmpError> {
        match self.limits {
            Some(limits) => limits.check_header(info, requirements),
            None => Ok(()),
        }
    }

    /// Allocate a buffer and let `fill` populate it, returning it to the
    /// allocator if `fill` fails.
    pub(crate) fn allocate_filled(
        &self,
        size: usize,
        fill: impl FnOnce(&mut [u8]) -> Result<(), BmpError>,
    ) -> Result<Vec<u8>, BmpError> {
        let allocator = self.allocator();
        let mut buffer = allocator.allocate(size)?;
        if buffer.len() != size {
            let actual = buffer.len();
            allocator.deallocate(buffer);
            return Err(BmpError::BufferTooSmall {
                needed: size,
                actual,
            });
        }
        match fill(&mut buffer[..]) {
            Ok(()) => Ok(buffer),
            Err(e) => {
                allocator.deallocate(buffer);
                Err(e)
            }
        }
    }
}

/// Decode request over an in-memory BMP file.
///
/// ```no_run
/// use zendib::{DecodeRequest, Unstoppable};
///
/// let data: &[u8] = &[]; // your BMP bytes
/// let bitmap = DecodeRequest::new(data).decode(Unstoppable)?;
/// println!("{}x{}", bitmap.width(), bitmap.height());
/// # Ok::<(), zendib::BmpError>(())
/// ```
#[derive(Clone, Copy)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    options: DecodeOptions<'a>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions<'a>) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.options = self.options.with_limits(limits);
        self
    }

    pub fn with_allocator(mut self, allocator: &'a dyn Allocator) -> Self {
        self.options = self.options.with_allocator(allocator);
        self
    }

    pub fn with_rle_delta(mut self, mode: RleDeltaMode) -> Self {
        self.options = self.options.with_rle_delta(mode);
        self
    }

    /// Header-only pass; nothing is allocated.
    pub fn prepass(&self) -> Result<Prepass, BmpError> {
        prepass(self.data)
    }

    /// Decode straight to a top-down BGRA [`Bitmap`].
    pub fn decode(&self, stop: impl Stop) -> Result<Bitmap, BmpError> {
        let header = prepass(self.data)?;
        let info = &header.info_header;
        self.options.check_limits(info, &header.requirements)?;
        stop.check()?;

        let src = PixelSource {
            info,
            palette: palette_bytes(self.data, info)?,
            bitfields: read_explicit_bitfields(self.data, info)?,
            pixels: pixel_bytes(self.data, &header)?,
        };
        let rle_delta = self.options.rle_delta();
        let pixels = self
            .options
            .allocate_filled(header.requirements.bitmap_buffer_size, |out| {
                decode_pixel_data(&src, out, rle_delta, &stop)
            })?;
        Ok(Bitmap::from_parts(
            pixels,
            info.width_px(),
            info.abs_height(),
        ))
    }

    /// Decode to the lossless [`Dib`] form: palette and raw pixel bytes are
    /// copied, pixels are not interpreted.
    pub fn decode_dib(&self, stop: impl Stop) -> Result<Dib, BmpError> {
        let header = prepass(self.data)?;
        let info = header.info_header;
        let requirements = header.requirements;
        self.options.check_limits(&info, &requirements)?;
        stop.check()?;

        let bitfields = read_explicit_bitfields(self.data, &info)?;
        let stored_palette = palette_bytes(self.data, &info)?;
        let raw_pixels = pixel_bytes(self.data, &header)?;

        let palette = self
            .options
            .allocate_filled(requirements.color_table_buffer_size, |buf| {
                buf[..stored_palette.len()].copy_from_slice(stored_palette);
                Ok(())
            })?;
        let pixel_data = match self
            .options
            .allocate_filled(requirements.pixel_data_buffer_size, |buf| {
                buf.copy_from_slice(raw_pixels);
                Ok(())
            }) {
            Ok(buf) => buf,
            Err(e) => {
                self.options.allocator().deallocate(palette);
                return Err(e);
            }
        };
        Ok(Dib::from_parts(info, bitfields, palette, pixel_data))
    }
}

/// The color table entries actually stored in the file.
fn palette_bytes<'d>(data: &'d [u8], info: &InfoHeader) -> Result<&'d [u8], BmpError> {
    let full = color_table_entry_count(info.bits_per_pixel);
    let used = info.colors_used as usize;
    let entries = if used != 0 && used < full {
        log::warn!("palette has {used} of {full} entries, rest left black");
        used
    } else {
        full
    };
    let mut cursor = Cursor::at(data, COLOR_TABLE_OFFSET)?;
    cursor.read_bytes(entries * COLOR_SIZE)
}

fn pixel_bytes<'d>(data: &'d [u8], header: &Prepass) -> Result<&'d [u8], BmpError> {
    let mut cursor = Cursor::at(data, header.file_header.data_offset as usize)?;
    cursor.read_bytes(header.requirements.pixel_data_buffer_size)
}
