//! # zendib
//!
//! BMP (Windows device-independent bitmap) decoder and structural encoder.
//!
//! A file can be read into one of two forms:
//!
//! - [`Dib`]: lossless. Header, palette, channel masks and the pixel bytes
//!   exactly as stored, RLE streams included. Encoding a `Dib` reproduces
//!   them verbatim.
//! - [`Bitmap`]: decoded. Top-down BGRA8888 pixels, one [`Color`] per pixel.
//!
//! ## Supported input
//!
//! - `BITMAPINFOHEADER` (40-byte) files
//! - 1, 2, 4 and 8 bpp indexed color, RLE8 and RLE4
//! - 16, 24 and 32 bpp direct color, with default or explicit channel masks
//!   (`BITFIELDS`, `ALPHABITFIELDS`)
//! - bottom-up (positive height) and top-down (negative height) row order
//!
//! Decoded alpha is always 255. JPEG/PNG payloads, CMYK and the larger V4/V5
//! headers are rejected.
//!
//! ## Sizing before decoding
//!
//! [`prepass`] reads only the headers and reports the size of every buffer a
//! decode will ask the [`Allocator`] for, so callers can check [`Limits`] or
//! reserve memory up front.
//!
//! ## Usage
//!
//! ```no_run
//! use zendib::{DecodeRequest, Limits, Unstoppable};
//!
//! let data: &[u8] = &[]; // your BMP bytes
//!
//! let header = zendib::prepass(data)?;
//! println!("needs {} bytes", header.requirements.bitmap_buffer_size);
//!
//! let limits = Limits {
//!     max_pixels: Some(64 * 1024 * 1024),
//!     ..Default::default()
//! };
//! let bitmap = DecodeRequest::new(data)
//!     .with_limits(&limits)
//!     .decode(Unstoppable)?;
//!
//! let dib = zendib::decode_dib(data, Unstoppable)?;
//! let bytes = zendib::encode_dib(&dib, Unstoppable)?;
//! # let _ = (bitmap, bytes);
//! # Ok::<(), zendib::BmpError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod allocator;
mod bitmap;
pub mod bmp;
mod decode;
mod dib;
mod error;
mod limits;
mod pixel;

use alloc::vec::Vec;

// Re-exports
#[cfg(feature = "std")]
pub use allocator::set_default_allocator;
pub use allocator::{Allocator, SystemAllocator, default_allocator};
pub use bitmap::Bitmap;
pub use bmp::measure;
pub use bmp::{
    Bitfields, ChannelBitfield, CompressionKind, FileHeader, InfoHeader, MemoryRequirements,
    Prepass, RleDeltaMode, prepass,
};
pub use decode::{DecodeOptions, DecodeRequest};
pub use dib::Dib;
pub use enough::{Stop, Unstoppable};
pub use error::BmpError;
pub use limits::Limits;
pub use pixel::{COLOR_SIZE, Color};

/// Decode a BMP file to a top-down BGRA [`Bitmap`] with default options.
pub fn decode_bitmap(data: &[u8], stop: impl Stop) -> Result<Bitmap, BmpError> {
    DecodeRequest::new(data).decode(stop)
}

/// Read a BMP file into the lossless [`Dib`] form with default options.
pub fn decode_dib(data: &[u8], stop: impl Stop) -> Result<Dib, BmpError> {
    DecodeRequest::new(data).decode_dib(stop)
}

/// Serialize `dib` using the default allocator.
pub fn encode_dib(dib: &Dib, stop: impl Stop) -> Result<Vec<u8>, BmpError> {
    dib.encode(stop)
}

/// Serialize `dib` into a buffer obtained from `allocator`.
pub fn encode_dib_with(
    dib: &Dib,
    allocator: &dyn Allocator,
    stop: impl Stop,
) -> Result<Vec<u8>, BmpError> {
    bmp::encode::encode_dib(dib, allocator, &stop)
}

/// Read a whole BMP file from `reader` into a [`Dib`].
#[cfg(feature = "std")]
pub fn read_dib<R: std::io::Read>(mut reader: R, stop: impl Stop) -> Result<Dib, BmpError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode_dib(&data, stop)
}
