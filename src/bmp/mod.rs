//! BMP format internals: headers, measurement, bitfields, pixel decoding,
//! RLE and the structural encoder.

mod bitfields;
mod cursor;
pub(crate) mod decode;
pub(crate) mod encode;
mod header;
pub mod measure;
mod rle;

pub use bitfields::{Bitfields, ChannelBitfield};
pub use header::{
    COLOR_TABLE_OFFSET, CompressionKind, FileHeader, INFO_HEADER_SIZE, InfoHeader,
    MemoryRequirements, Prepass, prepass,
};
pub use rle::RleDeltaMode;

pub(crate) use bitfields::read_explicit as read_explicit_bitfields;
pub(crate) use cursor::Cursor;
