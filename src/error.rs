use alloc::string::String;
use enough::StopReason;

use crate::bmp::CompressionKind;

/// Errors from BMP prepass, decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BmpError {
    #[error("missing \"BM\" signature")]
    InvalidSignature,

    #[error("unsupported compression: {0:?}")]
    UnsupportedCompression(CompressionKind),

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("unexpected end of input")]
    TruncatedStream,

    #[error("malformed RLE stream: {0}")]
    MalformedRle(&'static str),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("allocation of {size} bytes failed")]
    AllocationFailed { size: usize },

    #[error("default allocator was already set")]
    DefaultAllocatorAlreadySet,

    #[error("operation cancelled")]
    Cancelled(StopReason),

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StopReason> for BmpError {
    fn from(r: StopReason) -> Self {
        BmpError::Cancelled(r)
    }
}
