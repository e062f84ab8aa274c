//! Buffer allocation capability.
//!
//! Every buffer the codec hands out (decoded framebuffer, palette, raw pixel
//! data, encoded file) comes from an [`Allocator`]. Callers pass one through
//! [`crate::DecodeOptions::with_allocator`] or [`crate::encode_dib_with`];
//! otherwise the process-wide default is consulted.
//!
//! # Default allocator lifecycle
//!
//! 1. Until [`set_default_allocator`] is called, [`default_allocator`] returns
//!    [`SystemAllocator`].
//! 2. [`set_default_allocator`] installs a `'static` allocator exactly once,
//!    typically at startup. Later calls fail with
//!    [`BmpError::DefaultAllocatorAlreadySet`].
//! 3. [`default_allocator`] may be read any number of times from any thread.
//!
//! The slot requires the `std` feature; without it the default is always
//! [`SystemAllocator`].

use alloc::vec::Vec;

use crate::error::BmpError;

/// Source of zero-filled byte buffers.
pub trait Allocator: Send + Sync {
    /// Return a zero-filled buffer of exactly `size` bytes.
    fn allocate(&self, size: usize) -> Result<Vec<u8>, BmpError>;

    /// Take back a buffer previously returned by [`Allocator::allocate`].
    fn deallocate(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Allocator backed by the global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Result<Vec<u8>, BmpError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| BmpError::AllocationFailed { size })?;
        buffer.resize(size, 0);
        Ok(buffer)
    }
}

static SYSTEM: SystemAllocator = SystemAllocator;

#[cfg(feature = "std")]
static DEFAULT: std::sync::OnceLock<&'static dyn Allocator> = std::sync::OnceLock::new();

/// Install the process-wide default allocator. Succeeds at most once.
#[cfg(feature = "std")]
pub fn set_default_allocator(allocator: &'static dyn Allocator) -> Result<(), BmpError> {
    DEFAULT
        .set(allocator)
        .map_err(|_| BmpError::DefaultAllocatorAlreadySet)?;
    log::debug!("default allocator installed");
    Ok(())
}

/// The process-wide default allocator.
pub fn default_allocator() -> &'static dyn Allocator {
    #[cfg(feature = "std")]
    if let Some(allocator) = DEFAULT.get() {
        return *allocator;
    }
    &SYSTEM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_zero_fills() {
        let buf = SystemAllocator.allocate(17).unwrap();
        assert_eq!(buf.len(), 17);
        assert!(buf.iter().all(|&b| b == 0));
        SystemAllocator.deallocate(buf);
    }

    #[test]
    fn system_allocator_reports_failure() {
        let err = SystemAllocator.allocate(usize::MAX).unwrap_err();
        assert!(matches!(err, BmpError::AllocationFailed { size } if size == usize::MAX));
    }
}
