use alloc::vec::Vec;

use rgb::AsPixels as _;

use crate::allocator::Allocator;
use crate::pixel::{COLOR_SIZE, Color};

/// Decoded image: top-down BGRA8888 pixels.
///
/// Palette, original bit depth and compression are gone once an image is in
/// this form, so a `Bitmap` cannot be turned back into a [`crate::Dib`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Bitmap {
    pub(crate) fn from_parts(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * COLOR_SIZE);
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per output row.
    pub fn stride(&self) -> usize {
        self.width as usize * COLOR_SIZE
    }

    /// BGRA bytes, row 0 is the top of the image.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y` (from the top).
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.as_colors().get(index).copied()
    }

    /// Typed view of the framebuffer, `width * height` colors, no copy.
    pub fn as_colors(&self) -> &[Color] {
        self.pixels.as_pixels()
    }

    /// All pixels in row-major order.
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.as_colors().iter().copied()
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Hand the framebuffer back to the allocator it came from.
    pub fn release(self, allocator: &dyn Allocator) {
        allocator.deallocate(self.pixels);
    }

    /// Copy into a typed [`imgref::ImgVec`].
    #[cfg(feature = "imgref")]
    pub fn to_imgvec(&self) -> imgref::ImgVec<Color> {
        imgref::ImgVec::new(
            self.as_colors().to_vec(),
            self.width as usize,
            self.height as usize,
        )
    }
}
