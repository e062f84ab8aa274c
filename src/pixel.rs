/// One decoded pixel: BGRA, 8 bits per channel.
pub type Color = rgb::alt::BGRA8;

/// Bytes per [`Color`] in every buffer this crate produces.
pub const COLOR_SIZE: usize = 4;

/// Read a color from a 4-byte BGRA slot.
pub(crate) fn color_from_bytes(bytes: &[u8]) -> Color {
    Color {
        b: bytes[0],
        g: bytes[1],
        r: bytes[2],
        a: bytes[3],
    }
}

/// Write an opaque BGR triple into a 4-byte BGRA slot.
#[inline]
pub(crate) fn write_opaque(out: &mut [u8], b: u8, g: u8, r: u8) {
    out[0] = b;
    out[1] = g;
    out[2] = r;
    out[3] = 255;
}
