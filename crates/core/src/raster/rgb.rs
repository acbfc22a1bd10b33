//! Packed RGB pixel helpers
//!
//! Pixels are stored as `0x00RRGGBB` in a `u32`, alpha is ignored.

/// Pack three 8-bit channels into one pixel
#[inline]
pub fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Red channel of a packed pixel
#[inline]
pub fn red(rgb: u32) -> u8 {
    ((rgb >> 16) & 0xff) as u8
}

/// Green channel of a packed pixel
#[inline]
pub fn green(rgb: u32) -> u8 {
    ((rgb >> 8) & 0xff) as u8
}

/// Blue channel of a packed pixel
#[inline]
pub fn blue(rgb: u32) -> u8 {
    (rgb & 0xff) as u8
}

/// Gray pixel with all channels equal
#[inline]
pub fn gray(v: u8) -> u32 {
    pack(v, v, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let p = pack(12, 200, 255);
        assert_eq!(red(p), 12);
        assert_eq!(green(p), 200);
        assert_eq!(blue(p), 255);
        assert_eq!(p >> 24, 0);
    }
}
