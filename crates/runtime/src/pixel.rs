//! Pixel color format selection (spec §6): "must be selectable between
//! big-endian-ARGB, little-endian-BGRA, and little-endian-RGBA (the last
//! for mobile targets). Component-to-byte mapping is a build-time choice."

/// The three formats spec §6 names. A build picks one; `to_rgba_color`/
/// `to_pixel_color` hide the difference from callers working in RGBA
/// component order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    ArgbBe,
    BgraLe,
    RgbaLe,
}

/// An RGBA color in canonical component order, independent of storage
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl PixelFormat {
    /// Decode four stored bytes into canonical RGBA order.
    pub fn to_rgba_color(self, bytes: [u8; 4]) -> RgbaColor {
        match self {
            PixelFormat::ArgbBe => RgbaColor {
                a: bytes[0],
                r: bytes[1],
                g: bytes[2],
                b: bytes[3],
            },
            PixelFormat::BgraLe => RgbaColor {
                b: bytes[0],
                g: bytes[1],
                r: bytes[2],
                a: bytes[3],
            },
            PixelFormat::RgbaLe => RgbaColor {
                r: bytes[0],
                g: bytes[1],
                b: bytes[2],
                a: bytes[3],
            },
        }
    }

    /// Encode a canonical RGBA color into this format's byte order.
    pub fn to_pixel_color(self, color: RgbaColor) -> [u8; 4] {
        match self {
            PixelFormat::ArgbBe => [color.a, color.r, color.g, color.b],
            PixelFormat::BgraLe => [color.b, color.g, color.r, color.a],
            PixelFormat::RgbaLe => [color.r, color.g, color.b, color.a],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_each_format() {
        let color = RgbaColor { r: 10, g: 20, b: 30, a: 40 };
        for format in [PixelFormat::ArgbBe, PixelFormat::BgraLe, PixelFormat::RgbaLe] {
            let bytes = format.to_pixel_color(color);
            assert_eq!(format.to_rgba_color(bytes), color);
        }
    }

    #[test]
    fn argb_be_places_alpha_first() {
        let color = RgbaColor { r: 1, g: 2, b: 3, a: 4 };
        assert_eq!(PixelFormat::ArgbBe.to_pixel_color(color), [4, 1, 2, 3]);
    }

    #[test]
    fn bgra_le_reverses_rgb() {
        let color = RgbaColor { r: 1, g: 2, b: 3, a: 4 };
        assert_eq!(PixelFormat::BgraLe.to_pixel_color(color), [3, 2, 1, 4]);
    }
}
