//! 32-bit RGBA color used for clear values and light/material uniforms.

use crate::algebra::{Vector3, Vector4};

/// A color with 8-bit channels in sRGB space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
    /// Alpha component.
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::repeat_opaque(255);
    pub const BLACK: Self = Self::repeat_opaque(0);
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };
    pub const RED: Self = Self::opaque(255, 0, 0);
    pub const GREEN: Self = Self::opaque(0, 255, 0);
    pub const BLUE: Self = Self::opaque(0, 0, 255);

    const fn repeat_opaque(v: u8) -> Self {
        Self {
            r: v,
            g: v,
            b: v,
            a: 255,
        }
    }

    /// Creates an opaque color.
    #[inline]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a color from all four channels.
    #[inline]
    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the color as four floats in `[0; 1]` range.
    #[inline]
    pub fn as_frgba(self) -> Vector4<f32> {
        Vector4::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        )
    }

    /// Returns the color part as three floats in `[0; 1]` range.
    #[inline]
    pub fn as_frgb(self) -> Vector3<f32> {
        let frgba = self.as_frgba();
        Vector3::new(frgba.x, frgba.y, frgba.z)
    }

    /// Converts the color from sRGB to linear space, returning floats. Alpha
    /// is passed through unchanged.
    #[inline]
    pub fn srgb_to_linear_f32(self) -> Vector4<f32> {
        fn convert(v: f32) -> f32 {
            if v <= 0.04045 {
                v / 12.92
            } else {
                ((v + 0.055) / 1.055).powf(2.4)
            }
        }
        let frgba = self.as_frgba();
        Vector4::new(
            convert(frgba.x),
            convert(frgba.y),
            convert(frgba.z),
            frgba.w,
        )
    }
}

#[cfg(test)]
mod test {
    use super::Color;

    #[test]
    fn test_color_as_frgba() {
        let frgba = Color::WHITE.as_frgba();
        assert_eq!(frgba.x, 1.0);
        assert_eq!(frgba.y, 1.0);
        assert_eq!(frgba.z, 1.0);
        assert_eq!(frgba.w, 1.0);
    }

    #[test]
    fn test_srgb_to_linear() {
        let linear = Color::BLACK.srgb_to_linear_f32();
        assert_eq!(linear.x, 0.0);
        assert_eq!(linear.w, 1.0);

        let linear = Color::WHITE.srgb_to_linear_f32();
        assert!((linear.x - 1.0).abs() < 1e-6);
    }
}
