//! RGBA colors and packed palette entries.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Pack color into u32 (RGBA8 format).
    pub fn to_u32(&self) -> u32 {
        let r = (self.r.clamp(0.0, 1.0) * 255.0).round() as u32;
        let g = (self.g.clamp(0.0, 1.0) * 255.0).round() as u32;
        let b = (self.b.clamp(0.0, 1.0) * 255.0).round() as u32;
        let a = (self.a.clamp(0.0, 1.0) * 255.0).round() as u32;
        (r << 24) | (g << 16) | (b << 8) | a
    }

    /// Unpack color from u32 (RGBA8 format).
    pub fn from_u32(packed: u32) -> Self {
        Self {
            r: ((packed >> 24) & 0xFF) as f32 / 255.0,
            g: ((packed >> 16) & 0xFF) as f32 / 255.0,
            b: ((packed >> 8) & 0xFF) as f32 / 255.0,
            a: (packed & 0xFF) as f32 / 255.0,
        }
    }

    /// Linear blend toward `other`; alpha is kept from `self`.
    pub fn lerp(&self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a,
        }
    }

    /// Perceived brightness in 0..1.
    pub fn luminance(&self) -> f32 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::rgba(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::rgba(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::rgba(0.0, 0.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::rgba(1.0, 1.0, 0.0, 1.0);
    pub const CYAN: Color = Color::rgba(0.0, 1.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::rgba(1.0, 0.0, 1.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_to_u32() {
        assert_eq!(Color::WHITE.to_u32(), 0xFFFFFFFF);
        assert_eq!(Color::RED.to_u32(), 0xFF0000FF);
        assert_eq!(Color::TRANSPARENT.to_u32(), 0);

        let packed = Color::rgba(0.0, 0.0, 1.0, 0.5).to_u32();
        assert_eq!(packed >> 24, 0);
        assert_eq!((packed >> 8) & 0xFF, 255);
        assert_eq!(packed & 0xFF, 128);
    }

    #[test]
    fn test_color_roundtrip() {
        let original = Color::rgba(0.5, 0.25, 0.75, 1.0);
        let unpacked = Color::from_u32(original.to_u32());

        // Quantization error is at most half a step (1/510)
        assert!((original.r - unpacked.r).abs() < 0.01);
        assert!((original.g - unpacked.g).abs() < 0.01);
        assert!((original.b - unpacked.b).abs() < 0.01);
        assert!((original.a - unpacked.a).abs() < 0.01);
    }

    #[test]
    fn test_lerp_keeps_alpha() {
        let faded = Color::rgba(1.0, 1.0, 1.0, 0.5).lerp(Color::BLACK, 0.5);
        assert!((faded.r - 0.5).abs() < 1e-6);
        assert!((faded.a - 0.5).abs() < 1e-6);
    }
}
