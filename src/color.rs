//! Linear RGBA tint color with a packed `unorm8x4` form for vertex data.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Packs into `0xAABBGGRR`, which is `r, g, b, a` byte order in memory
    /// and matches `VertexFormat::Unorm8x4`.
    #[must_use]
    pub fn to_packed(self) -> u32 {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        q(self.r) | (q(self.g) << 8) | (q(self.b) << 16) | (q(self.a) << 24)
    }

    #[must_use]
    pub fn from_packed(packed: u32) -> Self {
        let f = |shift: u32| ((packed >> shift) & 0xFF) as f32 / 255.0;
        Self::new(f(0), f(8), f(16), f(24))
    }

    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<glam::Vec4> for Color {
    fn from(v: glam::Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }
}

impl From<Color> for glam::Vec4 {
    fn from(c: Color) -> Self {
        glam::Vec4::new(c.r, c.g, c.b, c.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_byte_order() {
        let packed = Color::new(1.0, 0.0, 0.0, 1.0).to_packed();
        assert_eq!(packed.to_le_bytes(), [255, 0, 0, 255]);
        assert_eq!(Color::WHITE.to_packed(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_packed_clamps_out_of_range() {
        let packed = Color::new(2.0, -1.0, 0.5, 1.0).to_packed();
        assert_eq!(packed.to_le_bytes(), [255, 0, 128, 255]);
    }

    #[test]
    fn test_unpack_roundtrip_on_exact_bytes() {
        let c = Color::from_packed(0x80FF_0000);
        assert_eq!(c.to_packed(), 0x80FF_0000);
    }
}
