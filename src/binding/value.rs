//! Values written into uniform blocks by name.
//!
//! Each variant has a fixed byte payload (4, 8, 12, 16 or 64 bytes), laid
//! out exactly as the WGSL scalar, vector or `mat4x4<f32>` it targets.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::color::Color;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Color(Color),
    Mat4(Mat4),
}

impl UniformValue {
    /// Raw bytes of the value in uniform-block layout.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v),
            Self::Int(v) => bytemuck::bytes_of(v),
            Self::Uint(v) => bytemuck::bytes_of(v),
            Self::Vec2(v) => bytemuck::bytes_of(v),
            Self::Vec3(v) => bytemuck::bytes_of(v),
            Self::Vec4(v) => bytemuck::bytes_of(v),
            Self::Color(v) => bytemuck::bytes_of(v),
            Self::Mat4(v) => bytemuck::bytes_of(v),
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.as_bytes().len()
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    f32 => Float,
    i32 => Int,
    u32 => Uint,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Color => Color,
    Mat4 => Mat4,
}
