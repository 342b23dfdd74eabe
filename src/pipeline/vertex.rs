//! Vertex buffer layouts.
//!
//! A [`VertexLayout`] is the owned, hashable counterpart of
//! `wgpu::VertexBufferLayout` and participates in pipeline identity.

use smallvec::SmallVec;
use wgpu::VertexFormat;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: SmallVec<[wgpu::VertexAttribute; 4]>,
}

impl VertexLayout {
    /// Builds a per-vertex layout from `(format, shader_location)` pairs laid
    /// out back to back. The stride is the sum of the attribute sizes.
    #[must_use]
    pub fn packed(attributes: &[(VertexFormat, u32)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(format, shader_location)| {
                let attr = wgpu::VertexAttribute {
                    format,
                    offset,
                    shader_location,
                };
                offset += format.size();
                attr
            })
            .collect();

        Self {
            array_stride: offset,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }

    /// `position: vec2<f32> @0`, `color: unorm8x4 @1`, `uv: vec2<f32> @2`.
    #[must_use]
    pub fn sprite() -> Self {
        Self::packed(&[
            (VertexFormat::Float32x2, 0),
            (VertexFormat::Unorm8x4, 1),
            (VertexFormat::Float32x2, 2),
        ])
    }

    /// `position: vec3 @0`, `color: vec4 @1`, `uv: vec2 @2`, `normal: vec3 @3`.
    #[must_use]
    pub fn mesh() -> Self {
        Self::packed(&[
            (VertexFormat::Float32x3, 0),
            (VertexFormat::Float32x4, 1),
            (VertexFormat::Float32x2, 2),
            (VertexFormat::Float32x3, 3),
        ])
    }

    #[must_use]
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}
