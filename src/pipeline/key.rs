//! Canonical pipeline cache keys.
//!
//! `wgpu::BlendState` and friends do not implement `Hash`/`Eq`. This module
//! defines *mirror* types that keep only the fields relevant for pipeline
//! identity, and [`PipelineKey`], the full canonical form of a
//! [`PipelineSpec`](super::PipelineSpec).

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use super::vertex::VertexLayout;

// ─── Hashable Mirror Types ────────────────────────────────────────────────────

/// Hashable mirror of `wgpu::BlendComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentKey {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
    pub operation: wgpu::BlendOperation,
}

impl From<wgpu::BlendComponent> for BlendComponentKey {
    fn from(b: wgpu::BlendComponent) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

impl From<BlendComponentKey> for wgpu::BlendComponent {
    fn from(k: BlendComponentKey) -> Self {
        Self {
            src_factor: k.src_factor,
            dst_factor: k.dst_factor,
            operation: k.operation,
        }
    }
}

/// Hashable mirror of `wgpu::BlendState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateKey {
    pub color: BlendComponentKey,
    pub alpha: BlendComponentKey,
}

impl From<wgpu::BlendState> for BlendStateKey {
    fn from(b: wgpu::BlendState) -> Self {
        Self {
            color: b.color.into(),
            alpha: b.alpha.into(),
        }
    }
}

impl From<BlendStateKey> for wgpu::BlendState {
    fn from(k: BlendStateKey) -> Self {
        Self {
            color: k.color.into(),
            alpha: k.alpha.into(),
        }
    }
}

/// Depth attachment state. Present whenever the pass has a depth target,
/// even if testing is off, because the pipeline must match the attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthKey {
    pub format: wgpu::TextureFormat,
    pub test_enabled: bool,
}

impl DepthKey {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: self.format,
            depth_write_enabled: Some(self.test_enabled),
            depth_compare: Some(if self.test_enabled {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

// ─── Pipeline Key ─────────────────────────────────────────────────────────────

/// Canonical form of a [`PipelineSpec`](super::PipelineSpec).
///
/// Blend factors are folded to `None` when blending is disabled, so specs
/// that differ only in unused factors share one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex_layout: VertexLayout,
    pub shader_hash: u64,
    pub vertex_entry: Cow<'static, str>,
    pub fragment_entry: Cow<'static, str>,
    pub blend: Option<BlendStateKey>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub depth: Option<DepthKey>,
    pub color_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

// ─── Convenience helpers ──────────────────────────────────────────────────────

/// Compute a `u64` hash of any `Hash`-able value using `FxHasher`.
#[inline]
pub fn fx_hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}
