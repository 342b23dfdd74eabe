//! Pipeline Specification
//!
//! A [`PipelineSpec`] is the mutable value object a batcher edits as render
//! state changes (blend factors, shader swaps, topology). Its canonical
//! [`PipelineKey`] and the hash of that key are what the
//! [`PipelineCache`](super::PipelineCache) looks pipelines up by.
//!
//! The hash is computed lazily and cached. Every setter invalidates it, so
//! the next lookup recomputes and may land on a different cache entry.

use std::borrow::Cow;
use std::cell::Cell;

use super::key::{BlendComponentKey, BlendStateKey, DepthKey, PipelineKey, fx_hash_key};
use super::shader::ShaderSource;
use super::vertex::VertexLayout;

pub const DEFAULT_VERTEX_ENTRY: &str = "vs_main";
pub const DEFAULT_FRAGMENT_ENTRY: &str = "fs_main";

/// Every axis of render state that participates in pipeline identity.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    vertex_layout: VertexLayout,
    shader: ShaderSource,
    vertex_entry: Cow<'static, str>,
    fragment_entry: Cow<'static, str>,

    blending: bool,
    blend_src_color: wgpu::BlendFactor,
    blend_dst_color: wgpu::BlendFactor,
    blend_src_alpha: wgpu::BlendFactor,
    blend_dst_alpha: wgpu::BlendFactor,

    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    front_face: wgpu::FrontFace,

    depth_test: bool,
    depth_format: Option<wgpu::TextureFormat>,
    color_format: wgpu::TextureFormat,
    sample_count: u32,

    hash: Cell<Option<u64>>,
}

impl PipelineSpec {
    /// Opaque triangle-list spec with blending and depth testing disabled.
    #[must_use]
    pub fn new(
        vertex_layout: VertexLayout,
        shader: ShaderSource,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            vertex_layout,
            shader,
            vertex_entry: Cow::Borrowed(DEFAULT_VERTEX_ENTRY),
            fragment_entry: Cow::Borrowed(DEFAULT_FRAGMENT_ENTRY),
            blending: false,
            blend_src_color: wgpu::BlendFactor::SrcAlpha,
            blend_dst_color: wgpu::BlendFactor::OneMinusSrcAlpha,
            blend_src_alpha: wgpu::BlendFactor::SrcAlpha,
            blend_dst_alpha: wgpu::BlendFactor::OneMinusSrcAlpha,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            front_face: wgpu::FrontFace::Ccw,
            depth_test: false,
            depth_format: None,
            color_format,
            sample_count: 1,
            hash: Cell::new(None),
        }
    }

    #[inline]
    fn invalidate(&mut self) {
        self.hash.set(None);
    }

    // ── Setters ─────────────────────────────────────────────────────────────

    pub fn set_vertex_layout(&mut self, layout: VertexLayout) {
        self.vertex_layout = layout;
        self.invalidate();
    }

    pub fn set_shader(&mut self, shader: ShaderSource) {
        self.shader = shader;
        self.invalidate();
    }

    pub fn set_entry_points(
        &mut self,
        vertex: impl Into<Cow<'static, str>>,
        fragment: impl Into<Cow<'static, str>>,
    ) {
        self.vertex_entry = vertex.into();
        self.fragment_entry = fragment.into();
        self.invalidate();
    }

    pub fn enable_blending(&mut self) {
        self.blending = true;
        self.invalidate();
    }

    pub fn disable_blending(&mut self) {
        self.blending = false;
        self.invalidate();
    }

    /// Same factors for color and alpha. Only effective while blending is on.
    pub fn set_blend_factors(&mut self, src: wgpu::BlendFactor, dst: wgpu::BlendFactor) {
        self.set_blend_factors_separate(src, dst, src, dst);
    }

    pub fn set_blend_factors_separate(
        &mut self,
        src_color: wgpu::BlendFactor,
        dst_color: wgpu::BlendFactor,
        src_alpha: wgpu::BlendFactor,
        dst_alpha: wgpu::BlendFactor,
    ) {
        self.blend_src_color = src_color;
        self.blend_dst_color = dst_color;
        self.blend_src_alpha = src_alpha;
        self.blend_dst_alpha = dst_alpha;
        self.invalidate();
    }

    pub fn set_topology(&mut self, topology: wgpu::PrimitiveTopology) {
        self.topology = topology;
        self.invalidate();
    }

    pub fn set_cull_mode(&mut self, cull_mode: Option<wgpu::Face>) {
        self.cull_mode = cull_mode;
        self.invalidate();
    }

    pub fn set_front_face(&mut self, front_face: wgpu::FrontFace) {
        self.front_face = front_face;
        self.invalidate();
    }

    pub fn enable_depth_test(&mut self) {
        self.depth_test = true;
        self.invalidate();
    }

    pub fn disable_depth_test(&mut self) {
        self.depth_test = false;
        self.invalidate();
    }

    pub fn set_depth_format(&mut self, format: Option<wgpu::TextureFormat>) {
        self.depth_format = format;
        self.invalidate();
    }

    pub fn set_color_format(&mut self, format: wgpu::TextureFormat) {
        self.color_format = format;
        self.invalidate();
    }

    pub fn set_sample_count(&mut self, count: u32) {
        self.sample_count = count;
        self.invalidate();
    }

    // ── Getters ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    #[must_use]
    pub fn shader(&self) -> &ShaderSource {
        &self.shader
    }

    #[must_use]
    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    #[must_use]
    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }

    #[must_use]
    pub fn is_blending_enabled(&self) -> bool {
        self.blending
    }

    /// `(src_color, dst_color, src_alpha, dst_alpha)`
    #[must_use]
    pub fn blend_factors(
        &self,
    ) -> (
        wgpu::BlendFactor,
        wgpu::BlendFactor,
        wgpu::BlendFactor,
        wgpu::BlendFactor,
    ) {
        (
            self.blend_src_color,
            self.blend_dst_color,
            self.blend_src_alpha,
            self.blend_dst_alpha,
        )
    }

    /// The blend state to compile, `None` when blending is disabled.
    #[must_use]
    pub fn blend_state(&self) -> Option<BlendStateKey> {
        self.blending.then(|| BlendStateKey {
            color: BlendComponentKey {
                src_factor: self.blend_src_color,
                dst_factor: self.blend_dst_color,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: BlendComponentKey {
                src_factor: self.blend_src_alpha,
                dst_factor: self.blend_dst_alpha,
                operation: wgpu::BlendOperation::Add,
            },
        })
    }

    #[must_use]
    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    #[must_use]
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        self.cull_mode
    }

    #[must_use]
    pub fn front_face(&self) -> wgpu::FrontFace {
        self.front_face
    }

    #[must_use]
    pub fn is_depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    #[must_use]
    pub fn depth_state(&self) -> Option<DepthKey> {
        self.depth_format.map(|format| DepthKey {
            format,
            test_enabled: self.depth_test,
        })
    }

    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    // ── Identity ────────────────────────────────────────────────────────────

    /// Canonical key of the current state.
    #[must_use]
    pub fn key(&self) -> PipelineKey {
        PipelineKey {
            vertex_layout: self.vertex_layout.clone(),
            shader_hash: self.shader.hash(),
            vertex_entry: self.vertex_entry.clone(),
            fragment_entry: self.fragment_entry.clone(),
            blend: self.blend_state(),
            topology: self.topology,
            cull_mode: self.cull_mode,
            front_face: self.front_face,
            depth: self.depth_state(),
            color_format: self.color_format,
            sample_count: self.sample_count,
        }
    }

    /// Hash of [`key`](Self::key), cached until the next setter call.
    #[must_use]
    pub fn hash(&self) -> u64 {
        if let Some(hash) = self.hash.get() {
            return hash;
        }
        let hash = fx_hash_key(&self.key());
        self.hash.set(Some(hash));
        hash
    }
}

impl PartialEq for PipelineSpec {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash() && self.key() == other.key()
    }
}

impl Eq for PipelineSpec {}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PipelineSpec {
        PipelineSpec::new(
            VertexLayout::sprite(),
            ShaderSource::new("test", "@vertex fn vs_main() {}"),
            wgpu::TextureFormat::Rgba8Unorm,
        )
    }

    #[test]
    fn test_equal_specs_hash_identically() {
        let a = spec();
        let b = spec();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn test_setter_invalidates_hash() {
        let mut s = spec();
        s.enable_blending();
        let before = s.hash();
        s.set_blend_factors(wgpu::BlendFactor::One, wgpu::BlendFactor::One);
        assert_ne!(before, s.hash());
    }

    #[test]
    fn test_blend_factors_ignored_while_disabled() {
        let a = spec();
        let mut b = spec();
        b.set_blend_factors(wgpu::BlendFactor::One, wgpu::BlendFactor::Zero);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);

        let mut c = b.clone();
        c.enable_blending();
        assert_ne!(a, c);
    }

    #[test]
    fn test_depth_state_requires_format() {
        let mut s = spec();
        s.enable_depth_test();
        assert!(s.depth_state().is_none());
        s.set_depth_format(Some(wgpu::TextureFormat::Depth32Float));
        let depth = s.depth_state().unwrap();
        assert!(depth.test_enabled);
        assert_eq!(depth.to_wgpu().depth_compare, Some(wgpu::CompareFunction::LessEqual));
    }
}
