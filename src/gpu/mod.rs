//! Native graphics layer seam.
//!
//! The binder, pipeline cache and batchers talk to the GPU only through
//! [`GpuDevice`] and [`RenderPassEncoder`]. [`WgpuDevice`] is the production
//! implementation; tests drive the same code against a recording device that
//! keeps buffer contents in memory and journals every command.
//!
//! Descriptor-level data (`wgpu::BindGroupLayoutEntry`, `wgpu::TextureFormat`,
//! `wgpu::BlendFactor`, …) is plain data and is shared by every backend, so
//! the seam only abstracts over the objects that need a live device.

mod wgpu_backend;

use std::num::NonZeroU64;
use std::ops::Range;

use crate::pipeline::PipelineSpec;

pub use wgpu_backend::WgpuDevice;

/// Parameters for [`GpuDevice::create_buffer`].
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

/// A resource reference inside a bind group creation request.
pub enum BindingResource<'a, D: GpuDevice> {
    Buffer {
        buffer: &'a D::Buffer,
        offset: u64,
        size: Option<NonZeroU64>,
    },
    TextureView(&'a D::TextureView),
    Sampler(&'a D::Sampler),
}

/// One `(binding, resource)` pair of a bind group creation request.
pub struct BindGroupEntry<'a, D: GpuDevice> {
    pub binding: u32,
    pub resource: BindingResource<'a, D>,
}

/// Device-side primitives consumed by this crate.
///
/// Handles returned by `create_*` are owned by the caller. Dropping them
/// releases the native object, so owners order their fields to drop bind
/// groups and pipelines before the buffers and layouts they reference.
pub trait GpuDevice: Clone {
    type Buffer: Clone;
    type TextureView: Clone;
    type Sampler: Clone;
    type BindGroupLayout;
    type BindGroup;
    type PipelineLayout;
    type RenderPipeline;
    type RenderPass: RenderPassEncoder<Self>;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Self::Buffer;

    /// Queues a CPU → GPU copy of `data` at `offset`.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self::BindGroupLayout;

    /// Creates a sampled 2D `Rgba8Unorm` texture from tightly packed
    /// `pixels` and returns a view of it.
    fn create_texture_rgba8(
        &self,
        label: Option<&str>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self::TextureView;

    /// Clamp-to-edge sampler with `filter` for magnification and minification.
    fn create_sampler(&self, label: Option<&str>, filter: wgpu::FilterMode) -> Self::Sampler;

    /// `entries` must cover every slot of `layout`.
    fn create_bind_group(
        &self,
        label: Option<&str>,
        layout: &Self::BindGroupLayout,
        entries: &[BindGroupEntry<'_, Self>],
    ) -> Self::BindGroup;

    /// Position `i` of `bind_group_layouts` becomes `@group(i)`.
    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> Self::PipelineLayout;

    fn create_render_pipeline(
        &self,
        layout: &Self::PipelineLayout,
        spec: &PipelineSpec,
    ) -> Self::RenderPipeline;

    /// Required alignment of dynamic uniform buffer offsets.
    fn min_uniform_buffer_offset_alignment(&self) -> u32;
}

/// Commands recorded into an open render pass.
pub trait RenderPassEncoder<D: GpuDevice> {
    fn set_pipeline(&mut self, pipeline: &D::RenderPipeline);

    fn set_bind_group(&mut self, index: u32, bind_group: &D::BindGroup, offsets: &[u32]);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &D::Buffer, offset: u64, size: u64);

    fn set_index_buffer(
        &mut self,
        buffer: &D::Buffer,
        format: wgpu::IndexFormat,
        offset: u64,
        size: u64,
    );

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
#[must_use]
pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
