//! `wgpu` implementation of the device seam.
//!
//! Render passes are used as `wgpu::RenderPass<'static>`; callers detach the
//! encoder borrow with `RenderPass::forget_lifetime()` before handing the
//! pass to a batcher.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{BindGroupEntry, BindingResource, BufferDesc, GpuDevice, RenderPassEncoder};
use crate::pipeline::{PipelineSpec, ShaderSource};

/// A `wgpu` device/queue pair plus a shader module cache.
///
/// Cloning is cheap and clones share the module cache.
#[derive(Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// xxh3 of (code, defines) → compiled module
    shader_modules: Arc<Mutex<FxHashMap<u64, wgpu::ShaderModule>>>,
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            shader_modules: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn shader_module(&self, source: &ShaderSource) -> wgpu::ShaderModule {
        let mut modules = self.shader_modules.lock();
        modules
            .entry(source.hash())
            .or_insert_with(|| {
                log::debug!("Compiling shader module '{}'", source.label());
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(source.label()),
                        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.final_source())),
                    })
            })
            .clone()
    }
}

impl GpuDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type TextureView = wgpu::TextureView;
    type Sampler = wgpu::Sampler;
    type BindGroupLayout = wgpu::BindGroupLayout;
    type BindGroup = wgpu::BindGroup;
    type PipelineLayout = wgpu::PipelineLayout;
    type RenderPipeline = wgpu::RenderPipeline;
    type RenderPass = wgpu::RenderPass<'static>;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: false,
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> wgpu::BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label, entries })
    }

    fn create_texture_rgba8(
        &self,
        label: Option<&str>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_sampler(&self, label: Option<&str>, filter: wgpu::FilterMode) -> wgpu::Sampler {
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        })
    }

    fn create_bind_group(
        &self,
        label: Option<&str>,
        layout: &wgpu::BindGroupLayout,
        entries: &[BindGroupEntry<'_, Self>],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = entries
            .iter()
            .map(|entry| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match entry.resource {
                    BindingResource::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset,
                        size,
                    }),
                    BindingResource::TextureView(view) => wgpu::BindingResource::TextureView(view),
                    BindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout,
            entries: &entries,
        })
    }

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::PipelineLayout {
        let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
            bind_group_layouts.iter().copied().map(Some).collect();
        self.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            })
    }

    fn create_render_pipeline(
        &self,
        layout: &wgpu::PipelineLayout,
        spec: &PipelineSpec,
    ) -> wgpu::RenderPipeline {
        let module = self.shader_module(spec.shader());
        let vertex_buffers = [spec.vertex_layout().as_wgpu()];
        let color_targets = [Some(wgpu::ColorTargetState {
            format: spec.color_format(),
            blend: spec.blend_state().map(Into::into),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(spec.shader().label()),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(spec.vertex_entry()),
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(spec.fragment_entry()),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: spec.topology(),
                    front_face: spec.front_face(),
                    cull_mode: spec.cull_mode(),
                    ..Default::default()
                },
                depth_stencil: spec.depth_state().map(|depth| depth.to_wgpu()),
                multisample: wgpu::MultisampleState {
                    count: spec.sample_count(),
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            })
    }

    fn min_uniform_buffer_offset_alignment(&self) -> u32 {
        self.device.limits().min_uniform_buffer_offset_alignment
    }
}

impl RenderPassEncoder<WgpuDevice> for wgpu::RenderPass<'static> {
    fn set_pipeline(&mut self, pipeline: &wgpu::RenderPipeline) {
        wgpu::RenderPass::set_pipeline(self, pipeline);
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &wgpu::BindGroup, offsets: &[u32]) {
        wgpu::RenderPass::set_bind_group(self, index, bind_group, offsets);
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &wgpu::Buffer, offset: u64, size: u64) {
        wgpu::RenderPass::set_vertex_buffer(self, slot, buffer.slice(offset..offset + size));
    }

    fn set_index_buffer(
        &mut self,
        buffer: &wgpu::Buffer,
        format: wgpu::IndexFormat,
        offset: u64,
        size: u64,
    ) {
        wgpu::RenderPass::set_index_buffer(self, buffer.slice(offset..offset + size), format);
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        wgpu::RenderPass::draw(self, vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        wgpu::RenderPass::draw_indexed(self, indices, base_vertex, instances);
    }
}
