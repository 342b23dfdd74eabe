//! Flush protocol shared by the batchers.
//!
//! A batcher accumulates geometry for one *run* on the CPU and submits it as
//! a single draw when render state changes. [`BatchCore`] owns everything a
//! submission touches: the binder and its two groups, the dynamic-offset
//! uniform buffer, the per-frame vertex buffer and the pipeline cache.
//!
//! # Groups
//!
//! | group | binding | name              | resource                                   |
//! |-------|---------|-------------------|--------------------------------------------|
//! | 0     | 0       | `uniforms`        | uniform block, dynamic offset, one slice per flush |
//! | 0     | 0       | `projection_view` | `mat4x4<f32>` at byte 0 of the block       |
//! | 1     | 0       | `texture`         | sampled 2D texture                         |
//! | 1     | 1       | `texture_sampler` | filtering sampler                          |
//!
//! # Submission order
//!
//! 1. Budgets are checked. A refused flush writes nothing.
//! 2. The pipeline is resolved and set only when it differs from the last one
//!    set in this pass.
//! 3. The projection-view matrix is written into a fresh uniform slice and
//!    both groups are bound.
//! 4. Vertices are appended to the frame's vertex buffer and drawn.
//! 5. The vertex cursor advances so later flushes of the frame never
//!    overwrite data an earlier draw reads.

use glam::Mat4;

use super::stats::BatchStats;
use super::texture::BatchTexture;
use crate::binding::{Binder, GroupLayout};
use crate::buffer::{UniformBuffer, UniformBufferRef};
use crate::errors::{LoomError, Result};
use crate::frame::FrameIndex;
use crate::gpu::{BufferDesc, GpuDevice, RenderPassEncoder};
use crate::pipeline::{PipelineCache, PipelineSpec, RenderPipelineId, ShaderSource, VertexLayout};

pub const UNIFORM_GROUP: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

pub const UNIFORMS: &str = "uniforms";
pub const PROJECTION_VIEW: &str = "projection_view";
pub const TEXTURE: &str = "texture";
pub const TEXTURE_SAMPLER: &str = "texture_sampler";

const UNIFORM_BLOCK_SIZE: u64 = 64;

/// A per-frame budget, reported by name when exhausted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameBudget {
    pub what: &'static str,
    pub knob: &'static str,
    pub limit: usize,
}

/// Construction parameters of a [`BatchCore`].
pub(crate) struct CoreDesc {
    pub label: &'static str,
    pub shader: ShaderSource,
    pub vertex_layout: VertexLayout,
    pub vertex_buffer_size: u64,
    pub vertex_budget: FrameBudget,
    pub max_flushes: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// The draw command closing a flush.
pub(crate) enum DrawCall<'a, D: GpuDevice> {
    Vertices(u32),
    Indexed { indices: &'a D::Buffer, count: u32 },
}

/// Recording state and GPU resources shared by [`SpriteBatch`] and
/// [`MeshBatch`].
///
/// Field order is drop order: an open pass ends first, pipelines go before
/// the layouts they were built from, bind groups before the buffers they
/// reference.
///
/// [`SpriteBatch`]: super::SpriteBatch
/// [`MeshBatch`]: super::MeshBatch
pub(crate) struct BatchCore<D: GpuDevice> {
    pass: Option<D::RenderPass>,
    pipelines: PipelineCache<D>,
    binder: Binder<D>,
    uniforms: UniformBufferRef<D>,
    vertex_buffer: D::Buffer,

    pub(crate) spec: PipelineSpec,
    default_shader: ShaderSource,
    projection: Mat4,
    transform: Mat4,

    label: &'static str,
    vertex_buffer_size: u64,
    vertex_budget: FrameBudget,
    max_flushes: u32,

    last_frame: Option<FrameIndex>,
    vertex_cursor: u64,
    flush_count: u32,
    prev_pipeline: Option<RenderPipelineId>,
    texture_id: Option<u64>,
    pub(crate) stats: BatchStats,

    device: D,
}

impl<D: GpuDevice> BatchCore<D> {
    pub(crate) fn new(device: D, desc: CoreDesc) -> Result<Self> {
        let mut binder = Binder::new(device.clone());

        let mut uniform_layout = GroupLayout::new(&format!("{} uniforms", desc.label));
        uniform_layout.add_buffer(
            0,
            wgpu::ShaderStages::VERTEX,
            wgpu::BufferBindingType::Uniform,
            UNIFORM_BLOCK_SIZE,
            true,
        );
        binder.define_group(UNIFORM_GROUP, uniform_layout)?;

        let mut texture_layout = GroupLayout::new(&format!("{} texture", desc.label));
        texture_layout
            .add_texture(
                0,
                wgpu::ShaderStages::FRAGMENT,
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::TextureViewDimension::D2,
            )
            .add_sampler(
                1,
                wgpu::ShaderStages::FRAGMENT,
                wgpu::SamplerBindingType::Filtering,
            );
        binder.define_group(TEXTURE_GROUP, texture_layout)?;

        binder.define_binding(UNIFORMS, UNIFORM_GROUP, 0);
        binder.define_uniform(PROJECTION_VIEW, UNIFORM_GROUP, 0, 0);
        binder.define_binding(TEXTURE, TEXTURE_GROUP, 0);
        binder.define_binding(TEXTURE_SAMPLER, TEXTURE_GROUP, 1);

        let uniforms = UniformBufferRef::new(UniformBuffer::new(
            &device,
            &format!("{} uniforms", desc.label),
            UNIFORM_BLOCK_SIZE,
            desc.max_flushes,
            wgpu::BufferUsages::UNIFORM,
        ));
        binder.set_buffer(UNIFORMS, &uniforms, 0, UNIFORM_BLOCK_SIZE)?;

        let vertex_buffer = device.create_buffer(&BufferDesc {
            label: Some(&format!("{} vertices", desc.label)),
            size: desc.vertex_buffer_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let mut spec = PipelineSpec::new(desc.vertex_layout, desc.shader.clone(), desc.color_format);
        spec.set_depth_format(desc.depth_format);
        spec.set_sample_count(desc.sample_count);

        Ok(Self {
            pass: None,
            pipelines: PipelineCache::new(),
            binder,
            uniforms,
            vertex_buffer,
            spec,
            default_shader: desc.shader,
            projection: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            label: desc.label,
            vertex_buffer_size: desc.vertex_buffer_size,
            vertex_budget: desc.vertex_budget,
            max_flushes: desc.max_flushes,
            last_frame: None,
            vertex_cursor: 0,
            flush_count: 0,
            prev_pipeline: None,
            texture_id: None,
            stats: BatchStats::default(),
            device,
        })
    }

    // ========================================================================
    // Recording state
    // ========================================================================

    /// Opens a recording session into `pass`.
    ///
    /// Per-frame cursors rewind only when `frame` differs from the frame of
    /// the previous session.
    pub(crate) fn begin(&mut self, frame: FrameIndex, pass: D::RenderPass) -> Result<()> {
        if self.pass.is_some() {
            return Err(LoomError::AlreadyRecording);
        }
        if self.last_frame != Some(frame) {
            self.vertex_cursor = 0;
            self.flush_count = 0;
            self.uniforms.lock().begin_slices();
            self.stats.flush_count = 0;
            self.stats.items_in_frame = 0;
            self.stats.max_items_in_run = 0;
            self.last_frame = Some(frame);
        }
        self.stats.render_calls = 0;
        self.prev_pipeline = None;
        self.pass = Some(pass);
        Ok(())
    }

    /// Closes the session and hands the pass back.
    pub(crate) fn finish(&mut self) -> Result<D::RenderPass> {
        let pass = self.pass.take().ok_or(LoomError::NotRecording)?;
        self.stats.pipeline_count = self.pipelines.len() as u32;
        Ok(pass)
    }

    /// Closes the session once its final flush has run.
    ///
    /// A capacity refusal is logged and counted in
    /// [`BatchStats::refused_flushes`], and the pass is still handed back.
    /// Any other error closes the session and is returned. The caller clears
    /// its run in both cases.
    pub(crate) fn close(&mut self, flushed: Result<()>, pending: usize) -> Result<D::RenderPass> {
        match flushed {
            Ok(()) => self.finish(),
            Err(err) if err.is_capacity() => {
                log::error!(
                    "{} dropped {pending} {} at end(): {err}",
                    self.label,
                    self.vertex_budget.what
                );
                self.stats.refused_flushes += 1;
                self.finish()
            }
            Err(err) => {
                self.finish()?;
                Err(err)
            }
        }
    }

    #[inline]
    pub(crate) fn is_recording(&self) -> bool {
        self.pass.is_some()
    }

    pub(crate) fn ensure_recording(&self) -> Result<()> {
        if self.is_recording() {
            Ok(())
        } else {
            Err(LoomError::NotRecording)
        }
    }

    // ========================================================================
    // Render state
    // ========================================================================

    /// Whether `texture` is the one the next flush samples.
    #[inline]
    pub(crate) fn is_current_texture(&self, texture: &BatchTexture<D>) -> bool {
        self.texture_id == Some(texture.id())
    }

    /// Points the texture group at `texture`. The caller flushes first.
    pub(crate) fn bind_texture(&mut self, texture: &BatchTexture<D>) -> Result<()> {
        self.binder.release_bind_group(TEXTURE_GROUP)?;
        self.binder.set_texture(TEXTURE, texture.view())?;
        self.binder.set_sampler(TEXTURE_SAMPLER, texture.sampler())?;
        self.texture_id = Some(texture.id());
        Ok(())
    }

    pub(crate) fn default_shader(&self) -> &ShaderSource {
        &self.default_shader
    }

    #[inline]
    pub(crate) fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub(crate) fn transform(&self) -> Mat4 {
        self.transform
    }

    pub(crate) fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub(crate) fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    #[inline]
    pub(crate) fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    pub(crate) fn vertex_cursor(&self) -> u64 {
        self.vertex_cursor
    }

    #[inline]
    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submits one run: `vertices` are uploaded and drawn with `draw`.
    ///
    /// On error nothing has been written and the caller keeps its run.
    pub(crate) fn submit(&mut self, vertices: &[u8], draw: DrawCall<'_, D>) -> Result<()> {
        let pass = self.pass.as_mut().ok_or(LoomError::NotRecording)?;

        if self.flush_count >= self.max_flushes {
            return Err(LoomError::CapacityExceeded {
                what: "flushes",
                limit: self.max_flushes as usize,
                knob: "max_flushes",
            });
        }
        let len = vertices.len() as u64;
        if self.vertex_cursor + len > self.vertex_buffer_size {
            return Err(LoomError::CapacityExceeded {
                what: self.vertex_budget.what,
                limit: self.vertex_budget.limit,
                knob: self.vertex_budget.knob,
            });
        }

        // Both groups are built before anything is written, so a missing
        // resource leaves the slice and vertex cursors untouched.
        self.binder.get_bind_group(UNIFORM_GROUP)?;
        self.binder.get_bind_group(TEXTURE_GROUP)?;

        let layout = self.binder.pipeline_layout(self.label)?;
        let pipeline = self.pipelines.find_pipeline(&self.device, layout, &self.spec);
        if self.prev_pipeline != Some(pipeline) {
            pass.set_pipeline(self.pipelines.get(pipeline));
            self.prev_pipeline = Some(pipeline);
        }

        self.binder
            .set_uniform(PROJECTION_VIEW, self.projection * self.transform)?;
        let offset = self.uniforms.lock().next_slice(&self.device)?;
        self.binder.bind_group(pass, UNIFORM_GROUP, &[offset])?;
        self.binder.bind_group(pass, TEXTURE_GROUP, &[])?;

        self.device
            .write_buffer(&self.vertex_buffer, self.vertex_cursor, vertices);
        pass.set_vertex_buffer(0, &self.vertex_buffer, self.vertex_cursor, len);
        match draw {
            DrawCall::Vertices(count) => pass.draw(0..count, 0..1),
            DrawCall::Indexed { indices, count } => {
                pass.set_index_buffer(
                    indices,
                    wgpu::IndexFormat::Uint16,
                    0,
                    u64::from(count) * 2,
                );
                pass.draw_indexed(0..count, 0, 0..1);
            }
        }

        self.vertex_cursor += len;
        self.flush_count += 1;
        self.stats.flush_count = self.flush_count;
        self.stats.render_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::BindGroupEntry;

    /// Device whose objects are unit values; the pass only counts draws.
    #[derive(Clone)]
    struct NullDevice;

    #[derive(Debug, Default)]
    struct NullPass {
        draws: u32,
    }

    impl RenderPassEncoder<NullDevice> for NullPass {
        fn set_pipeline(&mut self, _: &()) {}
        fn set_bind_group(&mut self, _: u32, _: &(), _: &[u32]) {}
        fn set_vertex_buffer(&mut self, _: u32, _: &(), _: u64, _: u64) {}
        fn set_index_buffer(&mut self, _: &(), _: wgpu::IndexFormat, _: u64, _: u64) {}

        fn draw(&mut self, _: std::ops::Range<u32>, _: std::ops::Range<u32>) {
            self.draws += 1;
        }

        fn draw_indexed(&mut self, _: std::ops::Range<u32>, _: i32, _: std::ops::Range<u32>) {
            self.draws += 1;
        }
    }

    impl GpuDevice for NullDevice {
        type Buffer = ();
        type TextureView = ();
        type Sampler = ();
        type BindGroupLayout = ();
        type BindGroup = ();
        type PipelineLayout = ();
        type RenderPipeline = ();
        type RenderPass = NullPass;

        fn create_buffer(&self, _: &BufferDesc<'_>) {}
        fn write_buffer(&self, _: &(), _: u64, _: &[u8]) {}
        fn create_texture_rgba8(&self, _: Option<&str>, _: u32, _: u32, _: &[u8]) {}
        fn create_sampler(&self, _: Option<&str>, _: wgpu::FilterMode) {}
        fn create_bind_group_layout(&self, _: Option<&str>, _: &[wgpu::BindGroupLayoutEntry]) {}
        fn create_bind_group(&self, _: Option<&str>, _: &(), _: &[BindGroupEntry<'_, Self>]) {}
        fn create_pipeline_layout(&self, _: Option<&str>, _: &[&()]) {}
        fn create_render_pipeline(&self, _: &(), _: &PipelineSpec) {}

        fn min_uniform_buffer_offset_alignment(&self) -> u32 {
            256
        }
    }

    fn null_core() -> BatchCore<NullDevice> {
        BatchCore::new(
            NullDevice,
            CoreDesc {
                label: "test batch",
                shader: ShaderSource::new("test", ""),
                vertex_layout: VertexLayout::sprite(),
                vertex_buffer_size: 800,
                vertex_budget: FrameBudget {
                    what: "sprites",
                    knob: "max_sprites_per_frame",
                    limit: 10,
                },
                max_flushes: 4,
                color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
                depth_format: None,
                sample_count: 1,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_unbound_texture_fails_before_any_write() {
        let mut core = null_core();
        core.begin(FrameIndex(1), NullPass::default()).unwrap();

        let err = core.submit(&[0; 80], DrawCall::Vertices(4)).unwrap_err();
        assert_eq!(
            err,
            LoomError::IncompleteBindGroup {
                group: TEXTURE_GROUP,
                binding: 0,
            }
        );
        assert_eq!(core.vertex_cursor(), 0);
        assert_eq!(core.stats.flush_count, 0);
        assert_eq!(core.uniforms.lock().slices_used(), 0);
    }

    #[test]
    fn test_close_returns_misuse_errors() {
        let mut core = null_core();
        core.begin(FrameIndex(1), NullPass::default()).unwrap();
        let flushed = core.submit(&[0; 80], DrawCall::Vertices(4));

        let err = core.close(flushed, 1).unwrap_err();
        assert!(err.is_misuse());
        assert!(!core.is_recording());
        assert_eq!(core.stats.refused_flushes, 0);
    }

    #[test]
    fn test_close_absorbs_capacity_refusals() {
        let mut core = null_core();
        core.begin(FrameIndex(1), NullPass::default()).unwrap();
        let refused = Err(LoomError::CapacityExceeded {
            what: "sprites",
            limit: 10,
            knob: "max_sprites_per_frame",
        });

        let pass = core.close(refused, 3).unwrap();
        assert_eq!(pass.draws, 0);
        assert!(!core.is_recording());
        assert_eq!(core.stats.refused_flushes, 1);
    }

    #[test]
    fn test_bound_texture_submits() {
        let mut core = null_core();
        core.bind_texture(&BatchTexture::new((), (), 1, 1)).unwrap();
        core.begin(FrameIndex(1), NullPass::default()).unwrap();

        core.submit(&[0; 80], DrawCall::Vertices(4)).unwrap();
        let pass = core.close(Ok(()), 0).unwrap();
        assert_eq!(pass.draws, 1);
        assert_eq!(core.vertex_cursor(), 80);
    }
}
