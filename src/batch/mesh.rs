//! Immediate-mode mesh batch.
//!
//! Accumulates non-indexed vertices of a single primitive topology and one
//! texture, and submits them with the same flush protocol as the sprite
//! batch. The topology is chosen per `begin()`; changing it or the texture
//! mid-session ends the current run.
//!
//! List topologies split oversized appends at primitive boundaries. Strip
//! topologies cannot be split, so every strip append is a run of its own.
//!
//! Until [`MeshBatch::set_texture`] is called the batch samples a 1x1 white
//! texture, so untextured lines, points and colored triangles draw with
//! their vertex colors.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use wgpu::PrimitiveTopology;

use super::flush::{BatchCore, CoreDesc, DrawCall, FrameBudget};
use super::stats::BatchStats;
use super::texture::BatchTexture;
use crate::color::Color;
use crate::errors::{LoomError, Result};
use crate::frame::FrameIndex;
use crate::gpu::GpuDevice;
use crate::pipeline::{ShaderSource, VertexLayout};
use crate::settings::MeshBatchSettings;

const MESH_SHADER: &str = include_str!("shaders/mesh.wgsl");

/// One vertex, matching [`VertexLayout::mesh`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl MeshVertex {
    #[must_use]
    pub fn new(position: Vec3, color: Color, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
            uv: uv.to_array(),
            normal: normal.to_array(),
        }
    }

    /// White, untextured vertex facing +Z.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Color::WHITE, Vec2::ZERO, Vec3::Z)
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color.to_array();
        self
    }

    #[must_use]
    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = uv.to_array();
        self
    }
}

/// Vertices per primitive, `None` for strips.
fn primitive_size(topology: PrimitiveTopology) -> Option<usize> {
    match topology {
        PrimitiveTopology::PointList => Some(1),
        PrimitiveTopology::LineList => Some(2),
        PrimitiveTopology::TriangleList => Some(3),
        PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip => None,
    }
}

pub struct MeshBatch<D: GpuDevice> {
    core: BatchCore<D>,
    white: BatchTexture<D>,
    vertices: Vec<MeshVertex>,
    settings: MeshBatchSettings,
}

impl<D: GpuDevice> MeshBatch<D> {
    pub fn new(device: D, settings: MeshBatchSettings) -> Result<Self> {
        Self::with_shader(device, settings, Self::default_shader())
    }

    pub fn with_shader(device: D, settings: MeshBatchSettings, shader: ShaderSource) -> Result<Self> {
        settings.validate()?;
        let vertex_size = std::mem::size_of::<MeshVertex>() as u64;

        let mut core = BatchCore::new(
            device,
            CoreDesc {
                label: "mesh batch",
                shader,
                vertex_layout: VertexLayout::mesh(),
                vertex_buffer_size: u64::from(settings.max_vertices_per_frame) * vertex_size,
                vertex_budget: FrameBudget {
                    what: "vertices",
                    knob: "max_vertices_per_frame",
                    limit: settings.max_vertices_per_frame as usize,
                },
                max_flushes: settings.max_flushes,
                color_format: settings.color_format,
                depth_format: settings.depth_format,
                sample_count: settings.sample_count,
            },
        )?;

        let white = BatchTexture::solid(core.device(), "mesh batch white", Color::WHITE);
        core.bind_texture(&white)?;

        log::info!(
            "Created mesh batch: {} vertices per run, {} per frame, {} flushes",
            settings.max_vertices,
            settings.max_vertices_per_frame,
            settings.max_flushes
        );

        Ok(Self {
            core,
            white,
            vertices: Vec::with_capacity(settings.max_vertices as usize),
            settings,
        })
    }

    #[must_use]
    pub fn default_shader() -> ShaderSource {
        ShaderSource::new("mesh", MESH_SHADER)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Starts recording `topology` primitives into `pass`.
    pub fn begin(
        &mut self,
        frame: FrameIndex,
        pass: D::RenderPass,
        topology: PrimitiveTopology,
    ) -> Result<()> {
        self.core.begin(frame, pass)?;
        self.core.spec.set_topology(topology);
        Ok(())
    }

    /// Flushes the pending run and returns the pass.
    ///
    /// A final flush refused for capacity is logged and its vertices dropped.
    /// Any other flush error ends the session and is returned.
    pub fn end(&mut self) -> Result<D::RenderPass> {
        self.core.ensure_recording()?;
        let pending = self.vertices.len();
        let flushed = self.flush();
        self.vertices.clear();
        self.core.close(flushed, pending)
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        let count = self.vertices.len() as u32;
        self.core.submit(
            bytemuck::cast_slice(&self.vertices),
            DrawCall::Vertices(count),
        )?;
        self.core.stats.items_in_frame += count;
        self.core.stats.max_items_in_run = self.core.stats.max_items_in_run.max(count);
        self.vertices.clear();
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.core.is_recording()
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Appends whole primitives of the current topology.
    pub fn draw_vertices(&mut self, vertices: &[MeshVertex]) -> Result<()> {
        self.core.ensure_recording()?;
        if vertices.is_empty() {
            return Ok(());
        }
        let max_run = self.settings.max_vertices as usize;

        let Some(primitive) = primitive_size(self.core.spec.topology()) else {
            if vertices.len() > max_run {
                return Err(LoomError::CapacityExceeded {
                    what: "strip vertices",
                    limit: max_run,
                    knob: "max_vertices",
                });
            }
            self.flush()?;
            self.vertices.extend_from_slice(vertices);
            return self.flush();
        };

        if vertices.len() % primitive != 0 {
            return Err(LoomError::InvalidVertexCount {
                count: vertices.len(),
                multiple: primitive,
            });
        }

        let run_capacity = max_run - max_run % primitive;
        let mut remaining = vertices;
        while !remaining.is_empty() {
            if self.vertices.len() >= run_capacity {
                self.flush()?;
            }
            let space = run_capacity - self.vertices.len();
            let (head, tail) = remaining.split_at(space.min(remaining.len()));
            self.vertices.extend_from_slice(head);
            remaining = tail;
        }
        Ok(())
    }

    // ========================================================================
    // Render state
    // ========================================================================

    pub fn set_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        if self.core.spec.topology() == topology {
            return Ok(());
        }
        self.flush()?;
        self.core.spec.set_topology(topology);
        Ok(())
    }

    #[must_use]
    pub fn topology(&self) -> PrimitiveTopology {
        self.core.spec.topology()
    }

    /// Samples `texture` from the next run on.
    pub fn set_texture(&mut self, texture: &BatchTexture<D>) -> Result<()> {
        if self.core.is_current_texture(texture) {
            return Ok(());
        }
        self.flush()?;
        self.core.bind_texture(texture)
    }

    /// Goes back to the built-in white texture.
    pub fn reset_texture(&mut self) -> Result<()> {
        let white = self.white.clone();
        self.set_texture(&white)
    }

    pub fn set_shader(&mut self, shader: Option<ShaderSource>) -> Result<()> {
        let shader = shader.unwrap_or_else(|| self.core.default_shader().clone());
        if *self.core.spec.shader() == shader {
            return Ok(());
        }
        self.flush()?;
        self.core.spec.set_shader(shader);
        Ok(())
    }

    pub fn set_depth_test(&mut self, enabled: bool) -> Result<()> {
        if self.core.spec.is_depth_test_enabled() == enabled {
            return Ok(());
        }
        self.flush()?;
        if enabled {
            self.core.spec.enable_depth_test();
        } else {
            self.core.spec.disable_depth_test();
        }
        Ok(())
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) -> Result<()> {
        self.flush()?;
        self.core.set_projection(projection);
        Ok(())
    }

    pub fn set_transform_matrix(&mut self, transform: Mat4) -> Result<()> {
        self.flush()?;
        self.core.set_transform(transform);
        Ok(())
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.core.projection()
    }

    #[must_use]
    pub fn transform_matrix(&self) -> Mat4 {
        self.core.transform()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> BatchStats {
        self.core.stats
    }

    #[must_use]
    pub fn pending_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.core.pipeline_count()
    }

    #[must_use]
    pub fn frame_vertex_bytes(&self) -> u64 {
        self.core.vertex_cursor()
    }

    #[must_use]
    pub fn settings(&self) -> &MeshBatchSettings {
        &self.settings
    }
}
