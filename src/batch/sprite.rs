//! Sprite Batch
//!
//! Collects textured, tinted quads and submits them in as few draw calls as
//! render state allows. A run ends (and is flushed as one indexed draw) when:
//!
//! - a quad uses a different texture than the run,
//! - the run reaches [`SpriteBatchSettings::max_sprites`],
//! - blending, blend factors, shader or matrices change,
//! - [`flush`](SpriteBatch::flush) or [`end`](SpriteBatch::end) is called.
//!
//! Each quad is four [`SpriteVertex`] values. All runs share one static
//! index buffer of `max_sprites * 6` 16-bit indices.
//!
//! ```rust,ignore
//! let mut batch = SpriteBatch::new(device.clone(), SpriteBatchSettings::default())?;
//! batch.set_projection_matrix(Mat4::orthographic_rh(0.0, 800.0, 0.0, 600.0, -1.0, 1.0))?;
//!
//! batch.begin(frames.advance(), pass)?;
//! batch.draw(&atlas, 10.0, 10.0, 32.0, 32.0)?;
//! batch.draw_sprite(&hero, &SpriteDraw::new(pos, size).with_rotation(45.0))?;
//! let pass = batch.end()?;
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use super::flush::{BatchCore, CoreDesc, DrawCall, FrameBudget};
use super::stats::BatchStats;
use super::texture::BatchTexture;
use crate::color::Color;
use crate::errors::{LoomError, Result};
use crate::frame::FrameIndex;
use crate::gpu::{BufferDesc, GpuDevice};
use crate::pipeline::blend;
use crate::pipeline::{ShaderSource, VertexLayout};
use crate::settings::SpriteBatchSettings;

pub const VERTICES_PER_SPRITE: usize = 4;
pub const INDICES_PER_SPRITE: usize = 6;

const SPRITE_SHADER: &str = include_str!("shaders/sprite.wgsl");

/// One corner of a sprite quad, matching [`VertexLayout::sprite`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    /// Packed `0xAABBGGRR` tint, see [`Color::to_packed`].
    pub color: u32,
    pub uv: [f32; 2],
}

impl SpriteVertex {
    #[inline]
    #[must_use]
    pub fn new(position: Vec2, color: u32, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            color,
            uv: uv.to_array(),
        }
    }
}

/// A source rectangle in texels, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TexelRegion {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Placement of one sprite for [`SpriteBatch::draw_sprite`].
///
/// `origin` is relative to the bottom-left corner and is the pivot for
/// scaling and rotation. `rotation` is in degrees, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    pub position: Vec2,
    pub size: Vec2,
    pub origin: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    /// Part of the texture to show; the whole texture when `None`.
    pub region: Option<TexelRegion>,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl SpriteDraw {
    #[must_use]
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            region: None,
            flip_x: false,
            flip_y: false,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: TexelRegion) -> Self {
        self.region = Some(region);
        self
    }

    #[must_use]
    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }

    /// Corner positions in `[bottom-left, top-left, top-right, bottom-right]`
    /// order.
    #[must_use]
    pub fn corners(&self) -> [Vec2; 4] {
        let min = -self.origin * self.scale;
        let max = (self.size - self.origin) * self.scale;
        let local = [
            min,
            Vec2::new(min.x, max.y),
            max,
            Vec2::new(max.x, min.y),
        ];

        let world_origin = self.position + self.origin;
        if self.rotation == 0.0 {
            return local.map(|p| p + world_origin);
        }
        let rotation = Vec2::from_angle(self.rotation.to_radians());
        local.map(|p| rotation.rotate(p) + world_origin)
    }
}

/// Texture coordinates `(u, v, u2, v2)` of the full texture.
const FULL_UV: [f32; 4] = [0.0, 1.0, 1.0, 0.0];

pub struct SpriteBatch<D: GpuDevice> {
    core: BatchCore<D>,
    index_buffer: D::Buffer,
    vertices: Vec<SpriteVertex>,
    color: u32,
    inv_texture_size: Vec2,
    settings: SpriteBatchSettings,
}

impl<D: GpuDevice> SpriteBatch<D> {
    pub fn new(device: D, settings: SpriteBatchSettings) -> Result<Self> {
        Self::with_shader(device, settings, Self::default_shader())
    }

    /// Creates a batch whose default shader is `shader`.
    ///
    /// The shader must read `@group(0) @binding(0)` as a uniform block whose
    /// first field is the `mat4x4<f32>` projection-view matrix, and sample
    /// `@group(1) @binding(0..2)` as texture and sampler.
    pub fn with_shader(
        device: D,
        settings: SpriteBatchSettings,
        shader: ShaderSource,
    ) -> Result<Self> {
        settings.validate()?;
        let vertex_size = std::mem::size_of::<SpriteVertex>() as u64;

        let mut core = BatchCore::new(
            device.clone(),
            CoreDesc {
                label: "sprite batch",
                shader,
                vertex_layout: VertexLayout::sprite(),
                vertex_buffer_size: u64::from(settings.max_sprites_per_frame)
                    * VERTICES_PER_SPRITE as u64
                    * vertex_size,
                vertex_budget: FrameBudget {
                    what: "sprites",
                    knob: "max_sprites_per_frame",
                    limit: settings.max_sprites_per_frame as usize,
                },
                max_flushes: settings.max_flushes,
                color_format: settings.color_format,
                depth_format: settings.depth_format,
                sample_count: settings.sample_count,
            },
        )?;
        core.spec.enable_blending();

        let indices = build_indices(settings.max_sprites)?;
        let indices: &[u8] = bytemuck::cast_slice(&indices);
        let index_buffer = device.create_buffer(&BufferDesc {
            label: Some("sprite batch indices"),
            size: indices.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        });
        device.write_buffer(&index_buffer, 0, indices);

        log::info!(
            "Created sprite batch: {} sprites per run, {} per frame, {} flushes",
            settings.max_sprites,
            settings.max_sprites_per_frame,
            settings.max_flushes
        );

        Ok(Self {
            core,
            index_buffer,
            vertices: Vec::with_capacity(settings.max_sprites as usize * VERTICES_PER_SPRITE),
            color: Color::WHITE.to_packed(),
            inv_texture_size: Vec2::ONE,
            settings,
        })
    }

    #[must_use]
    pub fn default_shader() -> ShaderSource {
        ShaderSource::new("sprite", SPRITE_SHADER)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Starts recording into `pass`.
    ///
    /// The first `begin()` of a new `frame` rewinds the frame's vertex and
    /// uniform slices. Further sessions in the same frame append after them.
    ///
    /// Every session starts with a white tint, blending on and the depth
    /// test off. Matrices, blend factors and the shader carry over.
    pub fn begin(&mut self, frame: FrameIndex, pass: D::RenderPass) -> Result<()> {
        self.core.begin(frame, pass)?;
        self.color = Color::WHITE.to_packed();
        let spec = &mut self.core.spec;
        if !spec.is_blending_enabled() {
            spec.enable_blending();
        }
        if spec.is_depth_test_enabled() {
            spec.disable_depth_test();
        }
        Ok(())
    }

    /// Flushes the pending run and returns the pass.
    ///
    /// A final flush refused for capacity is logged, counted in
    /// [`BatchStats::refused_flushes`] and its sprites are dropped; the
    /// session still ends. Any other flush error also ends the session, drops
    /// the sprites and is returned.
    pub fn end(&mut self) -> Result<D::RenderPass> {
        self.core.ensure_recording()?;
        let pending = self.pending_sprites() as usize;
        let flushed = self.flush();
        self.vertices.clear();
        self.core.close(flushed, pending)
    }

    /// Submits the pending run as one draw. No-op when the run is empty.
    pub fn flush(&mut self) -> Result<()> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        let sprites = self.pending_sprites();
        self.core.submit(
            bytemuck::cast_slice(&self.vertices),
            DrawCall::Indexed {
                indices: &self.index_buffer,
                count: sprites * INDICES_PER_SPRITE as u32,
            },
        )?;
        self.core.stats.items_in_frame += sprites;
        self.core.stats.max_items_in_run = self.core.stats.max_items_in_run.max(sprites);
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

    /// Draws the whole texture stretched over `(x, y, width, height)`.
    pub fn draw(
        &mut self,
        texture: &BatchTexture<D>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()> {
        let [u, v, u2, v2] = FULL_UV;
        self.draw_region(texture, x, y, width, height, u, v, u2, v2)
    }

    /// Draws the texture-space rectangle `(u, v)..(u2, v2)`, where `(u, v)`
    /// maps to the bottom-left corner.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_region(
        &mut self,
        texture: &BatchTexture<D>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        u: f32,
        v: f32,
        u2: f32,
        v2: f32,
    ) -> Result<()> {
        self.prepare(texture)?;
        let (x2, y2) = (x + width, y + height);
        self.push_quad(
            [
                Vec2::new(x, y),
                Vec2::new(x, y2),
                Vec2::new(x2, y2),
                Vec2::new(x2, y),
            ],
            [u, v, u2, v2],
        );
        Ok(())
    }

    /// Draws a sprite with origin, scale, rotation, source region and flips.
    pub fn draw_sprite(&mut self, texture: &BatchTexture<D>, sprite: &SpriteDraw) -> Result<()> {
        self.prepare(texture)?;

        let [mut u, mut v, mut u2, mut v2] = match sprite.region {
            Some(region) => {
                let inv = self.inv_texture_size;
                [
                    region.x as f32 * inv.x,
                    (region.y + region.height) as f32 * inv.y,
                    (region.x + region.width) as f32 * inv.x,
                    region.y as f32 * inv.y,
                ]
            }
            None => FULL_UV,
        };
        if sprite.flip_x {
            std::mem::swap(&mut u, &mut u2);
        }
        if sprite.flip_y {
            std::mem::swap(&mut v, &mut v2);
        }

        self.push_quad(sprite.corners(), [u, v, u2, v2]);
        Ok(())
    }

    /// Appends raw quads, four vertices each.
    ///
    /// Large slices are split across runs. If a flush in between is refused,
    /// the quads appended before it stay pending.
    pub fn draw_vertices(
        &mut self,
        texture: &BatchTexture<D>,
        vertices: &[SpriteVertex],
    ) -> Result<()> {
        self.core.ensure_recording()?;
        if vertices.len() % VERTICES_PER_SPRITE != 0 {
            return Err(LoomError::InvalidVertexCount {
                count: vertices.len(),
                multiple: VERTICES_PER_SPRITE,
            });
        }
        let mut remaining = vertices;
        while !remaining.is_empty() {
            self.prepare(texture)?;
            let space = self.max_run_vertices() - self.vertices.len();
            let (head, tail) = remaining.split_at(space.min(remaining.len()));
            self.vertices.extend_from_slice(head);
            remaining = tail;
        }
        Ok(())
    }

    /// Makes room for one quad sampling `texture`, flushing when the run
    /// must end first.
    fn prepare(&mut self, texture: &BatchTexture<D>) -> Result<()> {
        self.core.ensure_recording()?;
        if !self.core.is_current_texture(texture) {
            self.flush()?;
            self.core.bind_texture(texture)?;
            self.inv_texture_size = Vec2::new(
                1.0 / texture.width() as f32,
                1.0 / texture.height() as f32,
            );
        } else if self.vertices.len() >= self.max_run_vertices() {
            self.flush()?;
        }
        Ok(())
    }

    fn push_quad(&mut self, corners: [Vec2; 4], [u, v, u2, v2]: [f32; 4]) {
        let uvs = [
            Vec2::new(u, v),
            Vec2::new(u, v2),
            Vec2::new(u2, v2),
            Vec2::new(u2, v),
        ];
        for (corner, uv) in corners.into_iter().zip(uvs) {
            self.vertices.push(SpriteVertex::new(corner, self.color, uv));
        }
    }

    #[inline]
    fn max_run_vertices(&self) -> usize {
        self.settings.max_sprites as usize * VERTICES_PER_SPRITE
    }

    // ========================================================================
    // Render state
    // ========================================================================

    pub fn set_color(&mut self, color: Color) {
        self.color = color.to_packed();
    }

    /// Sets the tint from a packed `0xAABBGGRR` value.
    pub fn set_packed_color(&mut self, packed: u32) {
        self.color = packed;
    }

    #[must_use]
    pub fn color(&self) -> Color {
        Color::from_packed(self.color)
    }

    pub fn enable_blending(&mut self) -> Result<()> {
        if self.core.spec.is_blending_enabled() {
            return Ok(());
        }
        self.flush()?;
        self.core.spec.enable_blending();
        Ok(())
    }

    pub fn disable_blending(&mut self) -> Result<()> {
        if !self.core.spec.is_blending_enabled() {
            return Ok(());
        }
        self.flush()?;
        self.core.spec.disable_blending();
        Ok(())
    }

    #[must_use]
    pub fn is_blending_enabled(&self) -> bool {
        self.core.spec.is_blending_enabled()
    }

    pub fn set_blend_factors(&mut self, src: wgpu::BlendFactor, dst: wgpu::BlendFactor) -> Result<()> {
        self.set_blend_factors_separate(src, dst, src, dst)
    }

    pub fn set_blend_factors_separate(
        &mut self,
        src_color: wgpu::BlendFactor,
        dst_color: wgpu::BlendFactor,
        src_alpha: wgpu::BlendFactor,
        dst_alpha: wgpu::BlendFactor,
    ) -> Result<()> {
        if self.core.spec.blend_factors() == (src_color, dst_color, src_alpha, dst_alpha) {
            return Ok(());
        }
        self.flush()?;
        self.core
            .spec
            .set_blend_factors_separate(src_color, dst_color, src_alpha, dst_alpha);
        Ok(())
    }

    /// Sets blend factors from GL constants such as
    /// [`GL_SRC_ALPHA`](blend::GL_SRC_ALPHA).
    pub fn set_blend_function(&mut self, src: u32, dst: u32) -> Result<()> {
        self.set_blend_function_separate(src, dst, src, dst)
    }

    pub fn set_blend_function_separate(
        &mut self,
        src_color: u32,
        dst_color: u32,
        src_alpha: u32,
        dst_alpha: u32,
    ) -> Result<()> {
        let factor = |gl| blend::from_gl(gl).ok_or(LoomError::UnknownBlendFunction(gl));
        self.set_blend_factors_separate(
            factor(src_color)?,
            factor(dst_color)?,
            factor(src_alpha)?,
            factor(dst_alpha)?,
        )
    }

    /// Switches to `shader`, or back to the batch's default with `None`.
    pub fn set_shader(&mut self, shader: Option<ShaderSource>) -> Result<()> {
        let shader = shader.unwrap_or_else(|| self.core.default_shader().clone());
        if *self.core.spec.shader() == shader {
            return Ok(());
        }
        self.flush()?;
        self.core.spec.set_shader(shader);
        Ok(())
    }

    #[must_use]
    pub fn shader(&self) -> &ShaderSource {
        self.core.spec.shader()
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

    /// Sprites accumulated in the current run.
    #[must_use]
    pub fn pending_sprites(&self) -> u32 {
        (self.vertices.len() / VERTICES_PER_SPRITE) as u32
    }

    /// Distinct pipelines created so far.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.core.pipeline_count()
    }

    /// Bytes of the frame's vertex buffer already consumed by flushes.
    #[must_use]
    pub fn frame_vertex_bytes(&self) -> u64 {
        self.core.vertex_cursor()
    }

    #[must_use]
    pub fn settings(&self) -> &SpriteBatchSettings {
        &self.settings
    }

    #[must_use]
    pub fn device(&self) -> &D {
        self.core.device()
    }
}

/// Index pattern `[0, 1, 2, 2, 3, 0]` per quad, offset by four vertices.
fn build_indices(max_sprites: u32) -> Result<Vec<u16>> {
    let mut indices = Vec::with_capacity(max_sprites as usize * INDICES_PER_SPRITE);
    for sprite in 0..max_sprites {
        let base = u16::try_from(sprite * VERTICES_PER_SPRITE as u32).map_err(|_| {
            LoomError::InvalidSettings(format!(
                "max_sprites ({max_sprites}) overflows 16-bit indices"
            ))
        })?;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MAX_SPRITES_PER_RUN;

    fn assert_close(a: Vec2, b: Vec2) {
        assert!((a - b).length() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_sprite_vertex_matches_layout() {
        assert_eq!(
            std::mem::size_of::<SpriteVertex>() as u64,
            VertexLayout::sprite().array_stride
        );
    }

    #[test]
    fn test_index_pattern() {
        let indices = build_indices(2).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn test_indices_at_limit_fit_u16() {
        let indices = build_indices(MAX_SPRITES_PER_RUN).unwrap();
        assert_eq!(indices.len(), MAX_SPRITES_PER_RUN as usize * INDICES_PER_SPRITE);
        assert_eq!(indices.iter().copied().max(), Some(u16::MAX));
    }

    #[test]
    fn test_corners_without_rotation() {
        let corners = SpriteDraw::new(Vec2::new(10.0, 20.0), Vec2::new(4.0, 2.0)).corners();
        assert_close(corners[0], Vec2::new(10.0, 20.0));
        assert_close(corners[1], Vec2::new(10.0, 22.0));
        assert_close(corners[2], Vec2::new(14.0, 22.0));
        assert_close(corners[3], Vec2::new(14.0, 20.0));
    }

    #[test]
    fn test_corners_scale_around_origin() {
        let corners = SpriteDraw::new(Vec2::ZERO, Vec2::new(2.0, 2.0))
            .with_origin(Vec2::new(1.0, 1.0))
            .with_scale(Vec2::splat(2.0))
            .corners();
        assert_close(corners[0], Vec2::new(-1.0, -1.0));
        assert_close(corners[2], Vec2::new(3.0, 3.0));
    }

    #[test]
    fn test_corners_rotate_counter_clockwise() {
        let corners = SpriteDraw::new(Vec2::ZERO, Vec2::new(2.0, 1.0))
            .with_rotation(90.0)
            .corners();
        assert_close(corners[0], Vec2::ZERO);
        assert_close(corners[3], Vec2::new(0.0, 2.0));
        assert_close(corners[1], Vec2::new(-1.0, 0.0));
    }
}
