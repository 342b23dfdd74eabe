//! Batcher Settings
//!
//! Capacity knobs and render-target formats for [`SpriteBatch`] and
//! [`MeshBatch`]. Every capacity here is a *fixed* budget: buffers are sized
//! from it at construction and never grow mid-frame. When a budget is
//! exhausted the batcher refuses the operation with
//! [`LoomError::CapacityExceeded`], and the error message names the field
//! below that needs raising.
//!
//! Both structs deserialize from partial documents (missing fields take their
//! defaults), so they can live in an application's JSON or TOML config.
//!
//! ```rust,ignore
//! use loom::settings::SpriteBatchSettings;
//!
//! let settings = SpriteBatchSettings {
//!     max_sprites: 4096,
//!     max_flushes: 256,
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```
//!
//! [`SpriteBatch`]: crate::batch::SpriteBatch
//! [`MeshBatch`]: crate::batch::MeshBatch
//! [`LoomError::CapacityExceeded`]: crate::errors::LoomError::CapacityExceeded

use serde::{Deserialize, Serialize};

use crate::errors::{LoomError, Result};

/// Upper bound for [`SpriteBatchSettings::max_sprites`].
///
/// Sprite indices are 16-bit unsigned: a run of `n` sprites references
/// vertices `0..4n`, so `4 * MAX_SPRITES_PER_RUN - 1` must fit in `u16`.
pub const MAX_SPRITES_PER_RUN: u32 = 16384;

const VALID_SAMPLE_COUNTS: [u32; 4] = [1, 2, 4, 8];

// ---------------------------------------------------------------------------
// SpriteBatchSettings
// ---------------------------------------------------------------------------

/// Configuration for a [`SpriteBatch`](crate::batch::SpriteBatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteBatchSettings {
    /// Maximum sprites in a single run (one physical draw call).
    ///
    /// Sizes the CPU staging area and the shared index buffer. A draw that
    /// would exceed it flushes first. Capped at [`MAX_SPRITES_PER_RUN`].
    pub max_sprites: u32,

    /// Maximum sprites submitted across all runs of one frame.
    ///
    /// Sizes the GPU vertex buffer. Every flush of a frame appends to it, so
    /// earlier flushes of the same frame are never overwritten.
    pub max_sprites_per_frame: u32,

    /// Maximum flushes per frame.
    ///
    /// Each flush consumes one slice of the dynamic-offset uniform buffer
    /// holding its projection-view matrix.
    pub max_flushes: u32,

    /// Color attachment format of the render pass the batch draws into.
    pub color_format: wgpu::TextureFormat,

    /// Depth attachment format, or `None` when the pass has no depth target.
    pub depth_format: Option<wgpu::TextureFormat>,

    /// MSAA sample count of the render pass. One of 1, 2, 4, 8.
    pub sample_count: u32,
}

impl Default for SpriteBatchSettings {
    fn default() -> Self {
        Self {
            max_sprites: 1000,
            max_sprites_per_frame: 8000,
            max_flushes: 100,
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: None,
            sample_count: 1,
        }
    }
}

impl SpriteBatchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_sprites == 0 || self.max_sprites > MAX_SPRITES_PER_RUN {
            return Err(LoomError::InvalidSettings(format!(
                "max_sprites must be in 1..={MAX_SPRITES_PER_RUN}, got {}",
                self.max_sprites
            )));
        }
        if self.max_sprites_per_frame < self.max_sprites {
            return Err(LoomError::InvalidSettings(format!(
                "max_sprites_per_frame ({}) must be at least max_sprites ({})",
                self.max_sprites_per_frame, self.max_sprites
            )));
        }
        validate_common(self.max_flushes, self.sample_count)
    }
}

// ---------------------------------------------------------------------------
// MeshBatchSettings
// ---------------------------------------------------------------------------

/// Configuration for a [`MeshBatch`](crate::batch::MeshBatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshBatchSettings {
    /// Maximum vertices in a single run.
    pub max_vertices: u32,
    /// Maximum vertices submitted across all runs of one frame.
    pub max_vertices_per_frame: u32,
    /// Maximum flushes per frame.
    pub max_flushes: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

impl Default for MeshBatchSettings {
    fn default() -> Self {
        Self {
            max_vertices: 6000,
            max_vertices_per_frame: 60000,
            max_flushes: 100,
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: None,
            sample_count: 1,
        }
    }
}

impl MeshBatchSettings {
    pub fn validate(&self) -> Result<()> {
        // A run must hold at least one triangle.
        if self.max_vertices < 3 {
            return Err(LoomError::InvalidSettings(format!(
                "max_vertices must be at least 3, got {}",
                self.max_vertices
            )));
        }
        if self.max_vertices_per_frame < self.max_vertices {
            return Err(LoomError::InvalidSettings(format!(
                "max_vertices_per_frame ({}) must be at least max_vertices ({})",
                self.max_vertices_per_frame, self.max_vertices
            )));
        }
        validate_common(self.max_flushes, self.sample_count)
    }
}

fn validate_common(max_flushes: u32, sample_count: u32) -> Result<()> {
    if max_flushes == 0 {
        return Err(LoomError::InvalidSettings(
            "max_flushes must be at least 1".to_string(),
        ));
    }
    if !VALID_SAMPLE_COUNTS.contains(&sample_count) {
        return Err(LoomError::InvalidSettings(format!(
            "sample_count must be one of {VALID_SAMPLE_COUNTS:?}, got {sample_count}"
        )));
    }
    Ok(())
}
