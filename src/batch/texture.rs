use std::sync::atomic::{AtomicU64, Ordering};

use crate::color::Color;
use crate::gpu::GpuDevice;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

/// A sampled texture as seen by the batchers: view, sampler and size.
///
/// Batchers compare textures by identity to decide where a run ends. Clones
/// share the identity of the original.
pub struct BatchTexture<D: GpuDevice> {
    id: u64,
    view: D::TextureView,
    sampler: D::Sampler,
    width: u32,
    height: u32,
}

impl<D: GpuDevice> BatchTexture<D> {
    #[must_use]
    pub fn new(view: D::TextureView, sampler: D::Sampler, width: u32, height: u32) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            view,
            sampler,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Uploads tightly packed RGBA8 `pixels` and pairs them with a linear
    /// sampler.
    pub fn from_rgba8(device: &D, label: &str, width: u32, height: u32, pixels: &[u8]) -> Self {
        let view = device.create_texture_rgba8(Some(label), width, height, pixels);
        let sampler = device.create_sampler(Some(label), wgpu::FilterMode::Linear);
        Self::new(view, sampler, width, height)
    }

    /// A 1x1 texture of a single color.
    pub fn solid(device: &D, label: &str, color: Color) -> Self {
        Self::from_rgba8(device, label, 1, 1, &color.to_packed().to_le_bytes())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> &D::TextureView {
        &self.view
    }

    #[inline]
    #[must_use]
    pub fn sampler(&self) -> &D::Sampler {
        &self.sampler
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
}

impl<D: GpuDevice> Clone for BatchTexture<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            view: self.view.clone(),
            sampler: self.sampler.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<D: GpuDevice> PartialEq for BatchTexture<D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<D: GpuDevice> Eq for BatchTexture<D> {}

impl<D: GpuDevice> std::fmt::Debug for BatchTexture<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTexture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
