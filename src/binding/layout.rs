//! Group layout declarations.
//!
//! A [`GroupLayout`] collects the `wgpu::BindGroupLayoutEntry` list for one
//! bind group. It is plain data: the native layout object is created by the
//! [`Binder`](super::Binder) when the group is defined.

use smallvec::SmallVec;
use wgpu::ShaderStages;

use crate::errors::{LoomError, Result};

/// Resource kind of a binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Buffer,
    Texture,
    Sampler,
    StorageTexture,
}

impl BindingKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
            Self::StorageTexture => "storage texture",
        }
    }

    fn of(ty: &wgpu::BindingType) -> Self {
        match ty {
            wgpu::BindingType::Buffer { .. } => Self::Buffer,
            wgpu::BindingType::Sampler(_) => Self::Sampler,
            wgpu::BindingType::StorageTexture { .. } => Self::StorageTexture,
            _ => Self::Texture,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupLayout {
    label: Option<String>,
    entries: SmallVec<[wgpu::BindGroupLayoutEntry; 4]>,
}

impl GroupLayout {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            entries: SmallVec::new(),
        }
    }

    /// Buffer binding. `min_size` of 0 leaves the size unchecked.
    pub fn add_buffer(
        &mut self,
        binding: u32,
        visibility: ShaderStages,
        ty: wgpu::BufferBindingType,
        min_size: u64,
        has_dynamic_offset: bool,
    ) -> &mut Self {
        self.push(
            binding,
            visibility,
            wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset,
                min_binding_size: std::num::NonZeroU64::new(min_size),
            },
        )
    }

    pub fn add_texture(
        &mut self,
        binding: u32,
        visibility: ShaderStages,
        sample_type: wgpu::TextureSampleType,
        view_dimension: wgpu::TextureViewDimension,
    ) -> &mut Self {
        self.push(
            binding,
            visibility,
            wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: false,
            },
        )
    }

    pub fn add_sampler(
        &mut self,
        binding: u32,
        visibility: ShaderStages,
        sampler_type: wgpu::SamplerBindingType,
    ) -> &mut Self {
        self.push(binding, visibility, wgpu::BindingType::Sampler(sampler_type))
    }

    pub fn add_storage_texture(
        &mut self,
        binding: u32,
        visibility: ShaderStages,
        access: wgpu::StorageTextureAccess,
        format: wgpu::TextureFormat,
        view_dimension: wgpu::TextureViewDimension,
    ) -> &mut Self {
        self.push(
            binding,
            visibility,
            wgpu::BindingType::StorageTexture {
                access,
                format,
                view_dimension,
            },
        )
    }

    fn push(&mut self, binding: u32, visibility: ShaderStages, ty: wgpu::BindingType) -> &mut Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty,
            count: None,
        });
        self
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn entries(&self) -> &[wgpu::BindGroupLayoutEntry] {
        &self.entries
    }

    /// Declared kind of `binding`, `None` when the slot is not part of this layout.
    #[must_use]
    pub fn kind_of(&self, binding: u32) -> Option<BindingKind> {
        self.entries
            .iter()
            .find(|e| e.binding == binding)
            .map(|e| BindingKind::of(&e.ty))
    }

    /// Rejects layouts that declare the same slot twice.
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|e| e.binding == entry.binding) {
                return Err(LoomError::DuplicateLayoutBinding(entry.binding));
            }
        }
        Ok(())
    }
}
