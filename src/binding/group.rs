//! Per-group state held by the binder.

use rustc_hash::FxHashMap;

use super::layout::{BindingKind, GroupLayout};
use crate::errors::{LoomError, Result};
use crate::gpu::{BindGroupEntry, BindingResource, GpuDevice};

/// A resource attached to one binding slot.
pub(crate) enum Attachment<D: GpuDevice> {
    Buffer {
        buffer: D::Buffer,
        offset: u64,
        size: u64,
    },
    TextureView(D::TextureView),
    Sampler(D::Sampler),
}

impl<D: GpuDevice> Attachment<D> {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Buffer { .. } => BindingKind::Buffer.name(),
            Self::TextureView(_) => BindingKind::Texture.name(),
            Self::Sampler(_) => BindingKind::Sampler.name(),
        }
    }

    fn fits(&self, kind: BindingKind) -> bool {
        matches!(
            (self, kind),
            (Self::Buffer { .. }, BindingKind::Buffer)
                | (
                    Self::TextureView(_),
                    BindingKind::Texture | BindingKind::StorageTexture
                )
                | (Self::Sampler(_), BindingKind::Sampler)
        )
    }

    fn as_resource(&self) -> BindingResource<'_, D> {
        match self {
            Self::Buffer {
                buffer,
                offset,
                size,
            } => BindingResource::Buffer {
                buffer,
                offset: *offset,
                size: std::num::NonZeroU64::new(*size),
            },
            Self::TextureView(view) => BindingResource::TextureView(view),
            Self::Sampler(sampler) => BindingResource::Sampler(sampler),
        }
    }
}

/// Layout, attachments and (once built) the bind group of one group id.
///
/// Field order is drop order: the bind group goes before the resources and
/// the layout it references.
pub(crate) struct GroupSlot<D: GpuDevice> {
    pub(crate) bind_group: Option<D::BindGroup>,
    attachments: FxHashMap<u32, Attachment<D>>,
    pub(crate) gpu_layout: D::BindGroupLayout,
    layout: GroupLayout,
}

impl<D: GpuDevice> GroupSlot<D> {
    pub(crate) fn new(device: &D, layout: GroupLayout) -> Self {
        let gpu_layout = device.create_bind_group_layout(layout.label(), layout.entries());
        Self {
            bind_group: None,
            attachments: FxHashMap::default(),
            gpu_layout,
            layout,
        }
    }

    #[inline]
    pub(crate) fn is_frozen(&self) -> bool {
        self.bind_group.is_some()
    }

    /// Attaches `attachment` to `binding` while the group is still mutable.
    pub(crate) fn attach(&mut self, group: u32, binding: u32, attachment: Attachment<D>) -> Result<()> {
        if self.is_frozen() {
            return Err(LoomError::BindGroupFrozen(group));
        }
        let kind = self
            .layout
            .kind_of(binding)
            .ok_or(LoomError::BindingNotInLayout { group, binding })?;
        if !attachment.fits(kind) {
            return Err(LoomError::ResourceKindMismatch {
                group,
                binding,
                expected: kind.name(),
                found: attachment.kind_name(),
            });
        }
        self.attachments.insert(binding, attachment);
        Ok(())
    }

    /// Creates the native bind group from the current attachments.
    pub(crate) fn build(&self, device: &D, group: u32) -> Result<D::BindGroup> {
        let entries = self
            .layout
            .entries()
            .iter()
            .map(|entry| {
                self.attachments
                    .get(&entry.binding)
                    .map(|attachment| BindGroupEntry {
                        binding: entry.binding,
                        resource: attachment.as_resource(),
                    })
                    .ok_or(LoomError::IncompleteBindGroup {
                        group,
                        binding: entry.binding,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Creating bind group {group} ({}, {} entries)",
            self.layout.label().unwrap_or("unlabeled"),
            entries.len()
        );
        Ok(device.create_bind_group(self.layout.label(), &self.gpu_layout, &entries))
    }
}
