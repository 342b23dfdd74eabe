//! Resource Binder
//!
//! Lets callers address shader resources by name instead of by raw
//! `(group, binding)` indices.
//!
//! # Phases
//!
//! 1. **Declare.** `define_group` registers a [`GroupLayout`] per group id,
//!    and `define_binding` / `define_uniform` map names to slots. Groups may
//!    be declared in any order and need not be contiguous.
//! 2. **Attach.** `set_buffer` / `set_texture` / `set_sampler` attach
//!    resources to slots of a group that has not been built yet.
//! 3. **Build.** `get_bind_group` creates the native bind group from the
//!    attachments and caches it. From then on the group is frozen: further
//!    attachments fail with [`LoomError::BindGroupFrozen`] until
//!    `release_bind_group` drops the cached instance.
//!
//! Uniform values are written by name into attached [`UniformBufferRef`]s
//! at any time. The binder never flushes them; the buffer owner uploads
//! before the draw that reads them.
//!
//! ```rust,ignore
//! binder.define_group(0, layout)?;
//! binder.define_uniform("mvp", 0, 0, 0);
//! binder.define_binding("tex", 0, 1);
//! binder.set_buffer("mvp", &uniforms, 0, 64)?;
//! binder.set_texture("tex", &view)?;
//! binder.set_uniform("mvp", Mat4::IDENTITY)?;
//! binder.bind_group(&mut pass, 0, &[])?;
//! ```

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::group::{Attachment, GroupSlot};
use super::layout::GroupLayout;
use super::table::{BindingEntry, BindingTable};
use super::value::UniformValue;
use crate::buffer::UniformBufferRef;
use crate::errors::{LoomError, Result};
use crate::gpu::{GpuDevice, RenderPassEncoder};
use crate::pipeline::PipelineLayoutId;

/// Where a buffer attachment's uniform writes land.
pub struct BufferInfo<D: GpuDevice> {
    pub buffer: UniformBufferRef<D>,
    pub offset: u64,
    pub size: u64,
}

/// The pipeline layout built from every declared group.
pub struct AggregateLayout<D: GpuDevice> {
    id: PipelineLayoutId,
    label: String,
    group_count: u32,
    layout: D::PipelineLayout,
}

impl<D: GpuDevice> AggregateLayout<D> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> PipelineLayoutId {
        self.id
    }

    /// Label given on the call that built the layout.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of `@group` slots, including empty gap fillers.
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> &D::PipelineLayout {
        &self.layout
    }
}

/// Name-to-slot resolver, bind group cache and pipeline layout aggregator.
///
/// Fields drop in declaration order: the aggregate layout first, then the
/// bind groups with their layouts, then the buffer handles.
pub struct Binder<D: GpuDevice> {
    aggregate: Option<AggregateLayout<D>>,
    groups: FxHashMap<u32, GroupSlot<D>>,
    gap_layout: Option<D::BindGroupLayout>,
    buffers: FxHashMap<(u32, u32), BufferInfo<D>>,
    table: BindingTable,
    device: D,
}

impl<D: GpuDevice> Binder<D> {
    #[must_use]
    pub fn new(device: D) -> Self {
        Self {
            aggregate: None,
            groups: FxHashMap::default(),
            gap_layout: None,
            buffers: FxHashMap::default(),
            table: BindingTable::new(),
            device,
        }
    }

    // ========================================================================
    // Declaration
    // ========================================================================

    /// Registers the layout of `group`.
    ///
    /// Redefining a group replaces its layout and drops its attachments. Not
    /// allowed once the group's bind group or the pipeline layout is built.
    pub fn define_group(&mut self, group: u32, layout: GroupLayout) -> Result<()> {
        layout.validate()?;
        if self.aggregate.is_some() {
            return Err(LoomError::LayoutFrozen(group));
        }
        if self.groups.get(&group).is_some_and(GroupSlot::is_frozen) {
            return Err(LoomError::BindGroupFrozen(group));
        }
        self.buffers.retain(|&(g, _), _| g != group);
        self.groups
            .insert(group, GroupSlot::new(&self.device, layout));
        Ok(())
    }

    /// Maps `name` to a whole-resource binding (texture, sampler, buffer).
    pub fn define_binding(&mut self, name: &str, group: u32, binding: u32) {
        self.table.define(BindingEntry {
            name: name.to_string(),
            group,
            binding,
            byte_offset: None,
        });
    }

    /// Maps `name` to a field at `byte_offset` inside a uniform block.
    pub fn define_uniform(&mut self, name: &str, group: u32, binding: u32, byte_offset: u32) {
        self.table.define(BindingEntry {
            name: name.to_string(),
            group,
            binding,
            byte_offset: Some(byte_offset),
        });
    }

    #[inline]
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BindingEntry> {
        self.table.find(name)
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    pub fn set_buffer(
        &mut self,
        name: &str,
        buffer: &UniformBufferRef<D>,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let entry = self.table.resolve(name)?;
        let (group, binding) = (entry.group, entry.binding);
        self.set_buffer_at(group, binding, buffer, offset, size)
    }

    /// Attaches `buffer[offset..offset + size]` and records it for uniform writes.
    pub fn set_buffer_at(
        &mut self,
        group: u32,
        binding: u32,
        buffer: &UniformBufferRef<D>,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        self.slot_mut(group)?.attach(
            group,
            binding,
            Attachment::Buffer {
                buffer: buffer.gpu_buffer(),
                offset,
                size,
            },
        )?;
        self.buffers.insert(
            (group, binding),
            BufferInfo {
                buffer: buffer.clone(),
                offset,
                size,
            },
        );
        Ok(())
    }

    pub fn set_texture(&mut self, name: &str, view: &D::TextureView) -> Result<()> {
        let entry = self.table.resolve(name)?;
        let (group, binding) = (entry.group, entry.binding);
        self.slot_mut(group)?
            .attach(group, binding, Attachment::TextureView(view.clone()))
    }

    pub fn set_sampler(&mut self, name: &str, sampler: &D::Sampler) -> Result<()> {
        let entry = self.table.resolve(name)?;
        let (group, binding) = (entry.group, entry.binding);
        self.slot_mut(group)?
            .attach(group, binding, Attachment::Sampler(sampler.clone()))
    }

    /// The recorded buffer attachment of a slot.
    #[must_use]
    pub fn buffer_info(&self, group: u32, binding: u32) -> Option<&BufferInfo<D>> {
        self.buffers.get(&(group, binding))
    }

    // ========================================================================
    // Uniform writes
    // ========================================================================

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        self.set_uniform_at(name, value, 0)
    }

    /// Writes `value` at `extra_offset` bytes past the field's offset, for
    /// addressing array elements.
    pub fn set_uniform_at(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
        extra_offset: u32,
    ) -> Result<()> {
        let value = value.into();
        let entry = self.table.resolve(name)?;
        let field_offset = entry
            .byte_offset
            .ok_or_else(|| LoomError::NotInUniformBlock(name.to_string()))?;
        let info = self.buffers.get(&(entry.group, entry.binding)).ok_or_else(|| {
            LoomError::BufferNotAttached {
                name: name.to_string(),
                group: entry.group,
                binding: entry.binding,
            }
        })?;

        let bytes = value.as_bytes();
        let offset = u64::from(field_offset) + u64::from(extra_offset);
        if info.size > 0 && offset + bytes.len() as u64 > info.size {
            return Err(LoomError::UniformOutOfRange {
                offset,
                len: bytes.len() as u64,
                capacity: info.size,
            });
        }
        info.buffer.lock().write(info.offset + offset, bytes)
    }

    // ========================================================================
    // Bind groups
    // ========================================================================

    /// Returns the bind group of `group`, building and freezing it on first call.
    pub fn get_bind_group(&mut self, group: u32) -> Result<&D::BindGroup> {
        let slot = self
            .groups
            .get_mut(&group)
            .ok_or(LoomError::GroupNotDefined(group))?;
        let bind_group = match slot.bind_group.take() {
            Some(bind_group) => bind_group,
            None => slot.build(&self.device, group)?,
        };
        Ok(&*slot.bind_group.insert(bind_group))
    }

    /// Drops the cached bind group of `group`, making it mutable again.
    ///
    /// Returns whether a bind group existed.
    pub fn release_bind_group(&mut self, group: u32) -> Result<bool> {
        Ok(self.slot_mut(group)?.bind_group.take().is_some())
    }

    /// Binds the bind group of `group` at `@group(group)`.
    pub fn bind_group<P>(&mut self, pass: &mut P, group: u32, dynamic_offsets: &[u32]) -> Result<()>
    where
        P: RenderPassEncoder<D> + ?Sized,
    {
        let bind_group = self.get_bind_group(group)?;
        pass.set_bind_group(group, bind_group, dynamic_offsets);
        Ok(())
    }

    // ========================================================================
    // Pipeline layout
    // ========================================================================

    /// Returns the pipeline layout spanning all declared groups.
    ///
    /// Built on first call and memoized for the binder's lifetime. A later
    /// call with a different `label` returns the same layout unchanged.
    pub fn pipeline_layout(&mut self, label: &str) -> Result<&AggregateLayout<D>> {
        let aggregate = match self.aggregate.take() {
            Some(aggregate) => {
                if aggregate.label != label {
                    log::warn!(
                        "Pipeline layout '{}' already built; label '{label}' ignored",
                        aggregate.label
                    );
                }
                aggregate
            }
            None => self.build_aggregate(label)?,
        };
        Ok(&*self.aggregate.insert(aggregate))
    }

    fn build_aggregate(&mut self, label: &str) -> Result<AggregateLayout<D>> {
        // Explicit ascending order; map iteration order is unspecified.
        let mut ids: SmallVec<[u32; 4]> = self.groups.keys().copied().collect();
        ids.sort_unstable();

        let group_count = ids.last().map_or(0, |&max| max + 1);
        let gap_layout = if ids.len() < group_count as usize {
            let device = &self.device;
            Some(
                &*self
                    .gap_layout
                    .get_or_insert_with(|| device.create_bind_group_layout(Some("empty group"), &[])),
            )
        } else {
            None
        };

        let mut layouts = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            match self.groups.get(&group) {
                Some(slot) => layouts.push(&slot.gpu_layout),
                None => layouts.push(gap_layout.ok_or(LoomError::GroupNotDefined(group))?),
            }
        }

        log::debug!("Creating pipeline layout '{label}' with groups {ids:?}");
        let layout = self.device.create_pipeline_layout(Some(label), &layouts);
        Ok(AggregateLayout {
            id: PipelineLayoutId::next(),
            label: label.to_string(),
            group_count,
            layout,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Declared group ids in ascending order.
    #[must_use]
    pub fn group_ids(&self) -> SmallVec<[u32; 4]> {
        let mut ids: SmallVec<[u32; 4]> = self.groups.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn slot_mut(&mut self, group: u32) -> Result<&mut GroupSlot<D>> {
        self.groups
            .get_mut(&group)
            .ok_or(LoomError::GroupNotDefined(group))
    }
}
