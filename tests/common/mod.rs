//! In-memory device for integration tests.
//!
//! `RecordingDevice` implements `GpuDevice` without a GPU: buffers are byte
//! vectors, every other object is a numbered handle, and every render pass
//! command lands in a shared journal the test can inspect afterwards.

#![allow(dead_code)]

use std::cell::{Ref, RefCell};
use std::num::NonZeroU64;
use std::ops::Range;
use std::rc::Rc;

use loom::batch::BatchTexture;
use loom::gpu::{BindGroupEntry, BindingResource, BufferDesc, GpuDevice, RenderPassEncoder};
use loom::pipeline::{PipelineKey, PipelineSpec};

// ============================================================================
// Handles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineLayoutHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone)]
pub struct BufferRecord {
    pub label: Option<String>,
    pub usage: wgpu::BufferUsages,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub label: Option<String>,
    pub view: ViewHandle,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LayoutRecord {
    pub label: Option<String>,
    pub entries: Vec<wgpu::BindGroupLayoutEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRecord {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    TextureView(ViewHandle),
    Sampler(SamplerHandle),
}

#[derive(Debug, Clone)]
pub struct BindGroupRecord {
    pub label: Option<String>,
    pub layout: LayoutHandle,
    pub entries: Vec<(u32, ResourceRecord)>,
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutRecord {
    pub label: Option<String>,
    pub groups: Vec<LayoutHandle>,
}

#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub layout: PipelineLayoutHandle,
    pub key: PipelineKey,
    pub shader_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPipeline(PipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
        offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: wgpu::IndexFormat,
        offset: u64,
        size: u64,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::DrawIndexed { .. })
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    pub buffers: Vec<BufferRecord>,
    pub writes: Vec<WriteRecord>,
    pub textures: Vec<TextureRecord>,
    pub bind_group_layouts: Vec<LayoutRecord>,
    pub bind_groups: Vec<BindGroupRecord>,
    pub pipeline_layouts: Vec<PipelineLayoutRecord>,
    pub pipelines: Vec<PipelineRecord>,
    pub commands: Vec<Command>,
    next_texture: u32,
}

// ============================================================================
// Device
// ============================================================================

#[derive(Clone)]
pub struct RecordingDevice {
    journal: Rc<RefCell<Journal>>,
    alignment: u32,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_alignment(256)
    }

    pub fn with_alignment(alignment: u32) -> Self {
        Self {
            journal: Rc::new(RefCell::new(Journal::default())),
            alignment,
        }
    }

    pub fn journal(&self) -> Ref<'_, Journal> {
        self.journal.borrow()
    }

    pub fn pass(&self) -> RecordingPass {
        RecordingPass {
            journal: Rc::clone(&self.journal),
        }
    }

    /// A fresh texture view / sampler pair of the given size.
    pub fn texture(&self, width: u32, height: u32) -> BatchTexture<Self> {
        let id = self.next_texture_id();
        BatchTexture::new(ViewHandle(id), SamplerHandle(id), width, height)
    }

    fn next_texture_id(&self) -> u32 {
        let mut journal = self.journal.borrow_mut();
        let id = journal.next_texture;
        journal.next_texture += 1;
        id
    }

    /// The uploaded texture a view was created for.
    pub fn texture_record(&self, view: ViewHandle) -> Option<TextureRecord> {
        self.journal
            .borrow()
            .textures
            .iter()
            .find(|t| t.view == view)
            .cloned()
    }

    /// Texture views bound at `@group(index)` by the recorded commands, in order.
    pub fn bound_views(&self, index: u32) -> Vec<ViewHandle> {
        let journal = self.journal.borrow();
        journal
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::SetBindGroup {
                    index: i,
                    bind_group,
                    ..
                } if *i == index => Some(*bind_group),
                _ => None,
            })
            .flat_map(|group| journal.bind_groups[group.0 as usize].entries.clone())
            .filter_map(|(_, resource)| match resource {
                ResourceRecord::TextureView(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Vec<u8> {
        self.journal.borrow().buffers[buffer.0 as usize].data.clone()
    }

    pub fn buffer_by_label(&self, label: &str) -> BufferHandle {
        let journal = self.journal.borrow();
        let index = journal
            .buffers
            .iter()
            .position(|b| b.label.as_deref() == Some(label))
            .unwrap_or_else(|| panic!("no buffer labeled '{label}'"));
        BufferHandle(index as u32)
    }

    pub fn read_f32s(&self, buffer: BufferHandle, offset: u64, count: usize) -> Vec<f32> {
        let data = self.buffer_data(buffer);
        let start = offset as usize;
        data[start..start + count * 4]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.journal.borrow().commands.clone()
    }

    pub fn draws(&self) -> Vec<Command> {
        self.commands().into_iter().filter(Command::is_draw).collect()
    }

    pub fn clear_commands(&self) {
        self.journal.borrow_mut().commands.clear();
    }

    pub fn pipeline_count(&self) -> usize {
        self.journal.borrow().pipelines.len()
    }

    pub fn bind_group_count(&self) -> usize {
        self.journal.borrow().bind_groups.len()
    }
}

impl GpuDevice for RecordingDevice {
    type Buffer = BufferHandle;
    type TextureView = ViewHandle;
    type Sampler = SamplerHandle;
    type BindGroupLayout = LayoutHandle;
    type BindGroup = BindGroupHandle;
    type PipelineLayout = PipelineLayoutHandle;
    type RenderPipeline = PipelineHandle;
    type RenderPass = RecordingPass;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> BufferHandle {
        let mut journal = self.journal.borrow_mut();
        journal.buffers.push(BufferRecord {
            label: desc.label.map(str::to_string),
            usage: desc.usage,
            data: vec![0; desc.size as usize],
        });
        BufferHandle(journal.buffers.len() as u32 - 1)
    }

    fn write_buffer(&self, buffer: &BufferHandle, offset: u64, data: &[u8]) {
        assert_eq!(offset % 4, 0, "unaligned write offset {offset}");
        assert_eq!(data.len() % 4, 0, "unaligned write size {}", data.len());

        let mut journal = self.journal.borrow_mut();
        let record = &mut journal.buffers[buffer.0 as usize];
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= record.data.len(),
            "write {start}..{end} past the end of {:?} ({} bytes)",
            record.label,
            record.data.len()
        );
        record.data[start..end].copy_from_slice(data);
        journal.writes.push(WriteRecord {
            buffer: *buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture_rgba8(
        &self,
        label: Option<&str>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> ViewHandle {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        let view = ViewHandle(self.next_texture_id());
        self.journal.borrow_mut().textures.push(TextureRecord {
            label: label.map(str::to_string),
            view,
            width,
            height,
            pixels: pixels.to_vec(),
        });
        view
    }

    fn create_sampler(&self, _label: Option<&str>, _filter: wgpu::FilterMode) -> SamplerHandle {
        SamplerHandle(self.next_texture_id())
    }

    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> LayoutHandle {
        let mut journal = self.journal.borrow_mut();
        journal.bind_group_layouts.push(LayoutRecord {
            label: label.map(str::to_string),
            entries: entries.to_vec(),
        });
        LayoutHandle(journal.bind_group_layouts.len() as u32 - 1)
    }

    fn create_bind_group(
        &self,
        label: Option<&str>,
        layout: &LayoutHandle,
        entries: &[BindGroupEntry<'_, Self>],
    ) -> BindGroupHandle {
        let entries = entries
            .iter()
            .map(|entry| {
                let resource = match &entry.resource {
                    BindingResource::Buffer {
                        buffer,
                        offset,
                        size,
                    } => ResourceRecord::Buffer {
                        buffer: **buffer,
                        offset: *offset,
                        size: size.map(NonZeroU64::get),
                    },
                    BindingResource::TextureView(view) => ResourceRecord::TextureView(**view),
                    BindingResource::Sampler(sampler) => ResourceRecord::Sampler(**sampler),
                };
                (entry.binding, resource)
            })
            .collect();

        let mut journal = self.journal.borrow_mut();
        journal.bind_groups.push(BindGroupRecord {
            label: label.map(str::to_string),
            layout: *layout,
            entries,
        });
        BindGroupHandle(journal.bind_groups.len() as u32 - 1)
    }

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        bind_group_layouts: &[&LayoutHandle],
    ) -> PipelineLayoutHandle {
        let mut journal = self.journal.borrow_mut();
        journal.pipeline_layouts.push(PipelineLayoutRecord {
            label: label.map(str::to_string),
            groups: bind_group_layouts.iter().map(|l| **l).collect(),
        });
        PipelineLayoutHandle(journal.pipeline_layouts.len() as u32 - 1)
    }

    fn create_render_pipeline(
        &self,
        layout: &PipelineLayoutHandle,
        spec: &PipelineSpec,
    ) -> PipelineHandle {
        let mut journal = self.journal.borrow_mut();
        journal.pipelines.push(PipelineRecord {
            layout: *layout,
            key: spec.key(),
            shader_label: spec.shader().label().to_string(),
        });
        PipelineHandle(journal.pipelines.len() as u32 - 1)
    }

    fn min_uniform_buffer_offset_alignment(&self) -> u32 {
        self.alignment
    }
}

// ============================================================================
// Pass
// ============================================================================

#[derive(Debug)]
pub struct RecordingPass {
    journal: Rc<RefCell<Journal>>,
}

impl RecordingPass {
    fn push(&mut self, command: Command) {
        self.journal.borrow_mut().commands.push(command);
    }
}

impl RenderPassEncoder<RecordingDevice> for RecordingPass {
    fn set_pipeline(&mut self, pipeline: &PipelineHandle) {
        self.push(Command::SetPipeline(*pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupHandle, offsets: &[u32]) {
        self.push(Command::SetBindGroup {
            index,
            bind_group: *bind_group,
            offsets: offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferHandle, offset: u64, size: u64) {
        self.push(Command::SetVertexBuffer {
            slot,
            buffer: *buffer,
            offset,
            size,
        });
    }

    fn set_index_buffer(
        &mut self,
        buffer: &BufferHandle,
        format: wgpu::IndexFormat,
        offset: u64,
        size: u64,
    ) {
        self.push(Command::SetIndexBuffer {
            buffer: *buffer,
            format,
            offset,
            size,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.push(Command::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.push(Command::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
