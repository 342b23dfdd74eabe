//! Uniform Buffer & Slice Allocator
//!
//! A [`UniformBuffer`] pairs a GPU buffer with a CPU staging copy. Writes go
//! to staging and mark a dirty range; [`flush`](UniformBuffer::flush) copies
//! that range to the GPU.
//!
//! # Slices
//!
//! A buffer created with `max_slices > 1` is used with a dynamic offset: it
//! holds `max_slices` fixed-stride copies of the same block, one per flush.
//!
//! ```text
//!   0        stride     2·stride          max_slices·stride
//!   ├─────────┼──────────┼───── … ─────────┤
//!   │ slice 0 │ slice 1  │                 │
//!        ▲ cursor: writes land at cursor + offset
//! ```
//!
//! - [`begin_slices`](UniformBuffer::begin_slices) rewinds the cursor to 0.
//! - [`next_slice`](UniformBuffer::next_slice) uploads the slice under the
//!   cursor, returns its byte offset (the dynamic offset to bind with) and
//!   moves the cursor one stride forward.
//!
//! The cursor never passes `max_slices × stride`. Asking for one slice too
//! many is a capacity error and leaves the cursor where it is.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::errors::{LoomError, Result};
use crate::gpu::{BufferDesc, GpuDevice, align_to};

/// Stride alignment for single-slice buffers.
const BLOCK_ALIGNMENT: u64 = 16;

pub struct UniformBuffer<D: GpuDevice> {
    buffer: D::Buffer,
    staging: Vec<u8>,
    content_size: u64,
    stride: u64,
    max_slices: u32,

    // ---- Slice cursor ----
    cursor: u64,
    slices_used: u32,

    dirty: Option<Range<u64>>,
}

impl<D: GpuDevice> UniformBuffer<D> {
    /// Creates a buffer holding `max_slices` copies of a `content_size` block.
    ///
    /// `usage` is extended with `COPY_DST`.
    pub fn new(
        device: &D,
        label: &str,
        content_size: u64,
        max_slices: u32,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let max_slices = max_slices.max(1);
        let stride = if max_slices > 1 {
            align_to(
                content_size,
                u64::from(device.min_uniform_buffer_offset_alignment()),
            )
        } else {
            align_to(content_size, BLOCK_ALIGNMENT)
        };
        let size = stride * u64::from(max_slices);

        let buffer = device.create_buffer(&BufferDesc {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            buffer,
            staging: vec![0; size as usize],
            content_size,
            stride,
            max_slices,
            cursor: 0,
            slices_used: 0,
            dirty: None,
        }
    }

    /// Writes `bytes` at `offset` inside the slice under the cursor.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        if offset + len > self.content_size {
            return Err(LoomError::UniformOutOfRange {
                offset,
                len,
                capacity: self.content_size,
            });
        }
        let start = self.cursor + offset;
        let end = start + len;
        if end > self.staging.len() as u64 {
            return Err(LoomError::UniformOutOfRange {
                offset: start,
                len,
                capacity: self.staging.len() as u64,
            });
        }

        self.staging[start as usize..end as usize].copy_from_slice(bytes);
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(start)..range.end.max(end),
            None => start..end,
        });
        Ok(())
    }

    /// Uploads the dirty range, if any. Returns whether anything was written.
    pub fn flush(&mut self, device: &D) -> bool {
        let Some(range) = self.dirty.take() else {
            return false;
        };
        device.write_buffer(
            &self.buffer,
            range.start,
            &self.staging[range.start as usize..range.end as usize],
        );
        true
    }

    /// Rewinds the slice cursor to the start of the buffer.
    pub fn begin_slices(&mut self) {
        self.cursor = 0;
        self.slices_used = 0;
    }

    /// Uploads the current slice and returns its byte offset.
    pub fn next_slice(&mut self, device: &D) -> Result<u32> {
        if self.slices_used >= self.max_slices {
            return Err(LoomError::CapacityExceeded {
                what: "uniform slices",
                limit: self.max_slices as usize,
                knob: "max_flushes",
            });
        }
        let offset = self.cursor;
        self.flush(device);
        self.cursor += self.stride;
        self.slices_used += 1;
        Ok(offset as u32)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }

    /// Byte offset of the slice under the cursor.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    #[inline]
    #[must_use]
    pub fn max_slices(&self) -> u32 {
        self.max_slices
    }

    #[inline]
    #[must_use]
    pub fn slices_used(&self) -> u32 {
        self.slices_used
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.staging.len() as u64
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// CPU copy of the whole buffer.
    #[inline]
    #[must_use]
    pub fn staging(&self) -> &[u8] {
        &self.staging
    }
}

// ============================================================================
// Shared handle
// ============================================================================

static NEXT_UNIFORM_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Shared handle to a [`UniformBuffer`].
///
/// The batcher that owns the buffer flushes it and advances its slices; the
/// [`Binder`](crate::binding::Binder) keeps a clone to write named uniforms
/// into it. Equality and hashing go by buffer identity.
pub struct UniformBufferRef<D: GpuDevice> {
    id: u64,
    inner: Arc<Mutex<UniformBuffer<D>>>,
}

impl<D: GpuDevice> UniformBufferRef<D> {
    #[must_use]
    pub fn new(buffer: UniformBuffer<D>) -> Self {
        Self {
            id: NEXT_UNIFORM_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, UniformBuffer<D>> {
        self.inner.lock()
    }

    /// Clone of the native buffer handle.
    #[must_use]
    pub fn gpu_buffer(&self) -> D::Buffer {
        self.inner.lock().buffer().clone()
    }
}

impl<D: GpuDevice> Clone for UniformBufferRef<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: GpuDevice> PartialEq for UniformBufferRef<D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<D: GpuDevice> Eq for UniformBufferRef<D> {}

impl<D: GpuDevice> std::hash::Hash for UniformBufferRef<D> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<D: GpuDevice> std::fmt::Debug for UniformBufferRef<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBufferRef").field("id", &self.id).finish()
    }
}
