//! Strongly-typed pipeline handles.

use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a render pipeline stored in a [`PipelineCache`].
///
/// Resolve to the native object via [`PipelineCache::get`].
///
/// [`PipelineCache`]: super::cache::PipelineCache
/// [`PipelineCache::get`]: super::cache::PipelineCache::get
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub(crate) u32);

impl RenderPipelineId {
    /// Raw index into the pipeline storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an aggregate pipeline layout.
///
/// Native layout handles are not hashable, so the pipeline cache keys on
/// this id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineLayoutId(u64);

impl PipelineLayoutId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}
