//! Pipeline Cache
//!
//! Owner of every render pipeline a batcher creates. Pipelines are stored in
//! a contiguous `Vec` and addressed through [`RenderPipelineId`] handles.
//!
//! Lookups are keyed by `(layout identity, spec hash)`. Each hash bucket
//! keeps the full [`PipelineKey`] of its entries so a hash collision can
//! never return a pipeline built for different state. Identity is therefore
//! a pure function of the layout and the spec value, independent of call
//! order.
//!
//! The cache is unbounded. Entries live until [`PipelineCache::clear`].

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::binding::AggregateLayout;
use crate::gpu::GpuDevice;

use super::id::{PipelineLayoutId, RenderPipelineId};
use super::key::PipelineKey;
use super::spec::PipelineSpec;

type Bucket = SmallVec<[(PipelineKey, RenderPipelineId); 1]>;

/// Central pipeline storage and deduplication cache.
pub struct PipelineCache<D: GpuDevice> {
    // ---- Storage (contiguous, indexed by Id) ----
    pipelines: Vec<D::RenderPipeline>,

    // ---- Canonical lookup ((layout, spec hash) → candidates) ----
    lookup: FxHashMap<(PipelineLayoutId, u64), Bucket>,
}

impl<D: GpuDevice> Default for PipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GpuDevice> PipelineCache<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipelines: Vec::with_capacity(8),
            lookup: FxHashMap::default(),
        }
    }

    /// Returns the pipeline for `(layout, spec)`, creating it on first use.
    pub fn find_pipeline(
        &mut self,
        device: &D,
        layout: &AggregateLayout<D>,
        spec: &PipelineSpec,
    ) -> RenderPipelineId {
        let lookup_key = (layout.id(), spec.hash());
        let key = spec.key();

        if let Some(bucket) = self.lookup.get(&lookup_key)
            && let Some((_, id)) = bucket.iter().find(|(k, _)| *k == key)
        {
            return *id;
        }

        log::debug!(
            "Creating render pipeline #{} (shader '{}', blend {}, {:?})",
            self.pipelines.len(),
            spec.shader().label(),
            spec.is_blending_enabled(),
            spec.topology(),
        );
        let pipeline = device.create_render_pipeline(layout.raw(), spec);
        let id = self.push_render_pipeline(pipeline);
        self.lookup.entry(lookup_key).or_default().push((key, id));
        id
    }

    /// Retrieve a render pipeline by handle. **Panics** if the id is invalid.
    #[inline]
    #[must_use]
    pub fn get(&self, id: RenderPipelineId) -> &D::RenderPipeline {
        &self.pipelines[id.index()]
    }

    /// Number of distinct pipelines created so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Drops every cached pipeline. Outstanding ids become invalid.
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.pipelines.clear();
    }

    fn push_render_pipeline(&mut self, pipeline: D::RenderPipeline) -> RenderPipelineId {
        let id = RenderPipelineId(self.pipelines.len() as u32);
        self.pipelines.push(pipeline);
        id
    }
}
