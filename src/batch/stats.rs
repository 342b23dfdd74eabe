/// Diagnostic counters of a batcher. Read-only; they never affect behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Draw calls issued since the last `begin()`.
    pub render_calls: u32,
    /// Flushes submitted in the current frame.
    pub flush_count: u32,
    /// Distinct pipelines cached, refreshed at `end()`.
    pub pipeline_count: u32,
    /// Sprites or vertices submitted in the current frame.
    pub items_in_frame: u32,
    /// Largest single run in the current frame.
    pub max_items_in_run: u32,
    /// Flushes refused at `end()` because a budget was exhausted.
    pub refused_flushes: u32,
}
