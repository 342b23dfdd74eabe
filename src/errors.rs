//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! [`LoomError`] falls into two families:
//! - **Misuse** errors: an API was used out of contract (an undefined name or
//!   group, a write into a binding that is not part of a uniform block, a
//!   `begin()` without `end()`, an attachment to a frozen bind group). These
//!   point at a programming error in the caller and are never absorbed.
//! - **Capacity** errors: a fixed per-frame budget was exhausted. The
//!   offending operation is refused and nothing already submitted is
//!   touched. The message names the limit and the settings knob to raise.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, LoomError>`.
//!
//! ```rust,ignore
//! use loom::errors::{LoomError, Result};
//!
//! fn upload(binder: &mut Binder<WgpuDevice>) -> Result<()> {
//!     binder.set_uniform("projection_view", UniformValue::Mat4(view))?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoomError {
    // ========================================================================
    // Binding Resolution Errors
    // ========================================================================
    /// A group id was used without a prior `define_group`.
    #[error("Group {0} not defined. Use define_group()")]
    GroupNotDefined(u32),

    /// A binding name was used without a prior `define_binding`/`define_uniform`.
    #[error("Uniform name {0} not defined.")]
    BindingNotDefined(String),

    /// A uniform write targeted a binding declared without a byte offset.
    #[error("Uniform name {0} is not defined in a uniform buffer.")]
    NotInUniformBlock(String),

    /// A uniform write resolved to a slot that has no buffer attached.
    #[error("Uniform name {name} has no buffer attached at group {group}, binding {binding}")]
    BufferNotAttached {
        name: String,
        group: u32,
        binding: u32,
    },

    /// A uniform write would fall outside the backing buffer.
    #[error("Uniform write of {len} bytes at offset {offset} exceeds buffer capacity {capacity}")]
    UniformOutOfRange { offset: u64, len: u64, capacity: u64 },

    // ========================================================================
    // Bind Group Shape Errors
    // ========================================================================
    /// The binding slot is not declared in the group's layout.
    #[error("Binding {binding} is not part of the layout for group {group}")]
    BindingNotInLayout { group: u32, binding: u32 },

    /// The attached resource kind differs from the declared one.
    #[error("Binding {binding} of group {group} expects a {expected}, got a {found}")]
    ResourceKindMismatch {
        group: u32,
        binding: u32,
        expected: &'static str,
        found: &'static str,
    },

    /// Attachment attempted after the bind group was built.
    #[error("Bind group {0} is already built; release_bind_group() before attaching resources")]
    BindGroupFrozen(u32),

    /// A bind group was requested while a declared slot has no resource.
    #[error("Bind group {group} is incomplete: binding {binding} has no resource attached")]
    IncompleteBindGroup { group: u32, binding: u32 },

    /// Two entries of one layout share a slot index.
    #[error("Binding slot {0} declared twice in the same group layout")]
    DuplicateLayoutBinding(u32),

    /// A group was (re)defined after the pipeline layout was aggregated.
    #[error("Cannot define group {0}: the pipeline layout has already been built")]
    LayoutFrozen(u32),

    // ========================================================================
    // Batch State Errors
    // ========================================================================
    /// `begin()` while already recording.
    #[error("Must end() before begin()")]
    AlreadyRecording,

    /// `end()`, `flush()` or a draw while idle.
    #[error("Cannot end() without begin()")]
    NotRecording,

    /// A vertex slice does not hold a whole number of primitives.
    #[error("Vertex count {count} is not a multiple of {multiple}")]
    InvalidVertexCount { count: usize, multiple: usize },

    /// A GL blend constant with no `wgpu::BlendFactor` counterpart.
    #[error("Unknown blend function 0x{0:04x}")]
    UnknownBlendFunction(u32),

    // ========================================================================
    // Capacity Errors
    // ========================================================================
    /// A fixed per-frame budget has been exhausted.
    #[error("Too many {what} ({limit}). Increase {knob}.")]
    CapacityExceeded {
        /// What ran out (e.g. "flushes", "slices").
        what: &'static str,
        /// The configured limit.
        limit: usize,
        /// The settings field that controls the limit.
        knob: &'static str,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl LoomError {
    /// Returns `true` for errors caused by an exhausted fixed budget.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Returns `true` for contract violations by the caller.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        !self.is_capacity() && !matches!(self, Self::InvalidSettings(_))
    }
}

/// Alias for `Result<T, LoomError>`.
pub type Result<T> = std::result::Result<T, LoomError>;
