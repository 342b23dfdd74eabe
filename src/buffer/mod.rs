//! CPU-staged GPU buffers.

pub mod uniform;

pub use uniform::{UniformBuffer, UniformBufferRef};
