#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod batch;
pub mod binding;
pub mod buffer;
pub mod color;
pub mod errors;
pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod settings;

pub use batch::{BatchStats, BatchTexture, MeshBatch, MeshVertex, SpriteBatch, SpriteDraw, SpriteVertex};
pub use binding::{Binder, GroupLayout, UniformValue};
pub use buffer::{UniformBuffer, UniformBufferRef};
pub use color::Color;
pub use errors::{LoomError, Result};
pub use frame::{FrameCounter, FrameIndex};
pub use gpu::{GpuDevice, RenderPassEncoder, WgpuDevice};
pub use pipeline::{PipelineCache, PipelineSpec, ShaderDefines, ShaderSource, VertexLayout};
pub use settings::{MeshBatchSettings, SpriteBatchSettings};
