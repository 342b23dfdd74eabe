//! Pipeline specification, canonical keys and the pipeline cache.

pub mod blend;
pub mod cache;
pub mod id;
pub mod key;
pub mod shader;
pub mod spec;
pub mod vertex;

pub use cache::PipelineCache;
pub use id::{PipelineLayoutId, RenderPipelineId};
pub use key::{BlendStateKey, PipelineKey};
pub use shader::{ShaderDefines, ShaderSource};
pub use spec::PipelineSpec;
pub use vertex::VertexLayout;
