//! Batched drawing: sprite and mesh batchers sharing one flush protocol.

mod flush;
pub mod mesh;
pub mod sprite;
pub mod stats;
pub mod texture;

pub use flush::{PROJECTION_VIEW, TEXTURE, TEXTURE_GROUP, TEXTURE_SAMPLER, UNIFORM_GROUP, UNIFORMS};
pub use mesh::{MeshBatch, MeshVertex};
pub use sprite::{SpriteBatch, SpriteDraw, SpriteVertex, TexelRegion};
pub use stats::BatchStats;
pub use texture::BatchTexture;
