//! Pipeline family: shape and sprite geometry pipelines plus the composition pass.

mod common;
mod stream;

pub mod composition;
pub mod shape;
pub mod sprite;

pub use common::premul_alpha_blend;
pub use composition::{CompositionPipeline, CompositionPipelineConfig};
pub use shape::{ShapePipeline, ShapePipelineConfig};
pub use sprite::{SpritePipeline, SpritePipelineConfig};
