//! Scene-side data consumed by the renderer.
//!
//! The node tree itself lives outside the engine; each frame the caller
//! flattens it into a [`DrawList`] of `(parent transform, Drawable)` pairs.

mod camera;
mod drawable;
mod light;
mod list;
mod transform;

pub use camera::{Camera, Projection};
pub use drawable::{
    Drawable, Glyph, ShapeGeometry, ShapeNode, SpriteNode, TextNode, TextureId, UvRect,
};
pub use light::Light;
pub use list::{DrawItem, DrawList};
pub use transform::{decompose, NodeTransform};
