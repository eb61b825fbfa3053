//! Color model shared between scene data and renderers.

mod color;

pub use color::Color;
