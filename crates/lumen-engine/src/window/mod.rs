//! Window + runtime loop.
//!
//! Owns the `winit` event loop and window and wires them to the GPU and renderer.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
