//! Lumen engine crate.
//!
//! Scene renderer core: ring-buffered per-frame GPU data, instanced shape and
//! sprite pipelines, and a composition pass that resolves the offscreen
//! targets onto the presentable surface. The window/device layers drive it on
//! top of wgpu + winit.

pub mod gpu;
pub mod render;
pub mod scene;

pub mod core;
pub mod device;
pub mod window;

pub mod logging;
pub mod paint;
pub mod time;
