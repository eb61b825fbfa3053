//! GPU device + surface management.
//!
//! Creates the wgpu instance/adapter/device/queue, configures the window
//! surface and hands out presentable frames as [`WgpuTexture`](crate::gpu::wgpu_backend::WgpuTexture)
//! targets the renderer can draw into.

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
