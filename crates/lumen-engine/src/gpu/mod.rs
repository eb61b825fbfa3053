//! GPU boundary.
//!
//! The renderer only talks to the device through [`GpuBackend`] and
//! [`RenderEncoder`]. `WgpuBackend` drives a real device; `CaptureBackend`
//! records every write and command headlessly.

pub mod backend;
pub mod bindings;
pub mod capture;
pub mod error;
pub mod signal;
pub mod wgpu_backend;

pub use backend::{
    BackendLimits, BufferDesc, BufferUsage, ColorAttachment, ColorTarget, GpuBackend, LoadAction,
    PassDesc, PipelineDesc, RenderEncoder, TextureDesc, TextureUsage,
};
pub use bindings::{BindGroupKind, TextureSlot, UniformSlot, VertexSlot};
pub use capture::CaptureBackend;
pub use error::PipelineError;
pub use signal::CompletionSignal;
pub use wgpu_backend::WgpuBackend;
