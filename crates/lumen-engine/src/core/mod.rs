//! Contract between the window runtime and application code.
//!
//! The runtime owns the window, the GPU and the renderer; applications see
//! them through [`SetupCtx`] once and [`FrameCtx`] every frame.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, SetupCtx, WindowCtx};
