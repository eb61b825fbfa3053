use winit::window::{Window, WindowId};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::gpu::{TextureDesc, TextureUsage, WgpuBackend};
use crate::paint::Color;
use crate::render::{FrameStats, Renderer};
use crate::scene::{Camera, DrawList, TextureId};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// Per-window handles.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels; the orthographic camera works in these.
    pub fn physical_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    pub fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }
}

/// Context for [`App::on_start`](super::App::on_start).
pub struct SetupCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a Gpu<'w>,
    pub renderer: &'a mut Renderer<WgpuBackend>,
}

impl SetupCtx<'_, '_> {
    /// Uploads tightly packed RGBA8 (sRGB) pixels as a sampled texture.
    pub fn register_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> anyhow::Result<TextureId> {
        let expected = width as usize * height as usize * 4;
        anyhow::ensure!(
            width > 0 && height > 0 && rgba.len() == expected,
            "texture `{label}`: {} bytes supplied for {width}x{height}, {expected} expected",
            rgba.len()
        );

        Ok(self.renderer.register_texture(
            self.gpu.backend(),
            &TextureDesc {
                label,
                width,
                height,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: TextureUsage::Sampled,
            },
            rgba,
        ))
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// `'a` is the callback borrow; `'w` is the window borrow carried by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub renderer: &'a mut Renderer<WgpuBackend>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Renders `list` onto the window surface and presents it.
    ///
    /// Returns `None` when no frame was produced: the surface was unavailable
    /// or the renderer rejected the frame. A fatal surface error also asks the
    /// runtime to exit.
    pub fn render(&mut self, list: &DrawList, camera: &Camera, ambient: Color) -> Option<FrameStats> {
        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                if self.gpu.handle_surface_error(err) == SurfaceErrorAction::Fatal {
                    self.runtime.exit();
                }
                return None;
            }
        };

        let size = frame.size();
        let result = self.renderer.render_frame(
            self.gpu.backend(),
            &frame.target,
            size,
            list,
            camera,
            ambient,
        );

        match result {
            Ok(stats) => {
                self.window.window.pre_present_notify();
                self.gpu.present(frame);
                Some(stats)
            }
            // Already logged by the renderer; the unrendered texture is discarded.
            Err(_) => None,
        }
    }
}
