use crate::gpu::{GpuBackend, TextureDesc, TextureUsage};

/// Offscreen targets written by the geometry pass and read by composition.
pub struct OffscreenTargets<B: GpuBackend> {
    pub color: B::Texture,
    pub light: B::Texture,
    size: (u32, u32),
}

impl<B: GpuBackend> OffscreenTargets<B> {
    pub fn new(
        backend: &B,
        size: (u32, u32),
        color_format: wgpu::TextureFormat,
        light_format: wgpu::TextureFormat,
    ) -> Self {
        let (width, height) = (size.0.max(1), size.1.max(1));
        log::debug!("offscreen targets {width}x{height}");

        let color = backend.create_texture(
            &TextureDesc {
                label: "lumen scene color",
                width,
                height,
                format: color_format,
                usage: TextureUsage::RenderTarget,
            },
            None,
        );
        let light = backend.create_texture(
            &TextureDesc {
                label: "lumen light accumulation",
                width,
                height,
                format: light_format,
                usage: TextureUsage::RenderTarget,
            },
            None,
        );

        Self {
            color,
            light,
            size: (width, height),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// True if these targets can serve a frame of `size`.
    pub fn matches(&self, size: (u32, u32)) -> bool {
        self.size == (size.0.max(1), size.1.max(1))
    }
}
