//! Render core: ring buffers, frame pacing, pipelines and per-frame orchestration.

pub mod batch;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod pipelines;
pub mod program;
pub mod records;
pub mod renderer;
pub mod ring;
pub mod targets;

pub use batch::InstanceBatcher;
pub use error::{BufferError, RenderError};
pub use frame::{FrameContext, FramePacer};
pub use geometry::{StaticGeometry, UploadState};
pub use program::{ProgramLibrary, ProgramPair, ProgramStage};
pub use renderer::{FrameStats, Renderer, RendererConfig};
pub use ring::{RingBuffer, RingBufferDesc};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::gpu::capture::{CaptureTexture, Command};
    use crate::gpu::{
        BufferUsage, CaptureBackend, ColorAttachment, GpuBackend, LoadAction, PassDesc,
        RenderEncoder, TextureDesc, TextureUsage, UniformSlot,
    };
    use crate::render::records::FrameUniforms;
    use crate::render::ring::{RingBuffer, RingBufferDesc};

    pub(crate) fn render_target(backend: &CaptureBackend, label: &str) -> CaptureTexture {
        backend.create_texture(
            &TextureDesc {
                label,
                width: 64,
                height: 64,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: TextureUsage::RenderTarget,
            },
            None,
        )
    }

    pub(crate) fn uniform_ring(backend: &CaptureBackend, slots: usize) -> RingBuffer<CaptureBackend> {
        RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: "test uniforms",
                length: std::mem::size_of::<FrameUniforms>() as u64,
                slots,
                usage: BufferUsage::Uniform {
                    slot: UniformSlot::FrameUniforms,
                    binding_size: 0,
                },
            },
        )
        .unwrap()
    }

    /// Records one pass into a scratch target; returns the closure's result and the commands.
    pub(crate) fn record_pass<R>(
        backend: &CaptureBackend,
        record: impl FnOnce(&mut dyn RenderEncoder<CaptureBackend>) -> R,
    ) -> (R, Vec<Command>) {
        let target = render_target(backend, "test target");
        let mut commands = backend.begin_commands("test");
        let out = backend.render_pass(
            &mut commands,
            &PassDesc {
                label: "test pass",
                color_attachments: &[ColorAttachment {
                    target: &target,
                    load: LoadAction::Load,
                }],
            },
            record,
        );
        (out, commands.commands)
    }
}
