//! Full-screen resolve of the offscreen targets onto the output surface.

use crate::gpu::{
    BindGroupKind, BufferUsage, ColorTarget, GpuBackend, PipelineDesc, PipelineError,
    RenderEncoder, TextureDesc, TextureSlot, TextureUsage, UniformSlot, VertexSlot,
};
use crate::paint::Color;
use crate::render::error::RenderError;
use crate::render::frame::FrameContext;
use crate::render::program::{ProgramLibrary, ProgramPair};
use crate::render::records::{CompositionConstants, QuadVertex, FULLSCREEN_QUAD};
use crate::render::ring::{RingBuffer, RingBufferDesc};

#[derive(Debug, Clone)]
pub struct CompositionPipelineConfig {
    pub programs: ProgramPair,
    /// Format of the presentable target.
    pub output_format: wgpu::TextureFormat,
    pub frames_in_flight: usize,
}

impl Default for CompositionPipelineConfig {
    fn default() -> Self {
        Self {
            programs: ProgramPair::composition(),
            output_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            frames_in_flight: 3,
        }
    }
}

/// Final pass: `scene.rgb * (ambient.rgb * ambient.a + light.rgb)`.
///
/// The quad is uploaded once at construction into a single-slot ring and
/// never written again.
pub struct CompositionPipeline<B: GpuBackend> {
    pipeline: B::Pipeline,
    quad: RingBuffer<B>,
    constants: RingBuffer<B>,
    /// Black 1x1 texture sampled when no light accumulation is supplied.
    no_light: B::Texture,
}

impl<B: GpuBackend> CompositionPipeline<B> {
    pub fn new(
        backend: &B,
        library: &ProgramLibrary,
        config: &CompositionPipelineConfig,
    ) -> Result<Self, PipelineError> {
        let (vertex, fragment) = library.resolve_pair(&config.programs)?;

        let pipeline = backend.create_pipeline(&PipelineDesc {
            label: "lumen composition pipeline",
            vertex: &vertex,
            fragment: &fragment,
            vertex_buffers: &[QuadVertex::layout()],
            bind_groups: &[
                BindGroupKind::FragmentConstants,
                BindGroupKind::Texture,
                BindGroupKind::Texture,
            ],
            targets: &[ColorTarget {
                format: config.output_format,
                blend: None,
            }],
            topology: wgpu::PrimitiveTopology::TriangleList,
        })?;

        let quad_bytes: &[u8] = bytemuck::cast_slice(&FULLSCREEN_QUAD);
        let quad = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: "lumen composition quad",
                length: quad_bytes.len() as u64,
                slots: 1,
                usage: BufferUsage::Vertex,
            },
        )?;
        quad.write(backend, 0, 0, quad_bytes)?;

        let constants = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: "lumen composition constants",
                length: std::mem::size_of::<CompositionConstants>() as u64,
                slots: config.frames_in_flight,
                usage: BufferUsage::Uniform {
                    slot: UniformSlot::FragmentConstants,
                    binding_size: 0,
                },
            },
        )?;

        let no_light = backend.create_texture(
            &TextureDesc {
                label: "lumen no-light fallback",
                width: 1,
                height: 1,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: TextureUsage::Sampled,
            },
            Some(&[0u8, 0, 0, 255][..]),
        );

        log::debug!(
            "composition pipeline ready ({} / {}) -> {:?}",
            vertex.name,
            fragment.name,
            config.output_format
        );

        Ok(Self {
            pipeline,
            quad,
            constants,
            no_light,
        })
    }

    pub fn quad_ring(&self) -> &RingBuffer<B> {
        &self.quad
    }

    pub fn constants_ring(&self) -> &RingBuffer<B> {
        &self.constants
    }

    /// Draws the full-screen quad sampling `scene_color` and `light`.
    ///
    /// Must run after every geometry pass of the frame.
    pub fn encode(
        &self,
        backend: &B,
        pass: &mut dyn RenderEncoder<B>,
        frame: FrameContext,
        ambient: Color,
        scene_color: &B::Texture,
        light: Option<&B::Texture>,
    ) -> Result<(), RenderError> {
        let constants = CompositionConstants {
            ambient: ambient.to_array(),
        };
        self.constants.write_pod(backend, frame.slot, 0, &constants)?;
        let (constant_buffer, constant_offset) = self.constants.next(frame.slot)?;
        let (quad_buffer, quad_offset) = self.quad.next(0)?;

        pass.push_debug_group("composition");
        pass.set_pipeline(&self.pipeline);
        pass.set_vertex_buffer(VertexSlot::Geometry, quad_buffer, quad_offset);
        pass.set_uniform_buffer(UniformSlot::FragmentConstants, constant_buffer, constant_offset);
        pass.set_texture(TextureSlot::Primary, scene_color);
        pass.set_texture(TextureSlot::Secondary, light.unwrap_or(&self.no_light));
        pass.draw(FULLSCREEN_QUAD.len() as u32, 1);
        pass.pop_debug_group();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::capture::Command;
    use crate::gpu::CaptureBackend;
    use crate::render::test_support::{record_pass, render_target};

    fn pipeline(backend: &CaptureBackend) -> CompositionPipeline<CaptureBackend> {
        CompositionPipeline::new(
            backend,
            &ProgramLibrary::with_defaults(),
            &CompositionPipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn quad_is_uploaded_at_construction_only() {
        let backend = CaptureBackend::new();
        let composition = pipeline(&backend);
        let quad = composition.quad_ring().buffer();
        let uploads = backend.writes_to(quad);
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].offset, 0);
        assert_eq!(uploads[0].len, std::mem::size_of_val(&FULLSCREEN_QUAD) as u64);

        let scene = render_target(&backend, "scene");
        for index in 0..4u64 {
            let frame = FrameContext {
                index,
                slot: (index % 3) as usize,
            };
            record_pass(&backend, |pass| {
                composition
                    .encode(&backend, pass, frame, Color::BLACK, &scene, None)
                    .unwrap()
            });
        }
        assert_eq!(backend.writes_to(quad).len(), 1);
        let stored: [QuadVertex; 6] = backend.read_pod(quad, 0);
        assert_eq!(stored, FULLSCREEN_QUAD);
    }

    #[test]
    fn red_ambient_draws_six_vertices_with_constant() {
        let backend = CaptureBackend::new();
        let composition = pipeline(&backend);
        let scene = render_target(&backend, "scene");
        let light = render_target(&backend, "light");
        let frame = FrameContext { index: 0, slot: 0 };
        let red = Color::from_premul(1.0, 0.0, 0.0, 1.0);

        let ((), commands) = record_pass(&backend, |pass| {
            composition
                .encode(&backend, pass, frame, red, &scene, Some(&light))
                .unwrap()
        });

        let draws: Vec<&Command> = commands.iter().filter(|c| c.is_draw()).collect();
        assert_eq!(
            draws,
            vec![&Command::Draw {
                vertex_count: 6,
                instance_count: 1
            }]
        );

        let quad = composition.quad_ring().buffer();
        assert!(commands.contains(&Command::SetVertexBuffer {
            slot: VertexSlot::Geometry,
            buffer: quad.id,
            offset: 0,
        }));

        let (constants, offset) = composition.constants_ring().next(0).unwrap();
        assert!(commands.contains(&Command::SetUniformBuffer {
            slot: UniformSlot::FragmentConstants,
            buffer: constants.id,
            offset,
        }));
        let value: CompositionConstants = backend.read_pod(constants, offset);
        assert_eq!(value.ambient, [1.0, 0.0, 0.0, 1.0]);

        assert!(commands.contains(&Command::SetTexture {
            slot: TextureSlot::Primary,
            texture: scene.id,
        }));
        assert!(commands.contains(&Command::SetTexture {
            slot: TextureSlot::Secondary,
            texture: light.id,
        }));
    }

    #[test]
    fn draw_is_wrapped_in_debug_group() {
        let backend = CaptureBackend::new();
        let composition = pipeline(&backend);
        let scene = render_target(&backend, "scene");
        let frame = FrameContext { index: 0, slot: 0 };

        let ((), commands) = record_pass(&backend, |pass| {
            composition
                .encode(&backend, pass, frame, Color::WHITE, &scene, None)
                .unwrap()
        });

        let inner = &commands[1..commands.len() - 1];
        assert_eq!(inner.first(), Some(&Command::PushDebugGroup("composition".into())));
        assert_eq!(inner.last(), Some(&Command::PopDebugGroup));
        // fallback texture stands in for the light target
        assert!(inner.iter().any(|c| matches!(
            c,
            Command::SetTexture { slot: TextureSlot::Secondary, texture } if *texture != scene.id
        )));
    }

    #[test]
    fn constants_rotate_with_slot() {
        let backend = CaptureBackend::new();
        let composition = pipeline(&backend);
        let scene = render_target(&backend, "scene");
        let colors = [Color::WHITE, Color::BLACK];

        for (index, color) in colors.iter().enumerate() {
            let frame = FrameContext {
                index: index as u64,
                slot: index,
            };
            record_pass(&backend, |pass| {
                composition
                    .encode(&backend, pass, frame, *color, &scene, None)
                    .unwrap()
            });
        }
        let ring = composition.constants_ring();
        for (slot, color) in colors.iter().enumerate() {
            let (buffer, offset) = ring.next(slot).unwrap();
            let value: CompositionConstants = backend.read_pod(buffer, offset);
            assert_eq!(value.ambient, color.to_array());
        }
    }
}
