//! Instanced pipeline for textured quads (sprites and text glyphs).

use crate::gpu::{
    BindGroupKind, ColorTarget, GpuBackend, PipelineDesc, PipelineError, RenderEncoder,
    TextureSlot, UniformSlot, VertexSlot,
};
use crate::render::error::RenderError;
use crate::render::frame::FrameContext;
use crate::render::geometry::StaticGeometry;
use crate::render::program::{ProgramLibrary, ProgramPair};
use crate::render::records::{SpriteInstance, SpriteVertex};
use crate::render::ring::RingBuffer;
use crate::scene::Light;

use super::common::premul_alpha_blend;
use super::stream::InstanceStream;

#[derive(Debug, Clone)]
pub struct SpritePipelineConfig {
    pub programs: ProgramPair,
    pub color_format: wgpu::TextureFormat,
    pub light_format: wgpu::TextureFormat,
    pub max_instances: usize,
    pub frames_in_flight: usize,
}

impl Default for SpritePipelineConfig {
    fn default() -> Self {
        Self {
            programs: ProgramPair::sprite(),
            color_format: wgpu::TextureFormat::Rgba16Float,
            light_format: wgpu::TextureFormat::Rgba16Float,
            max_instances: 1000,
            frames_in_flight: 3,
        }
    }
}

/// Draws every sprite sharing one texture with a single indexed call.
pub struct SpritePipeline<B: GpuBackend> {
    pipeline: B::Pipeline,
    instances: InstanceStream<B, SpriteInstance>,
}

impl<B: GpuBackend> SpritePipeline<B> {
    pub fn new(
        backend: &B,
        library: &ProgramLibrary,
        config: &SpritePipelineConfig,
    ) -> Result<Self, PipelineError> {
        let (vertex, fragment) = library.resolve_pair(&config.programs)?;

        let pipeline = backend.create_pipeline(&PipelineDesc {
            label: "lumen sprite pipeline",
            vertex: &vertex,
            fragment: &fragment,
            vertex_buffers: &[SpriteVertex::layout(), SpriteInstance::layout()],
            bind_groups: &[BindGroupKind::FrameUniforms, BindGroupKind::Texture],
            targets: &[
                ColorTarget {
                    format: config.color_format,
                    blend: Some(premul_alpha_blend()),
                },
                ColorTarget {
                    format: config.light_format,
                    blend: Some(premul_alpha_blend()),
                },
            ],
            topology: wgpu::PrimitiveTopology::TriangleList,
        })?;

        log::debug!(
            "sprite pipeline ready ({} / {})",
            vertex.name,
            fragment.name
        );

        Ok(Self {
            pipeline,
            instances: InstanceStream::new(
                backend,
                "sprite pipeline",
                config.max_instances,
                config.frames_in_flight,
            )?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.instances.capacity()
    }

    pub fn check_capacity(&self, frame: FrameContext, count: usize) -> Result<(), RenderError> {
        self.instances.check_capacity(frame, count)
    }

    pub fn instance_ring(&self) -> &RingBuffer<B> {
        self.instances.ring()
    }

    /// Encodes one instanced draw of the sprite quad sampling `texture`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        backend: &B,
        pass: &mut dyn RenderEncoder<B>,
        frame: FrameContext,
        geometry: &mut StaticGeometry<B>,
        uniforms: &RingBuffer<B>,
        texture: &B::Texture,
        instances: &[SpriteInstance],
        lights: Option<&[Light]>,
    ) -> Result<(), RenderError> {
        if instances.is_empty() {
            return Ok(());
        }
        self.instances.check_capacity(frame, instances.len())?;

        pass.set_pipeline(&self.pipeline);
        geometry.ensure_uploaded(backend)?;

        let (instance_buffer, instance_offset) =
            self.instances.write(backend, frame, instances, lights)?;
        let (vertices, vertex_offset) = geometry.vertex_buffer()?;
        let (indices, index_offset) = geometry.index_buffer()?;
        let (uniform_buffer, uniform_offset) = uniforms.next(frame.slot)?;

        pass.set_vertex_buffer(VertexSlot::Geometry, vertices, vertex_offset);
        pass.set_vertex_buffer(VertexSlot::Instances, instance_buffer, instance_offset);
        pass.set_uniform_buffer(UniformSlot::FrameUniforms, uniform_buffer, uniform_offset);
        pass.set_texture(TextureSlot::Primary, texture);
        pass.draw_indexed(
            indices,
            index_offset,
            geometry.index_count(),
            instances.len() as u32,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::capture::Command;
    use crate::gpu::{CaptureBackend, GpuBackend, TextureDesc, TextureUsage};
    use crate::paint::Color;
    use crate::render::test_support::{record_pass, uniform_ring};
    use crate::scene::UvRect;
    use glam::{Mat4, Vec3};

    #[test]
    fn binds_texture_and_draws_once() {
        let backend = CaptureBackend::new();
        let mut pipeline = SpritePipeline::new(
            &backend,
            &ProgramLibrary::with_defaults(),
            &SpritePipelineConfig::default(),
        )
        .unwrap();
        let mut geometry = StaticGeometry::sprite_quad(&backend).unwrap();
        let uniforms = uniform_ring(&backend, 3);
        let texture = backend.create_texture(
            &TextureDesc {
                label: "atlas",
                width: 2,
                height: 2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: TextureUsage::Sampled,
            },
            Some(&[255u8; 16][..]),
        );

        let records: Vec<SpriteInstance> = (0..4)
            .map(|i| {
                SpriteInstance::new(
                    Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
                    Color::WHITE,
                    UvRect::new(0.0, 0.0, 0.5, 0.5),
                )
            })
            .collect();

        let frame = FrameContext { index: 0, slot: 0 };
        let ((), commands) = record_pass(&backend, |pass| {
            pipeline
                .encode(
                    &backend, pass, frame, &mut geometry, &uniforms, &texture, &records, None,
                )
                .unwrap()
        });

        assert!(commands.contains(&Command::SetTexture {
            slot: TextureSlot::Primary,
            texture: texture.id,
        }));
        let draws: Vec<&Command> = commands.iter().filter(|c| c.is_draw()).collect();
        assert!(matches!(
            draws[..],
            [Command::DrawIndexed {
                index_count: 6,
                instance_count: 4,
                ..
            }]
        ));

        let (buffer, base) = pipeline.instance_ring().next(0).unwrap();
        let third: SpriteInstance = backend.read_pod(buffer, base + 2 * 112);
        assert_eq!(third, records[2]);
    }

    #[test]
    fn empty_input_touches_nothing() {
        let backend = CaptureBackend::new();
        let mut pipeline = SpritePipeline::new(
            &backend,
            &ProgramLibrary::with_defaults(),
            &SpritePipelineConfig::default(),
        )
        .unwrap();
        let mut geometry = StaticGeometry::sprite_quad(&backend).unwrap();
        let uniforms = uniform_ring(&backend, 3);
        let texture = backend.create_texture(
            &TextureDesc {
                label: "atlas",
                width: 1,
                height: 1,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: TextureUsage::Sampled,
            },
            None,
        );

        let frame = FrameContext { index: 0, slot: 0 };
        let (result, commands) = record_pass(&backend, |pass| {
            pipeline.encode(
                &backend, pass, frame, &mut geometry, &uniforms, &texture, &[], None,
            )
        });
        assert_eq!(result, Ok(()));
        assert!(backend.writes().is_empty());
        assert!(!commands.iter().any(Command::is_draw));
    }

    #[test]
    fn wrong_program_pair_fails_construction() {
        let backend = CaptureBackend::new();
        let config = SpritePipelineConfig {
            programs: ProgramPair::new("sprite_vertex", "missing_fragment"),
            ..SpritePipelineConfig::default()
        };
        let err = SpritePipeline::new(&backend, &ProgramLibrary::with_defaults(), &config)
            .err()
            .unwrap();
        assert_eq!(
            err,
            PipelineError::UnknownProgram {
                name: "missing_fragment".into()
            }
        );
    }
}
