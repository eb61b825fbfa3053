//! Per-frame orchestration of the pipelines.

use crate::gpu::{
    BufferUsage, ColorAttachment, GpuBackend, LoadAction, PassDesc, PipelineError, TextureDesc,
    UniformSlot,
};
use crate::paint::Color;
use crate::scene::{Camera, DrawList, ShapeGeometry, TextureId};

use super::batch::InstanceBatcher;
use super::error::RenderError;
use super::frame::{FrameContext, FramePacer};
use super::geometry::StaticGeometry;
use super::pipelines::{
    CompositionPipeline, CompositionPipelineConfig, ShapePipeline, ShapePipelineConfig,
    SpritePipeline, SpritePipelineConfig,
};
use super::program::{ProgramLibrary, ProgramPair};
use super::records::FrameUniforms;
use super::ring::{RingBuffer, RingBufferDesc};
use super::targets::OffscreenTargets;

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Ring slots per buffer; bounds how many frames the device may lag behind.
    pub frames_in_flight: usize,
    /// Instances per pipeline per frame.
    pub max_instances: usize,
    pub scene_format: wgpu::TextureFormat,
    pub light_format: wgpu::TextureFormat,
    /// Format of the presentable target.
    pub output_format: wgpu::TextureFormat,
    /// Scene color clear value.
    pub clear_color: Color,
    pub shape_programs: ProgramPair,
    pub sprite_programs: ProgramPair,
    pub composition_programs: ProgramPair,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            max_instances: 1000,
            scene_format: wgpu::TextureFormat::Rgba16Float,
            light_format: wgpu::TextureFormat::Rgba16Float,
            output_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            clear_color: Color::TRANSPARENT,
            shape_programs: ProgramPair::shape(),
            sprite_programs: ProgramPair::sprite(),
            composition_programs: ProgramPair::composition(),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub slot: usize,
    pub draw_calls: u32,
    pub instances: usize,
}

/// Owns the pipelines, shared geometry and per-frame rings.
///
/// Each frame: pick a slot, batch the draw list, write frame uniforms, draw
/// the batches into the offscreen targets, then resolve them onto `output`
/// with the composition pass and submit.
pub struct Renderer<B: GpuBackend> {
    config: RendererConfig,
    pacer: FramePacer,
    batcher: InstanceBatcher,

    uniforms: RingBuffer<B>,
    shape: ShapePipeline<B>,
    sprite: SpritePipeline<B>,
    composition: CompositionPipeline<B>,

    quad: StaticGeometry<B>,
    triangle: StaticGeometry<B>,
    sprite_quad: StaticGeometry<B>,

    textures: Vec<B::Texture>,
    targets: Option<OffscreenTargets<B>>,
}

impl<B: GpuBackend> Renderer<B> {
    /// Builds every pipeline. Fails as a whole if any program does not resolve or compile.
    pub fn new(
        backend: &B,
        config: RendererConfig,
        library: &ProgramLibrary,
    ) -> Result<Self, PipelineError> {
        let frames_in_flight = config.frames_in_flight.max(1);

        let shape = ShapePipeline::new(
            backend,
            library,
            &ShapePipelineConfig {
                programs: config.shape_programs.clone(),
                color_format: config.scene_format,
                light_format: config.light_format,
                max_instances: config.max_instances,
                frames_in_flight,
            },
        )?;
        let sprite = SpritePipeline::new(
            backend,
            library,
            &SpritePipelineConfig {
                programs: config.sprite_programs.clone(),
                color_format: config.scene_format,
                light_format: config.light_format,
                max_instances: config.max_instances,
                frames_in_flight,
            },
        )?;
        let composition = CompositionPipeline::new(
            backend,
            library,
            &CompositionPipelineConfig {
                programs: config.composition_programs.clone(),
                output_format: config.output_format,
                frames_in_flight,
            },
        )?;

        let uniforms = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: "lumen frame uniforms",
                length: std::mem::size_of::<FrameUniforms>() as u64,
                slots: frames_in_flight,
                usage: BufferUsage::Uniform {
                    slot: UniformSlot::FrameUniforms,
                    binding_size: 0,
                },
            },
        )?;

        log::info!(
            "renderer ready: {} frames in flight, {} instances per pipeline",
            frames_in_flight,
            config.max_instances
        );

        Ok(Self {
            pacer: FramePacer::new(frames_in_flight),
            batcher: InstanceBatcher::new(),
            uniforms,
            shape,
            sprite,
            composition,
            quad: StaticGeometry::shape(backend, ShapeGeometry::Quad)?,
            triangle: StaticGeometry::shape(backend, ShapeGeometry::Triangle)?,
            sprite_quad: StaticGeometry::sprite_quad(backend)?,
            textures: Vec::new(),
            targets: None,
            config,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Uploads an RGBA8 texture and returns its handle.
    pub fn register_texture(&mut self, backend: &B, desc: &TextureDesc<'_>, rgba: &[u8]) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(backend.create_texture(desc, Some(rgba)));
        log::debug!("texture `{}` registered as {:?}", desc.label, id);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&B::Texture> {
        self.textures.get(id.0 as usize)
    }

    pub fn geometry(&self, shape: ShapeGeometry) -> &StaticGeometry<B> {
        match shape {
            ShapeGeometry::Quad => &self.quad,
            ShapeGeometry::Triangle => &self.triangle,
        }
    }

    pub fn uniform_ring(&self) -> &RingBuffer<B> {
        &self.uniforms
    }

    pub fn targets(&self) -> Option<&OffscreenTargets<B>> {
        self.targets.as_ref()
    }

    /// Renders `list` into `output` (`size` in pixels) and submits the frame.
    ///
    /// A failed frame is not submitted; its slot is released and the next
    /// call proceeds normally.
    pub fn render_frame(
        &mut self,
        backend: &B,
        output: &B::Texture,
        size: (u32, u32),
        list: &DrawList,
        camera: &Camera,
        ambient: Color,
    ) -> Result<FrameStats, RenderError> {
        let frame = self.pacer.begin_frame(backend);

        match self.encode_frame(backend, frame, output, size, list, camera, ambient) {
            Ok((commands, stats)) => {
                let signal = self.pacer.end_frame(frame);
                backend.submit(commands, signal);
                log::trace!(
                    "frame {} (slot {}): {} draws, {} instances",
                    stats.frame_index,
                    stats.slot,
                    stats.draw_calls,
                    stats.instances
                );
                Ok(stats)
            }
            Err(err) => {
                self.pacer.abandon(frame);
                log::error!("frame {} dropped: {err}", frame.index);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_frame(
        &mut self,
        backend: &B,
        frame: FrameContext,
        output: &B::Texture,
        size: (u32, u32),
        list: &DrawList,
        camera: &Camera,
        ambient: Color,
    ) -> Result<(B::Commands, FrameStats), RenderError> {
        let Self {
            config,
            batcher,
            uniforms,
            shape,
            sprite,
            composition,
            quad,
            triangle,
            sprite_quad,
            textures,
            targets,
            ..
        } = self;

        batcher.build(list);
        shape.check_capacity(frame, batcher.shape_instance_count())?;
        sprite.check_capacity(frame, batcher.sprite_instance_count())?;

        if targets.as_ref().is_some_and(|t| !t.matches(size)) {
            *targets = None;
        }
        let targets = &*targets.get_or_insert_with(|| {
            OffscreenTargets::new(backend, size, config.scene_format, config.light_format)
        });

        let frame_uniforms = camera.uniforms(size.0 as f32, size.1 as f32);
        uniforms.write_pod(backend, frame.slot, 0, &frame_uniforms)?;

        let lights = Some(list.lights()).filter(|l| !l.is_empty());

        let mut commands = backend.begin_commands("lumen frame");
        let mut instances = 0;

        let geometry_desc = PassDesc {
            label: "lumen geometry pass",
            color_attachments: &[
                ColorAttachment {
                    target: &targets.color,
                    load: LoadAction::Clear(config.clear_color),
                },
                ColorAttachment {
                    target: &targets.light,
                    load: LoadAction::Clear(Color::TRANSPARENT),
                },
            ],
        };
        let mut draw_calls = backend.render_pass(&mut commands, &geometry_desc, |pass| {
            let mut draws = 0u32;

            for batch in batcher.shape_batches() {
                let geometry = match batch.geometry {
                    ShapeGeometry::Quad => &mut *quad,
                    ShapeGeometry::Triangle => &mut *triangle,
                };
                shape.encode(backend, pass, frame, geometry, uniforms, &batch.instances, lights)?;
                draws += 1;
                instances += batch.instances.len();
            }

            for batch in batcher.sprite_batches() {
                let Some(texture) = textures.get(batch.texture.0 as usize) else {
                    log::warn!(
                        "frame {}: texture {:?} not registered; {} sprites skipped",
                        frame.index,
                        batch.texture,
                        batch.instances.len()
                    );
                    continue;
                };
                sprite.encode(
                    backend,
                    pass,
                    frame,
                    sprite_quad,
                    uniforms,
                    texture,
                    &batch.instances,
                    lights,
                )?;
                draws += 1;
                instances += batch.instances.len();
            }

            Ok::<u32, RenderError>(draws)
        })?;

        let composition_desc = PassDesc {
            label: "lumen composition pass",
            color_attachments: &[ColorAttachment {
                target: output,
                load: LoadAction::Clear(Color::BLACK),
            }],
        };
        backend.render_pass(&mut commands, &composition_desc, |pass| {
            composition.encode(
                backend,
                pass,
                frame,
                ambient,
                &targets.color,
                Some(&targets.light),
            )
        })?;
        draw_calls += 1;

        Ok((
            commands,
            FrameStats {
                frame_index: frame.index,
                slot: frame.slot,
                draw_calls,
                instances,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::capture::Command;
    use crate::gpu::{BackendLimits, CaptureBackend, PipelineError, TextureSlot, TextureUsage};
    use crate::render::test_support::render_target;
    use crate::scene::{Drawable, Light, NodeTransform};
    use glam::{Mat4, Vec2, Vec3};

    fn at(x: f32, y: f32) -> NodeTransform {
        NodeTransform::new(Mat4::from_translation(Vec3::new(x, y, 0.0)), 0.0)
    }

    fn renderer(backend: &CaptureBackend, max_instances: usize) -> Renderer<CaptureBackend> {
        let config = RendererConfig {
            max_instances,
            ..RendererConfig::default()
        };
        Renderer::new(backend, config, &ProgramLibrary::with_defaults()).unwrap()
    }

    fn texture_desc() -> TextureDesc<'static> {
        TextureDesc {
            label: "checker",
            width: 2,
            height: 2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: TextureUsage::Sampled,
        }
    }

    fn scene(texture: TextureId) -> DrawList {
        let mut list = DrawList::new();
        list.push(Drawable::shape(ShapeGeometry::Quad, at(10.0, 10.0), Vec2::splat(8.0), Color::WHITE));
        list.push(Drawable::sprite(texture, at(20.0, 10.0), Vec2::splat(8.0), Color::WHITE));
        list.push(Drawable::shape(ShapeGeometry::Triangle, at(30.0, 10.0), Vec2::splat(8.0), Color::WHITE));
        list.push(Drawable::shape(ShapeGeometry::Quad, at(40.0, 10.0), Vec2::splat(8.0), Color::WHITE));
        list.add_light(Light::new(Vec3::new(10.0, 10.0, 0.0), Color::WHITE, 1.0, 50.0));
        list
    }

    #[test]
    fn frame_encodes_geometry_then_composition() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 100);
        let texture = renderer.register_texture(&backend, &texture_desc(), &[255; 16]);
        let output = render_target(&backend, "surface");

        let stats = renderer
            .render_frame(&backend, &output, (64, 64), &scene(texture), &Camera::default(), Color::WHITE)
            .unwrap();
        assert_eq!(
            stats,
            FrameStats {
                frame_index: 0,
                slot: 0,
                draw_calls: 4,
                instances: 4,
            }
        );

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        let commands = &submissions[0].commands;

        let passes: Vec<&Command> = commands
            .iter()
            .filter(|c| matches!(c, Command::BeginPass { .. }))
            .collect();
        assert_eq!(passes.len(), 2);
        let targets = renderer.targets().unwrap();
        assert!(matches!(
            passes[0],
            Command::BeginPass { targets: t, .. } if *t == vec![targets.color.id, targets.light.id]
        ));
        assert!(matches!(
            passes[1],
            Command::BeginPass { targets: t, .. } if *t == vec![output.id]
        ));

        let instance_counts: Vec<u32> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { instance_count, .. } => Some(*instance_count),
                _ => None,
            })
            .collect();
        assert_eq!(instance_counts, vec![2, 1, 1]);

        let last_draw = commands.iter().rev().find(|c| c.is_draw());
        assert_eq!(
            last_draw,
            Some(&Command::Draw {
                vertex_count: 6,
                instance_count: 1
            })
        );
        assert!(commands.contains(&Command::SetTexture {
            slot: TextureSlot::Primary,
            texture: targets.color.id,
        }));
    }

    #[test]
    fn frame_uniforms_land_in_the_frame_slot() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 10);
        let output = render_target(&backend, "surface");
        let camera = Camera::default();

        for _ in 0..2 {
            renderer
                .render_frame(&backend, &output, (320, 200), &DrawList::new(), &camera, Color::WHITE)
                .unwrap();
        }
        let (buffer, offset) = renderer.uniform_ring().next(1).unwrap();
        let stored: FrameUniforms = backend.read_pod(buffer, offset);
        assert_eq!(stored, camera.uniforms(320.0, 200.0));
        assert_eq!(offset, 256);
    }

    #[test]
    fn over_capacity_frame_is_dropped_and_slot_released() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 2);
        let output = render_target(&backend, "surface");

        let mut list = DrawList::new();
        for i in 0..3 {
            list.push(Drawable::shape(ShapeGeometry::Quad, at(i as f32, 0.0), Vec2::ONE, Color::WHITE));
        }
        let err = renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::CapacityExceeded {
                pipeline: "shape pipeline",
                requested: 3,
                capacity: 2,
            }
        );
        assert!(backend.submissions().is_empty());

        list.clear();
        let stats = renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        assert_eq!(stats.frame_index, 1);
        assert_eq!(backend.submissions().len(), 1);
    }

    #[test]
    fn unknown_texture_skips_its_batch() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 10);
        let output = render_target(&backend, "surface");

        let mut list = DrawList::new();
        list.push(Drawable::sprite(TextureId(42), at(0.0, 0.0), Vec2::ONE, Color::WHITE));
        let stats = renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.instances, 0);
    }

    #[test]
    fn waits_when_frames_in_flight_are_exhausted() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 10);
        let output = render_target(&backend, "surface");
        let list = DrawList::new();

        for _ in 0..3 {
            renderer
                .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
                .unwrap();
        }
        assert_eq!(backend.wait_count(), 0);
        assert_eq!(backend.pending_count(), 3);

        let stats = renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        assert_eq!(stats.slot, 0);
        assert_eq!(backend.wait_count(), 1);
        // Frames 1 and 2 are still in flight alongside the new one.
        assert_eq!(backend.pending_count(), 3);
    }

    #[test]
    fn targets_follow_output_size() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 10);
        let output = render_target(&backend, "surface");
        let list = DrawList::new();

        renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        let first = renderer.targets().unwrap().color.id;

        renderer
            .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        assert_eq!(renderer.targets().unwrap().color.id, first);

        renderer
            .render_frame(&backend, &output, (128, 32), &list, &Camera::default(), Color::WHITE)
            .unwrap();
        let targets = renderer.targets().unwrap();
        assert_ne!(targets.color.id, first);
        assert_eq!(targets.size(), (128, 32));
    }

    #[test]
    fn static_geometry_is_shared_across_frames() {
        let backend = CaptureBackend::new();
        let mut renderer = renderer(&backend, 10);
        let output = render_target(&backend, "surface");
        let list = scene(TextureId(0));

        for _ in 0..5 {
            renderer
                .render_frame(&backend, &output, (64, 64), &list, &Camera::default(), Color::WHITE)
                .unwrap();
        }
        let (vertices, _) = renderer.geometry(ShapeGeometry::Quad).vertex_buffer().unwrap();
        assert_eq!(backend.writes_to(vertices).len(), 1);
    }

    #[test]
    fn bad_program_pair_fails_construction() {
        let backend = CaptureBackend::new();
        let config = RendererConfig {
            composition_programs: ProgramPair::new("composition_fragment", "composition_vertex"),
            ..RendererConfig::default()
        };
        assert!(Renderer::new(&backend, config, &ProgramLibrary::with_defaults()).is_err());
    }

    #[test]
    fn oversized_instance_capacity_fails_construction() {
        let backend = CaptureBackend::with_limits(BackendLimits {
            max_buffer_size: 64 * 1024,
            ..BackendLimits::default()
        });
        let config = RendererConfig {
            max_instances: 100_000,
            ..RendererConfig::default()
        };
        let result = Renderer::new(&backend, config, &ProgramLibrary::with_defaults());
        assert!(matches!(
            result,
            Err(PipelineError::Capability { what: "instance buffer", requested: 100_000, .. })
        ));
    }
}
