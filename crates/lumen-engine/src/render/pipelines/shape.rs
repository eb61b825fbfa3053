//! Instanced pipeline for untextured unit shapes.

use crate::gpu::{
    BindGroupKind, ColorTarget, GpuBackend, PipelineDesc, PipelineError, RenderEncoder,
    UniformSlot, VertexSlot,
};
use crate::render::error::RenderError;
use crate::render::frame::FrameContext;
use crate::render::geometry::StaticGeometry;
use crate::render::program::{ProgramLibrary, ProgramPair};
use crate::render::records::{ShapeInstance, ShapeVertex};
use crate::render::ring::RingBuffer;
use crate::scene::Light;

use super::common::premul_alpha_blend;
use super::stream::InstanceStream;

#[derive(Debug, Clone)]
pub struct ShapePipelineConfig {
    pub programs: ProgramPair,
    pub color_format: wgpu::TextureFormat,
    pub light_format: wgpu::TextureFormat,
    /// Instances reserved per frame.
    pub max_instances: usize,
    pub frames_in_flight: usize,
}

impl Default for ShapePipelineConfig {
    fn default() -> Self {
        Self {
            programs: ProgramPair::shape(),
            color_format: wgpu::TextureFormat::Rgba16Float,
            light_format: wgpu::TextureFormat::Rgba16Float,
            max_instances: 1000,
            frames_in_flight: 3,
        }
    }
}

/// Draws every instance of one shape geometry with a single indexed call.
///
/// Renders into two targets: scene color (location 0) and light
/// accumulation (location 1).
pub struct ShapePipeline<B: GpuBackend> {
    pipeline: B::Pipeline,
    instances: InstanceStream<B, ShapeInstance>,
}

impl<B: GpuBackend> ShapePipeline<B> {
    pub fn new(
        backend: &B,
        library: &ProgramLibrary,
        config: &ShapePipelineConfig,
    ) -> Result<Self, PipelineError> {
        let (vertex, fragment) = library.resolve_pair(&config.programs)?;

        let pipeline = backend.create_pipeline(&PipelineDesc {
            label: "lumen shape pipeline",
            vertex: &vertex,
            fragment: &fragment,
            vertex_buffers: &[ShapeVertex::layout(), ShapeInstance::layout()],
            bind_groups: &[BindGroupKind::FrameUniforms],
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
            "shape pipeline ready ({} / {}, {} instances x {} frames)",
            vertex.name,
            fragment.name,
            config.max_instances,
            config.frames_in_flight
        );

        Ok(Self {
            pipeline,
            instances: InstanceStream::new(
                backend,
                "shape pipeline",
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

    /// Encodes one instanced draw of `geometry` for `instances`.
    ///
    /// Empty input records nothing. Records are written contiguously, in
    /// order, into the frame's slot of the instance ring.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        backend: &B,
        pass: &mut dyn RenderEncoder<B>,
        frame: FrameContext,
        geometry: &mut StaticGeometry<B>,
        uniforms: &RingBuffer<B>,
        instances: &[ShapeInstance],
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
        pass.draw_indexed(
            indices,
            index_offset,
            geometry.index_count(),
            instances.len() as u32,
        );
        Ok(())
    }
}
