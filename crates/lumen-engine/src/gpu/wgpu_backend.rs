//! `GpuBackend` implementation on top of wgpu.

use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{
    BackendLimits, BufferDesc, BufferUsage, GpuBackend, LoadAction, PassDesc, PipelineDesc,
    RenderEncoder, TextureDesc, TextureUsage,
};
use super::bindings::{group_index, BindGroupKind, TextureSlot, UniformSlot, VertexSlot};
use super::error::PipelineError;
use super::signal::CompletionSignal;

/// wgpu device + queue with the shared bind group layouts every pipeline uses.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: BackendLimits,

    frame_uniforms_layout: wgpu::BindGroupLayout,
    fragment_constants_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    /// Submissions whose signal has not completed yet, oldest first.
    in_flight: Mutex<Vec<(CompletionSignal, wgpu::SubmissionIndex)>>,
}

pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    /// Present for uniform buffers; bound with a dynamic offset.
    bind_group: Option<wgpu::BindGroup>,
}

pub struct WgpuTexture {
    _texture: Option<wgpu::Texture>,
    view: wgpu::TextureView,
    bind_group: Option<wgpu::BindGroup>,
    size: (u32, u32),
}

impl WgpuTexture {
    /// Wraps a view the backend does not own (the surface texture).
    ///
    /// Such a texture can be rendered into but not sampled.
    pub fn from_view(view: wgpu::TextureView, width: u32, height: u32) -> Self {
        Self {
            _texture: None,
            view,
            bind_group: None,
            size: (width, height),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

pub struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    groups: Vec<BindGroupKind>,
}

impl WgpuBackend {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let limits = BackendLimits::from_wgpu(&device.limits());

        let frame_uniforms_layout = uniform_layout(
            device,
            "lumen frame uniforms bgl",
            UniformSlot::FrameUniforms.binding(),
            wgpu::ShaderStages::VERTEX,
        );
        let fragment_constants_layout = uniform_layout(
            device,
            "lumen fragment constants bgl",
            UniformSlot::FragmentConstants.binding(),
            wgpu::ShaderStages::FRAGMENT,
        );

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen linear sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            limits,
            frame_uniforms_layout,
            fragment_constants_layout,
            texture_layout,
            sampler,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn in_flight(&self) -> MutexGuard<'_, Vec<(CompletionSignal, wgpu::SubmissionIndex)>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poll(&self, poll: wgpu::PollType) {
        if let Err(err) = self.device.poll(poll) {
            log::warn!("device poll failed: {err}");
        }
    }

    fn layout_for(&self, kind: BindGroupKind) -> &wgpu::BindGroupLayout {
        match kind {
            BindGroupKind::FrameUniforms => &self.frame_uniforms_layout,
            BindGroupKind::FragmentConstants => &self.fragment_constants_layout,
            BindGroupKind::Texture => &self.texture_layout,
        }
    }

    fn shader_module(&self, program: &crate::render::program::Program) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&program.module.name),
            source: wgpu::ShaderSource::Wgsl(program.module.source.as_str().into()),
        })
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

impl GpuBackend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Pipeline = WgpuPipeline;
    type Commands = wgpu::CommandEncoder;

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<WgpuPipeline, PipelineError> {
        desc.validate(&self.limits)?;

        let vertex_module = self.shader_module(desc.vertex);
        let fragment_module = if Arc::ptr_eq(&desc.vertex.module, &desc.fragment.module) {
            None
        } else {
            Some(self.shader_module(desc.fragment))
        };

        let layouts: Vec<&wgpu::BindGroupLayout> =
            desc.bind_groups.iter().map(|k| self.layout_for(*k)).collect();

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .targets
            .iter()
            .map(|t| {
                Some(wgpu::ColorTargetState {
                    format: t.format,
                    blend: t.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(&desc.vertex.entry_point),
                    compilation_options: Default::default(),
                    buffers: desc.vertex_buffers,
                },

                fragment: Some(wgpu::FragmentState {
                    module: fragment_module.as_ref().unwrap_or(&vertex_module),
                    entry_point: Some(&desc.fragment.entry_point),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),

                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        Ok(WgpuPipeline {
            pipeline,
            groups: desc.bind_groups.to_vec(),
        })
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> WgpuBuffer {
        let usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform { .. } => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage,
            mapped_at_creation: false,
        });

        let bind_group = match desc.usage {
            BufferUsage::Uniform { slot, binding_size } => {
                Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(desc.label),
                    layout: self.layout_for(slot.group_kind()),
                    entries: &[wgpu::BindGroupEntry {
                        binding: slot.binding(),
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffer,
                            offset: 0,
                            size: NonZeroU64::new(binding_size),
                        }),
                    }],
                }))
            }
            _ => None,
        };

        WgpuBuffer { buffer, bind_group }
    }

    fn write_buffer(&self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, offset, data);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>, rgba: Option<&[u8]>) -> WgpuTexture {
        let usage = match desc.usage {
            TextureUsage::Sampled => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
            TextureUsage::RenderTarget => {
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
            }
        };
        let size = wgpu::Extent3d {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });

        if let Some(data) = rgba {
            let bytes_per_pixel = desc.format.block_copy_size(None).unwrap_or(4);
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.width * bytes_per_pixel),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        WgpuTexture {
            _texture: Some(texture),
            view,
            bind_group: Some(bind_group),
            size: (size.width, size.height),
        }
    }

    fn begin_commands(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn render_pass<R>(
        &self,
        commands: &mut wgpu::CommandEncoder,
        desc: &PassDesc<'_, Self>,
        record: impl FnOnce(&mut dyn RenderEncoder<Self>) -> R,
    ) -> R {
        let attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = desc
            .color_attachments
            .iter()
            .map(|a| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &a.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match a.load {
                            LoadAction::Clear(c) => wgpu::LoadOp::Clear(c.to_wgpu()),
                            LoadAction::Load => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let pass = commands.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(desc.label),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let mut encoder = WgpuEncoder {
            pass,
            groups: Vec::new(),
        };
        record(&mut encoder)
    }

    fn submit(&self, commands: wgpu::CommandEncoder, signal: CompletionSignal) {
        let index = self.queue.submit(std::iter::once(commands.finish()));
        let done = signal.clone();
        self.queue.on_submitted_work_done(move || done.complete());

        let mut in_flight = self.in_flight();
        in_flight.retain(|(s, _)| !s.is_complete());
        in_flight.push((signal, index));
    }

    fn wait_for(&self, signal: &CompletionSignal) {
        let index = self
            .in_flight()
            .iter()
            .find(|(s, _)| s.same_as(signal))
            .map(|(_, index)| index.clone());

        match index {
            Some(index) => self.poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            }),
            // Not tracked: let pending callbacks run without blocking.
            None => self.poll(wgpu::PollType::Poll),
        }
        self.in_flight().retain(|(s, _)| !s.is_complete());
    }

    fn wait_idle(&self) {
        self.poll(wgpu::PollType::wait_indefinitely());
        self.in_flight().clear();
    }
}

struct WgpuEncoder<'p> {
    pass: wgpu::RenderPass<'p>,
    /// Bind group kinds of the bound pipeline.
    groups: Vec<BindGroupKind>,
}

impl RenderEncoder<WgpuBackend> for WgpuEncoder<'_> {
    fn push_debug_group(&mut self, label: &str) {
        self.pass.push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        self.pass.pop_debug_group();
    }

    fn set_pipeline(&mut self, pipeline: &WgpuPipeline) {
        self.pass.set_pipeline(&pipeline.pipeline);
        self.groups.clone_from(&pipeline.groups);
    }

    fn set_vertex_buffer(&mut self, slot: VertexSlot, buffer: &WgpuBuffer, offset: u64) {
        self.pass
            .set_vertex_buffer(slot.index(), buffer.buffer.slice(offset..));
    }

    fn set_uniform_buffer(&mut self, slot: UniformSlot, buffer: &WgpuBuffer, offset: u64) {
        let Some(index) = group_index(&self.groups, slot.group_kind(), 0) else {
            log::warn!("bound pipeline has no {slot:?} group; uniform bind ignored");
            return;
        };
        let Some(bind_group) = buffer.bind_group.as_ref() else {
            log::warn!("{slot:?} bound to a non-uniform buffer; ignored");
            return;
        };
        let Ok(offset) = u32::try_from(offset) else {
            log::error!("uniform offset {offset} does not fit a dynamic offset");
            return;
        };
        self.pass.set_bind_group(index, bind_group, &[offset]);
    }

    fn set_texture(&mut self, slot: TextureSlot, texture: &WgpuTexture) {
        let Some(index) = group_index(&self.groups, BindGroupKind::Texture, slot.index()) else {
            log::warn!("bound pipeline has no {slot:?} texture group; bind ignored");
            return;
        };
        let Some(bind_group) = texture.bind_group.as_ref() else {
            log::warn!("texture in {slot:?} is not sampleable; bind ignored");
            return;
        };
        self.pass.set_bind_group(index, bind_group, &[]);
    }

    fn draw_indexed(
        &mut self,
        indices: &WgpuBuffer,
        index_offset: u64,
        index_count: u32,
        instance_count: u32,
    ) {
        self.pass.set_index_buffer(
            indices.buffer.slice(index_offset..),
            wgpu::IndexFormat::Uint16,
        );
        self.pass.draw_indexed(0..index_count, 0, 0..instance_count);
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.pass.draw(0..vertex_count, 0..instance_count);
    }
}
