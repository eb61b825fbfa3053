//! Abstract GPU context consumed by the render core.

use std::sync::Arc;

use wgpu::naga;

use crate::paint::Color;
use crate::render::program::{Program, ProgramStage};

use super::bindings::{BindGroupKind, TextureSlot, UniformSlot, VertexSlot};
use super::error::PipelineError;
use super::signal::CompletionSignal;

/// Device limits the render core cares about.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BackendLimits {
    /// Required alignment of dynamic uniform buffer offsets.
    pub uniform_offset_alignment: u32,
    pub max_buffer_size: u64,
    pub max_vertex_buffers: u32,
    pub max_bind_groups: u32,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            uniform_offset_alignment: 256,
            max_buffer_size: 256 << 20,
            max_vertex_buffers: 8,
            max_bind_groups: 4,
        }
    }
}

impl BackendLimits {
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            uniform_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            max_buffer_size: limits.max_buffer_size,
            max_vertex_buffers: limits.max_vertex_buffers,
            max_bind_groups: limits.max_bind_groups,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Uniform buffer bound through `slot`; each bind covers `binding_size` bytes.
    Uniform { slot: UniformSlot, binding_size: u64 },
}

#[derive(Debug, Copy, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureUsage {
    /// Uploaded once, sampled by programs.
    Sampled,
    /// Rendered into, then sampled by a later pass.
    RenderTarget,
}

#[derive(Debug, Copy, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TextureUsage,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LoadAction {
    Clear(Color),
    Load,
}

pub struct ColorAttachment<'a, B: GpuBackend> {
    pub target: &'a B::Texture,
    pub load: LoadAction,
}

pub struct PassDesc<'a, B: GpuBackend> {
    pub label: &'a str,
    pub color_attachments: &'a [ColorAttachment<'a, B>],
}

#[derive(Debug, Copy, Clone)]
pub struct ColorTarget {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

/// Everything needed to build one pipeline state object.
#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub vertex: &'a Program,
    pub fragment: &'a Program,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    /// Bind group kinds in `@group` order.
    pub bind_groups: &'a [BindGroupKind],
    pub targets: &'a [ColorTarget],
    pub topology: wgpu::PrimitiveTopology,
}

impl PipelineDesc<'_> {
    /// Checks stages, parses and validates program sources, resolves entry
    /// points and checks layout counts against `limits`.
    pub fn validate(&self, limits: &BackendLimits) -> Result<(), PipelineError> {
        check_stage(self.vertex, ProgramStage::Vertex)?;
        check_stage(self.fragment, ProgramStage::Fragment)?;

        let vertex_module = compile(self.vertex)?;
        let fragment_module = if Arc::ptr_eq(&self.vertex.module, &self.fragment.module) {
            None
        } else {
            Some(compile(self.fragment)?)
        };

        check_entry_point(&vertex_module, self.vertex)?;
        check_entry_point(fragment_module.as_ref().unwrap_or(&vertex_module), self.fragment)?;

        check_capability("vertex buffers", self.vertex_buffers.len(), limits.max_vertex_buffers)?;
        check_capability("bind groups", self.bind_groups.len(), limits.max_bind_groups)?;
        Ok(())
    }
}

fn check_stage(program: &Program, expected: ProgramStage) -> Result<(), PipelineError> {
    if program.stage != expected {
        return Err(PipelineError::StageMismatch {
            program: program.name.clone(),
            expected,
            found: program.stage,
        });
    }
    Ok(())
}

fn compile(program: &Program) -> Result<naga::Module, PipelineError> {
    let source = program.module.source.as_str();
    let module = naga::front::wgsl::parse_str(source).map_err(|e| PipelineError::Compile {
        program: program.name.clone(),
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| PipelineError::Compile {
        program: program.name.clone(),
        message: e.emit_to_string(source),
    })?;

    Ok(module)
}

fn check_entry_point(module: &naga::Module, program: &Program) -> Result<(), PipelineError> {
    let stage = match program.stage {
        ProgramStage::Vertex => naga::ShaderStage::Vertex,
        ProgramStage::Fragment => naga::ShaderStage::Fragment,
    };
    let found = module
        .entry_points
        .iter()
        .any(|ep| ep.name == program.entry_point && ep.stage == stage);
    if !found {
        return Err(PipelineError::MissingEntryPoint {
            program: program.name.clone(),
            entry_point: program.entry_point.clone(),
        });
    }
    Ok(())
}

fn check_capability(what: &'static str, requested: usize, limit: u32) -> Result<(), PipelineError> {
    let requested = u64::try_from(requested).unwrap_or(u64::MAX);
    let limit = u64::from(limit);
    if requested > limit {
        return Err(PipelineError::Capability { what, requested, limit });
    }
    Ok(())
}

/// GPU context: compiles pipelines, allocates memory and submits work.
pub trait GpuBackend: Sized {
    type Buffer;
    type Texture;
    type Pipeline;
    type Commands;

    fn limits(&self) -> BackendLimits;

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<Self::Pipeline, PipelineError>;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Self::Buffer;

    /// Copies `data` into `buffer` at `offset`. Callers check bounds first.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    fn create_texture(&self, desc: &TextureDesc<'_>, rgba: Option<&[u8]>) -> Self::Texture;

    fn begin_commands(&self, label: &str) -> Self::Commands;

    /// Records one render pass into `commands`.
    fn render_pass<R>(
        &self,
        commands: &mut Self::Commands,
        desc: &PassDesc<'_, Self>,
        record: impl FnOnce(&mut dyn RenderEncoder<Self>) -> R,
    ) -> R;

    /// Submits `commands`; `signal` completes once the device has finished them.
    fn submit(&self, commands: Self::Commands, signal: CompletionSignal);

    /// Blocks until the submission carrying `signal` has finished.
    ///
    /// Submissions made after it may still be in flight when this returns.
    fn wait_for(&self, signal: &CompletionSignal);

    /// Blocks until every outstanding submission has finished.
    fn wait_idle(&self);
}

/// Command recording inside one render pass.
pub trait RenderEncoder<B: GpuBackend> {
    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);

    fn set_pipeline(&mut self, pipeline: &B::Pipeline);
    fn set_vertex_buffer(&mut self, slot: VertexSlot, buffer: &B::Buffer, offset: u64);
    fn set_uniform_buffer(&mut self, slot: UniformSlot, buffer: &B::Buffer, offset: u64);
    fn set_texture(&mut self, slot: TextureSlot, texture: &B::Texture);

    /// Indexed instanced draw; `u16` indices start at `index_offset` in `indices`.
    fn draw_indexed(
        &mut self,
        indices: &B::Buffer,
        index_offset: u64,
        index_count: u32,
        instance_count: u32,
    );
    fn draw(&mut self, vertex_count: u32, instance_count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::program::ProgramModule;

    fn program(name: &str, stage: ProgramStage, entry: &str, src: &str) -> Program {
        Program {
            name: name.to_string(),
            stage,
            entry_point: entry.to_string(),
            module: Arc::new(ProgramModule {
                name: format!("{name}.wgsl"),
                source: src.into(),
            }),
        }
    }

    const SRC: &str = "
@vertex
fn vs() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0, 0.0, 0.0, 1.0); }

@fragment
fn fs() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";

    fn desc<'a>(vs: &'a Program, fs: &'a Program) -> PipelineDesc<'a> {
        PipelineDesc {
            label: "test",
            vertex: vs,
            fragment: fs,
            vertex_buffers: &[],
            bind_groups: &[],
            targets: &[],
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    #[test]
    fn valid_pair_passes() {
        let vs = program("v", ProgramStage::Vertex, "vs", SRC);
        let fs = program("f", ProgramStage::Fragment, "fs", SRC);
        assert_eq!(desc(&vs, &fs).validate(&BackendLimits::default()), Ok(()));
    }

    #[test]
    fn swapped_stages_are_rejected() {
        let vs = program("v", ProgramStage::Vertex, "vs", SRC);
        let fs = program("f", ProgramStage::Fragment, "fs", SRC);
        let err = desc(&fs, &vs).validate(&BackendLimits::default()).unwrap_err();
        assert!(matches!(err, PipelineError::StageMismatch { .. }));
    }

    #[test]
    fn syntax_error_is_a_compile_error() {
        let vs = program("v", ProgramStage::Vertex, "vs", "fn vs( {");
        let fs = program("f", ProgramStage::Fragment, "fs", SRC);
        let err = desc(&vs, &fs).validate(&BackendLimits::default()).unwrap_err();
        match err {
            PipelineError::Compile { program, message } => {
                assert_eq!(program, "v");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn entry_point_must_exist_for_stage() {
        let vs = program("v", ProgramStage::Vertex, "fs", SRC);
        let fs = program("f", ProgramStage::Fragment, "fs", SRC);
        let err = desc(&vs, &fs).validate(&BackendLimits::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingEntryPoint {
                program: "v".into(),
                entry_point: "fs".into()
            }
        );
    }

    #[test]
    fn too_many_bind_groups_is_a_capability_error() {
        let vs = program("v", ProgramStage::Vertex, "vs", SRC);
        let fs = program("f", ProgramStage::Fragment, "fs", SRC);
        let groups = [BindGroupKind::Texture; 3];
        let mut d = desc(&vs, &fs);
        d.bind_groups = &groups;
        let limits = BackendLimits {
            max_bind_groups: 2,
            ..BackendLimits::default()
        };
        assert_eq!(
            d.validate(&limits),
            Err(PipelineError::Capability {
                what: "bind groups",
                requested: 3,
                limit: 2
            })
        );
    }
}
