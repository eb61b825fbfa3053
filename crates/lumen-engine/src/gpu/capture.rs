//! Headless backend that records buffer writes and pass commands.
//!
//! Submissions stay pending until `wait_for`, `wait_idle` or
//! `complete_pending` is called, so the frames-in-flight cap can be observed
//! without a device. Like a real queue, submissions complete in order.

use std::cell::RefCell;
use std::collections::HashMap;

use bytemuck::Pod;

use super::backend::{
    BackendLimits, BufferDesc, BufferUsage, GpuBackend, LoadAction, PassDesc, PipelineDesc,
    RenderEncoder, TextureDesc,
};
use super::bindings::{BindGroupKind, TextureSlot, UniformSlot, VertexSlot};
use super::error::PipelineError;
use super::signal::CompletionSignal;

pub type ResourceId = u32;

#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    pub id: ResourceId,
    pub label: String,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone)]
pub struct CaptureTexture {
    pub id: ResourceId,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone)]
pub struct CapturePipeline {
    pub id: ResourceId,
    pub label: String,
    pub bind_groups: Vec<BindGroupKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginPass {
        label: String,
        targets: Vec<ResourceId>,
        loads: Vec<LoadAction>,
    },
    PushDebugGroup(String),
    PopDebugGroup,
    SetPipeline(ResourceId),
    SetVertexBuffer {
        slot: VertexSlot,
        buffer: ResourceId,
        offset: u64,
    },
    SetUniformBuffer {
        slot: UniformSlot,
        buffer: ResourceId,
        offset: u64,
    },
    SetTexture {
        slot: TextureSlot,
        texture: ResourceId,
    },
    DrawIndexed {
        indices: ResourceId,
        index_offset: u64,
        index_count: u32,
        instance_count: u32,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    EndPass,
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(self, Command::Draw { .. } | Command::DrawIndexed { .. })
    }
}

#[derive(Debug, Default)]
pub struct CaptureCommands {
    pub label: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub label: String,
    pub commands: Vec<Command>,
    pub signal: CompletionSignal,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferWrite {
    pub buffer: ResourceId,
    pub offset: u64,
    pub len: u64,
}

#[derive(Default)]
struct CaptureState {
    next_id: ResourceId,
    contents: HashMap<ResourceId, Vec<u8>>,
    writes: Vec<BufferWrite>,
    submissions: Vec<Submission>,
    pending: Vec<CompletionSignal>,
    waits: usize,
}

impl CaptureState {
    fn alloc_id(&mut self) -> ResourceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct CaptureBackend {
    limits: BackendLimits,
    state: RefCell<CaptureState>,
}

impl CaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: BackendLimits) -> Self {
        Self {
            limits,
            state: RefCell::default(),
        }
    }

    /// Every buffer write, in call order.
    pub fn writes(&self) -> Vec<BufferWrite> {
        self.state.borrow().writes.clone()
    }

    pub fn writes_to(&self, buffer: &CaptureBuffer) -> Vec<BufferWrite> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|w| w.buffer == buffer.id)
            .copied()
            .collect()
    }

    /// Current bytes of `buffer` in `offset..offset + len`; zero-filled past the end.
    pub fn read(&self, buffer: &CaptureBuffer, offset: u64, len: u64) -> Vec<u8> {
        let state = self.state.borrow();
        let mut out = vec![0u8; len as usize];
        if let Some(bytes) = state.contents.get(&buffer.id) {
            let start = (offset as usize).min(bytes.len());
            let end = ((offset + len) as usize).min(bytes.len());
            out[..end - start].copy_from_slice(&bytes[start..end]);
        }
        out
    }

    pub fn read_pod<T: Pod>(&self, buffer: &CaptureBuffer, offset: u64) -> T {
        let bytes = self.read(buffer, offset, std::mem::size_of::<T>() as u64);
        bytemuck::pod_read_unaligned(&bytes)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.borrow().submissions.clone()
    }

    /// Commands of every submission, flattened in submission order.
    pub fn commands(&self) -> Vec<Command> {
        self.state
            .borrow()
            .submissions
            .iter()
            .flat_map(|s| s.commands.iter().cloned())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .borrow()
            .pending
            .iter()
            .filter(|s| !s.is_complete())
            .count()
    }

    /// Completes every pending submission, as if the device caught up.
    pub fn complete_pending(&self) {
        for signal in self.state.borrow_mut().pending.drain(..) {
            signal.complete();
        }
    }

    /// Number of `wait_for` and `wait_idle` calls so far.
    pub fn wait_count(&self) -> usize {
        self.state.borrow().waits
    }

    /// Forgets recorded writes and submissions; buffer contents are kept.
    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.writes.clear();
        state.submissions.clear();
    }
}

impl GpuBackend for CaptureBackend {
    type Buffer = CaptureBuffer;
    type Texture = CaptureTexture;
    type Pipeline = CapturePipeline;
    type Commands = CaptureCommands;

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<CapturePipeline, PipelineError> {
        desc.validate(&self.limits)?;
        Ok(CapturePipeline {
            id: self.state.borrow_mut().alloc_id(),
            label: desc.label.to_string(),
            bind_groups: desc.bind_groups.to_vec(),
        })
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> CaptureBuffer {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.contents.insert(id, vec![0u8; desc.size as usize]);
        CaptureBuffer {
            id,
            label: desc.label.to_string(),
            size: desc.size,
            usage: desc.usage,
        }
    }

    fn write_buffer(&self, buffer: &CaptureBuffer, offset: u64, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let end = offset + data.len() as u64;
        let Some(bytes) = state.contents.get_mut(&buffer.id) else {
            log::error!("capture: write to unknown buffer `{}`", buffer.label);
            return;
        };
        if end > bytes.len() as u64 {
            log::error!(
                "capture: write {}..{} past end of `{}` ({} bytes)",
                offset,
                end,
                buffer.label,
                bytes.len()
            );
            return;
        }
        bytes[offset as usize..end as usize].copy_from_slice(data);
        state.writes.push(BufferWrite {
            buffer: buffer.id,
            offset,
            len: data.len() as u64,
        });
    }

    fn create_texture(&self, desc: &TextureDesc<'_>, rgba: Option<&[u8]>) -> CaptureTexture {
        if let Some(data) = rgba {
            let expected = u64::from(desc.width) * u64::from(desc.height) * 4;
            if data.len() as u64 != expected {
                log::warn!(
                    "capture: texture `{}` got {} bytes, expected {}",
                    desc.label,
                    data.len(),
                    expected
                );
            }
        }
        CaptureTexture {
            id: self.state.borrow_mut().alloc_id(),
            label: desc.label.to_string(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
        }
    }

    fn begin_commands(&self, label: &str) -> CaptureCommands {
        CaptureCommands {
            label: label.to_string(),
            commands: Vec::new(),
        }
    }

    fn render_pass<R>(
        &self,
        commands: &mut CaptureCommands,
        desc: &PassDesc<'_, Self>,
        record: impl FnOnce(&mut dyn RenderEncoder<Self>) -> R,
    ) -> R {
        commands.commands.push(Command::BeginPass {
            label: desc.label.to_string(),
            targets: desc.color_attachments.iter().map(|a| a.target.id).collect(),
            loads: desc.color_attachments.iter().map(|a| a.load).collect(),
        });
        let mut encoder = CaptureEncoder {
            commands: &mut commands.commands,
        };
        let out = record(&mut encoder);
        commands.commands.push(Command::EndPass);
        out
    }

    fn submit(&self, commands: CaptureCommands, signal: CompletionSignal) {
        let mut state = self.state.borrow_mut();
        state.pending.push(signal.clone());
        state.submissions.push(Submission {
            label: commands.label,
            commands: commands.commands,
            signal,
        });
    }

    fn wait_for(&self, signal: &CompletionSignal) {
        let mut state = self.state.borrow_mut();
        state.waits += 1;
        let Some(position) = state.pending.iter().position(|s| s.same_as(signal)) else {
            return;
        };
        for done in state.pending.drain(..=position) {
            done.complete();
        }
    }

    fn wait_idle(&self) {
        self.state.borrow_mut().waits += 1;
        self.complete_pending();
    }
}

struct CaptureEncoder<'a> {
    commands: &'a mut Vec<Command>,
}

impl RenderEncoder<CaptureBackend> for CaptureEncoder<'_> {
    fn push_debug_group(&mut self, label: &str) {
        self.commands.push(Command::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(Command::PopDebugGroup);
    }

    fn set_pipeline(&mut self, pipeline: &CapturePipeline) {
        self.commands.push(Command::SetPipeline(pipeline.id));
    }

    fn set_vertex_buffer(&mut self, slot: VertexSlot, buffer: &CaptureBuffer, offset: u64) {
        self.commands.push(Command::SetVertexBuffer {
            slot,
            buffer: buffer.id,
            offset,
        });
    }

    fn set_uniform_buffer(&mut self, slot: UniformSlot, buffer: &CaptureBuffer, offset: u64) {
        self.commands.push(Command::SetUniformBuffer {
            slot,
            buffer: buffer.id,
            offset,
        });
    }

    fn set_texture(&mut self, slot: TextureSlot, texture: &CaptureTexture) {
        self.commands.push(Command::SetTexture {
            slot,
            texture: texture.id,
        });
    }

    fn draw_indexed(
        &mut self,
        indices: &CaptureBuffer,
        index_offset: u64,
        index_count: u32,
        instance_count: u32,
    ) {
        self.commands.push(Command::DrawIndexed {
            indices: indices.id,
            index_offset,
            index_count,
            instance_count,
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }
}
