//! Per-frame instance record stream backed by a ring buffer.

use crate::gpu::{BufferUsage, GpuBackend, PipelineError};
use crate::render::error::RenderError;
use crate::render::frame::FrameContext;
use crate::render::records::{apply_lights, InstanceRecord};
use crate::render::ring::{RingBuffer, RingBufferDesc};
use crate::scene::Light;

use super::common::InstanceCursor;

pub(super) struct InstanceStream<B: GpuBackend, T: InstanceRecord> {
    pipeline: &'static str,
    ring: RingBuffer<B>,
    capacity: usize,
    cursor: InstanceCursor,
    /// Lit copies of the input records.
    scratch: Vec<T>,
}

impl<B: GpuBackend, T: InstanceRecord> InstanceStream<B, T> {
    /// Fails when `capacity` records per frame in flight do not fit one device buffer.
    pub(super) fn new(
        backend: &B,
        pipeline: &'static str,
        capacity: usize,
        frames_in_flight: usize,
    ) -> Result<Self, PipelineError> {
        let capacity = capacity.max(1);
        let slots = frames_in_flight.max(1) as u64;

        let limit = backend.limits().max_buffer_size / (T::SIZE * slots);
        if capacity as u64 > limit {
            log::error!(
                "{pipeline}: {capacity} instances x {slots} frames exceed the device buffer limit ({limit} instances)"
            );
            return Err(PipelineError::Capability {
                what: "instance buffer",
                requested: capacity as u64,
                limit,
            });
        }

        let ring = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: &format!("{pipeline} instances"),
                length: capacity as u64 * T::SIZE,
                slots: frames_in_flight,
                usage: BufferUsage::Vertex,
            },
        )?;
        Ok(Self {
            pipeline,
            ring,
            capacity,
            cursor: InstanceCursor::default(),
            scratch: Vec::new(),
        })
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(super) fn ring(&self) -> &RingBuffer<B> {
        &self.ring
    }

    /// Fails if `count` more records do not fit this frame's slot.
    pub(super) fn check_capacity(&self, frame: FrameContext, count: usize) -> Result<(), RenderError> {
        let requested = self.cursor.used(frame) + count;
        if requested > self.capacity {
            log::error!(
                "{}: {} instances requested this frame, capacity {}",
                self.pipeline,
                requested,
                self.capacity
            );
            return Err(RenderError::CapacityExceeded {
                pipeline: self.pipeline,
                requested,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Writes `records` contiguously after the records already in this frame's
    /// slot. Returns the buffer and byte offset of the first one.
    pub(super) fn write(
        &mut self,
        backend: &B,
        frame: FrameContext,
        records: &[T],
        lights: Option<&[Light]>,
    ) -> Result<(&B::Buffer, u64), RenderError> {
        self.check_capacity(frame, records.len())?;

        let first = self.cursor.used(frame);
        let offset = first as u64 * T::SIZE;

        match lights {
            Some(lights) => {
                self.scratch.clear();
                self.scratch.extend_from_slice(records);
                apply_lights(&mut self.scratch, lights);
                self.ring
                    .write_slice(backend, frame.slot, offset, &self.scratch)?;
            }
            None => self.ring.write_slice(backend, frame.slot, offset, records)?,
        }
        self.cursor.advance(frame, records.len());

        let (buffer, base) = self.ring.next(frame.slot)?;
        Ok((buffer, base + offset))
    }
}
