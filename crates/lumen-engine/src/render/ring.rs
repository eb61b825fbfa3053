//! N-way rotating GPU buffer.
//!
//! One buffer is split into `slots` equal regions. Frame `f` owns region
//! `f mod slots` from the moment the frame pacer hands out its context until
//! the submission that read it completes.

use bytemuck::Pod;

use crate::gpu::{BufferDesc, BufferUsage, GpuBackend, PipelineError};

use super::error::BufferError;

#[derive(Debug, Copy, Clone)]
pub struct RingBufferDesc<'a> {
    pub label: &'a str,
    /// Usable bytes per slot.
    pub length: u64,
    pub slots: usize,
    /// For uniform rings the binding size is set to `length`.
    pub usage: BufferUsage,
}

pub struct RingBuffer<B: GpuBackend> {
    label: String,
    buffer: B::Buffer,
    length: u64,
    stride: u64,
    slots: usize,
}

#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn usage_bytes(usage: BufferUsage) -> &'static str {
    match usage {
        BufferUsage::Vertex => "vertex buffer bytes",
        BufferUsage::Index => "index buffer bytes",
        BufferUsage::Uniform { .. } => "uniform buffer bytes",
    }
}

impl<B: GpuBackend> RingBuffer<B> {
    /// Reserves `slots` regions of at least `length` bytes each.
    ///
    /// Regions start at multiples of the usage's alignment: the device's
    /// uniform offset alignment for uniform rings, 4 bytes otherwise.
    /// Fails without allocating when the whole ring exceeds the device's
    /// maximum buffer size.
    pub fn allocate(backend: &B, desc: &RingBufferDesc<'_>) -> Result<Self, PipelineError> {
        let slots = desc.slots.max(1);
        let length = desc.length.max(1);

        let (alignment, usage) = match desc.usage {
            BufferUsage::Uniform { slot, .. } => (
                u64::from(backend.limits().uniform_offset_alignment.max(4)),
                BufferUsage::Uniform {
                    slot,
                    binding_size: length,
                },
            ),
            other => (4, other),
        };
        let stride = align_up(length, alignment);
        let size = stride.saturating_mul(slots as u64);

        let limit = backend.limits().max_buffer_size;
        if size > limit {
            log::error!("ring `{}`: {size} bytes exceeds device max buffer size {limit}", desc.label);
            return Err(PipelineError::Capability {
                what: usage_bytes(usage),
                requested: size,
                limit,
            });
        }

        let buffer = backend.create_buffer(&BufferDesc {
            label: desc.label,
            size,
            usage,
        });

        log::debug!(
            "ring `{}`: {} slots x {} bytes (stride {})",
            desc.label,
            slots,
            length,
            stride
        );

        Ok(Self {
            label: desc.label.to_string(),
            buffer,
            length,
            stride,
            slots,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }

    fn base_offset(&self, slot: usize) -> Result<u64, BufferError> {
        if slot >= self.slots {
            return Err(BufferError::SlotOutOfRange {
                label: self.label.clone(),
                slot,
                slots: self.slots,
            });
        }
        Ok(self.stride * slot as u64)
    }

    /// Copies `data` into region `slot` at `byte_offset`.
    ///
    /// Fails without writing if the slot does not exist or the data would run
    /// past the region's `length`.
    pub fn write(
        &self,
        backend: &B,
        slot: usize,
        byte_offset: u64,
        data: &[u8],
    ) -> Result<(), BufferError> {
        let base = self.base_offset(slot)?;
        let size = data.len() as u64;
        if byte_offset.checked_add(size).is_none_or(|end| end > self.length) {
            return Err(BufferError::Overflow {
                label: self.label.clone(),
                slot,
                offset: byte_offset,
                size,
                length: self.length,
            });
        }
        if size > 0 {
            backend.write_buffer(&self.buffer, base + byte_offset, data);
        }
        Ok(())
    }

    pub fn write_pod<T: Pod>(
        &self,
        backend: &B,
        slot: usize,
        byte_offset: u64,
        value: &T,
    ) -> Result<(), BufferError> {
        self.write(backend, slot, byte_offset, bytemuck::bytes_of(value))
    }

    pub fn write_slice<T: Pod>(
        &self,
        backend: &B,
        slot: usize,
        byte_offset: u64,
        values: &[T],
    ) -> Result<(), BufferError> {
        self.write(backend, slot, byte_offset, bytemuck::cast_slice(values))
    }

    /// Buffer handle and base offset to bind for `slot`.
    pub fn next(&self, slot: usize) -> Result<(&B::Buffer, u64), BufferError> {
        Ok((&self.buffer, self.base_offset(slot)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BackendLimits, CaptureBackend, UniformSlot};

    fn vertex_ring(backend: &CaptureBackend, length: u64, slots: usize) -> RingBuffer<CaptureBackend> {
        RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: "test ring",
                length,
                slots,
                usage: BufferUsage::Vertex,
            },
        )
        .unwrap()
    }

    #[test]
    fn next_returns_the_region_written() {
        let backend = CaptureBackend::new();
        let ring = vertex_ring(&backend, 16, 3);
        for frame in 0u64..6 {
            let slot = (frame % 3) as usize;
            let value = [frame as u32; 4];
            ring.write_pod(&backend, slot, 0, &value).unwrap();

            let (buffer, base) = ring.next(slot).unwrap();
            let read: [u32; 4] = backend.read_pod(buffer, base);
            assert_eq!(read, value);
        }
    }

    #[test]
    fn adjacent_slots_do_not_alias() {
        let backend = CaptureBackend::new();
        let ring = vertex_ring(&backend, 8, 2);
        ring.write_slice(&backend, 0, 0, &[0xAAu8; 8]).unwrap();
        ring.write_slice(&backend, 1, 0, &[0xBBu8; 8]).unwrap();

        let (buffer, base0) = ring.next(0).unwrap();
        let (_, base1) = ring.next(1).unwrap();
        assert!(base1 >= base0 + ring.length());
        assert_eq!(backend.read(buffer, base0, 8), vec![0xAA; 8]);
        assert_eq!(backend.read(buffer, base1, 8), vec![0xBB; 8]);
    }

    #[test]
    fn overflow_is_rejected_before_writing() {
        let backend = CaptureBackend::new();
        let ring = vertex_ring(&backend, 8, 2);
        let err = ring.write(&backend, 0, 4, &[1u8; 8]).unwrap_err();
        assert_eq!(
            err,
            BufferError::Overflow {
                label: "test ring".into(),
                slot: 0,
                offset: 4,
                size: 8,
                length: 8,
            }
        );
        assert!(backend.writes().is_empty());
    }

    #[test]
    fn write_at_exact_end_is_allowed() {
        let backend = CaptureBackend::new();
        let ring = vertex_ring(&backend, 8, 1);
        ring.write(&backend, 0, 4, &[1u8; 4]).unwrap();
        assert_eq!(backend.writes().len(), 1);
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let backend = CaptureBackend::new();
        let ring = vertex_ring(&backend, 8, 2);
        assert!(matches!(
            ring.write(&backend, 2, 0, &[0u8; 4]),
            Err(BufferError::SlotOutOfRange { slot: 2, slots: 2, .. })
        ));
        assert!(ring.next(2).is_err());
    }

    #[test]
    fn uniform_slots_follow_offset_alignment() {
        let backend = CaptureBackend::new();
        let ring: RingBuffer<CaptureBackend> = RingBuffer::allocate(
            &backend,
            &RingBufferDesc {
                label: "uniforms",
                length: 128,
                slots: 3,
                usage: BufferUsage::Uniform {
                    slot: UniformSlot::FrameUniforms,
                    binding_size: 0,
                },
            },
        )
        .unwrap();
        assert_eq!(ring.stride(), 256);
        assert_eq!(ring.buffer().size, 768);
        assert_eq!(
            ring.buffer().usage,
            BufferUsage::Uniform {
                slot: UniformSlot::FrameUniforms,
                binding_size: 128
            }
        );
        assert_eq!(ring.next(2).unwrap().1, 512);
    }

    #[test]
    fn ring_larger_than_device_buffer_is_refused() {
        let backend = CaptureBackend::with_limits(BackendLimits {
            max_buffer_size: 1024,
            ..BackendLimits::default()
        });
        let result = RingBuffer::allocate(
            &backend,
            &RingBufferDesc {
                label: "too big",
                length: 400,
                slots: 3,
                usage: BufferUsage::Vertex,
            },
        );
        assert_eq!(
            result.err(),
            Some(PipelineError::Capability {
                what: "vertex buffer bytes",
                requested: 1200,
                limit: 1024,
            })
        );
        assert!(backend.writes().is_empty());
    }
}
