//! Static vertex/index data shared by every instance of a shape type.

use bytemuck::Pod;

use crate::gpu::{BufferUsage, GpuBackend, PipelineError};
use crate::scene::ShapeGeometry;

use super::error::BufferError;
use super::records::{ShapeVertex, SpriteVertex};
use super::ring::{RingBuffer, RingBufferDesc};

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];
pub const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];

/// Unit quad centered on the origin; y grows downward.
pub const QUAD_VERTICES: [ShapeVertex; 4] = [
    ShapeVertex { position: [-0.5, -0.5, 0.0] },
    ShapeVertex { position: [0.5, -0.5, 0.0] },
    ShapeVertex { position: [0.5, 0.5, 0.0] },
    ShapeVertex { position: [-0.5, 0.5, 0.0] },
];

/// Unit triangle centered on the origin, apex up.
pub const TRIANGLE_VERTICES: [ShapeVertex; 3] = [
    ShapeVertex { position: [0.0, -0.5, 0.0] },
    ShapeVertex { position: [0.5, 0.5, 0.0] },
    ShapeVertex { position: [-0.5, 0.5, 0.0] },
];

pub const SPRITE_QUAD_VERTICES: [SpriteVertex; 4] = [
    SpriteVertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    SpriteVertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    SpriteVertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
    SpriteVertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UploadState {
    Uninitialized,
    Ready,
}

/// Vertex + index pair, allocated at construction and uploaded on first use.
pub struct StaticGeometry<B: GpuBackend> {
    vertices: RingBuffer<B>,
    indices: RingBuffer<B>,
    vertex_bytes: Vec<u8>,
    index_bytes: Vec<u8>,
    index_count: u32,
    state: UploadState,
}

/// Copies `data` and zero-pads it to a 4-byte multiple.
fn padded_bytes<T: Pod>(data: &[T]) -> Vec<u8> {
    let mut bytes = bytemuck::cast_slice::<T, u8>(data).to_vec();
    bytes.resize(bytes.len().next_multiple_of(4), 0);
    bytes
}

impl<B: GpuBackend> StaticGeometry<B> {
    pub fn new<V: Pod>(
        backend: &B,
        label: &str,
        vertices: &[V],
        indices: &[u16],
    ) -> Result<Self, PipelineError> {
        let vertex_bytes = padded_bytes(vertices);
        let index_bytes = padded_bytes(indices);

        let vertex_ring = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: &format!("{label} vertices"),
                length: vertex_bytes.len() as u64,
                slots: 1,
                usage: BufferUsage::Vertex,
            },
        )?;
        let index_ring = RingBuffer::allocate(
            backend,
            &RingBufferDesc {
                label: &format!("{label} indices"),
                length: index_bytes.len() as u64,
                slots: 1,
                usage: BufferUsage::Index,
            },
        )?;

        Ok(Self {
            vertices: vertex_ring,
            indices: index_ring,
            vertex_bytes,
            index_bytes,
            index_count: indices.len() as u32,
            state: UploadState::Uninitialized,
        })
    }

    /// Unit geometry for `shape`.
    pub fn shape(backend: &B, shape: ShapeGeometry) -> Result<Self, PipelineError> {
        match shape {
            ShapeGeometry::Quad => {
                Self::new(backend, "lumen quad", &QUAD_VERTICES, &QUAD_INDICES)
            }
            ShapeGeometry::Triangle => Self::new(
                backend,
                "lumen triangle",
                &TRIANGLE_VERTICES,
                &TRIANGLE_INDICES,
            ),
        }
    }

    /// Textured unit quad used by sprites and glyphs.
    pub fn sprite_quad(backend: &B) -> Result<Self, PipelineError> {
        Self::new(backend, "lumen sprite quad", &SPRITE_QUAD_VERTICES, &QUAD_INDICES)
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Uploads vertex and index data if not done yet. Returns `true` if it uploaded.
    pub fn ensure_uploaded(&mut self, backend: &B) -> Result<bool, BufferError> {
        match self.state {
            UploadState::Ready => Ok(false),
            UploadState::Uninitialized => {
                self.vertices.write(backend, 0, 0, &self.vertex_bytes)?;
                self.indices.write(backend, 0, 0, &self.index_bytes)?;
                self.state = UploadState::Ready;
                log::debug!(
                    "uploaded {} ({} index bytes)",
                    self.vertices.label(),
                    self.index_bytes.len()
                );
                Ok(true)
            }
        }
    }

    pub fn vertex_buffer(&self) -> Result<(&B::Buffer, u64), BufferError> {
        self.vertices.next(0)
    }

    pub fn index_buffer(&self) -> Result<(&B::Buffer, u64), BufferError> {
        self.indices.next(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::CaptureBackend;

    #[test]
    fn upload_happens_once() {
        let backend = CaptureBackend::new();
        let mut geometry = StaticGeometry::shape(&backend, ShapeGeometry::Quad).unwrap();
        assert_eq!(geometry.state(), UploadState::Uninitialized);
        assert!(backend.writes().is_empty());

        assert!(geometry.ensure_uploaded(&backend).unwrap());
        assert_eq!(backend.writes().len(), 2);

        for _ in 0..5 {
            assert!(!geometry.ensure_uploaded(&backend).unwrap());
        }
        assert_eq!(backend.writes().len(), 2);
        assert_eq!(geometry.state(), UploadState::Ready);
    }

    #[test]
    fn triangle_indices_are_padded_but_count_is_kept() {
        let backend = CaptureBackend::new();
        let mut geometry = StaticGeometry::shape(&backend, ShapeGeometry::Triangle).unwrap();
        geometry.ensure_uploaded(&backend).unwrap();

        assert_eq!(geometry.index_count(), 3);
        let (indices, base) = geometry.index_buffer().unwrap();
        assert_eq!(indices.size, 8);
        let raw: [u16; 4] = backend.read_pod(indices, base);
        assert_eq!(raw, [0, 1, 2, 0]);
    }

    #[test]
    fn quad_has_six_indices() {
        let backend = CaptureBackend::new();
        let geometry = StaticGeometry::<CaptureBackend>::sprite_quad(&backend).unwrap();
        assert_eq!(geometry.index_count(), 6);
    }
}
