//! Binding layout contract shared by every pipeline and program.
//!
//! Vertex stage: slot 0 = shared geometry, slot 1 = per-instance records,
//! binding 2 = frame uniform block. Fragment stage: binding 0 = constant input
//! of the composition pass.

/// Vertex buffer slots.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexSlot {
    Geometry = 0,
    Instances = 1,
}

impl VertexSlot {
    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }
}

/// Uniform buffer bindings.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformSlot {
    /// Projection/view block read by the vertex stage.
    FrameUniforms,
    /// Constant input read by the fragment stage.
    FragmentConstants,
}

impl UniformSlot {
    /// Binding number inside the slot's bind group.
    #[inline]
    pub const fn binding(self) -> u32 {
        match self {
            UniformSlot::FrameUniforms => 2,
            UniformSlot::FragmentConstants => 0,
        }
    }

    #[inline]
    pub const fn group_kind(self) -> BindGroupKind {
        match self {
            UniformSlot::FrameUniforms => BindGroupKind::FrameUniforms,
            UniformSlot::FragmentConstants => BindGroupKind::FragmentConstants,
        }
    }
}

/// Fragment texture inputs, in the order the program declares them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureSlot {
    Primary = 0,
    Secondary = 1,
}

impl TextureSlot {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Kind of a bind group in a pipeline layout.
///
/// A pipeline lists its groups in order; the position in that list is the
/// `@group(n)` index programs use.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BindGroupKind {
    /// `@binding(2)`: dynamic-offset uniform buffer, vertex stage.
    FrameUniforms,
    /// `@binding(0)`: dynamic-offset uniform buffer, fragment stage.
    FragmentConstants,
    /// `@binding(0)` texture + `@binding(1)` sampler, fragment stage.
    Texture,
}

/// Resolves the group index of `kind` in `groups`, skipping `nth` earlier matches.
pub fn group_index(groups: &[BindGroupKind], kind: BindGroupKind, nth: usize) -> Option<u32> {
    groups
        .iter()
        .enumerate()
        .filter(|(_, g)| **g == kind)
        .nth(nth)
        .map(|(i, _)| i as u32)
}
