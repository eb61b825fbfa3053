//! GPU-visible vertex, instance and uniform layouts.
//!
//! Shader locations: geometry attributes come first, instance attributes
//! follow. Keep these in sync with `shaders/*.wgsl`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::paint::Color;
use crate::scene::{Light, UvRect};

// ── geometry vertices ─────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ShapeVertex {
    pub position: [f32; 3],
}

impl ShapeVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ShapeVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SpriteVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2  // uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Full-screen quad vertex, NDC.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two triangles covering clip space.
pub const FULLSCREEN_QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0] },
];

// ── instances ─────────────────────────────────────────────────────────────

/// Per-instance record written into an instance ring each frame.
pub trait InstanceRecord: Pod {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// World-space translation of the instance.
    fn world_position(&self) -> Vec3;

    fn set_light(&mut self, light: [f32; 4]);
}

/// Sum of every light's contribution at `position`; `w` is 1 when lit.
pub fn light_term(lights: &[Light], position: Vec3) -> [f32; 4] {
    if lights.is_empty() {
        return [0.0; 4];
    }
    let sum = lights
        .iter()
        .fold(Vec3::ZERO, |acc, light| acc + light.influence_at(position));
    [sum.x, sum.y, sum.z, 1.0]
}

pub fn apply_lights<T: InstanceRecord>(records: &mut [T], lights: &[Light]) {
    for record in records {
        let term = light_term(lights, record.world_position());
        record.set_light(term);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ShapeInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub light: [f32; 4],
}

impl ShapeInstance {
    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        1 => Float32x4, // model col 0
        2 => Float32x4, // model col 1
        3 => Float32x4, // model col 2
        4 => Float32x4, // model col 3
        5 => Float32x4, // color
        6 => Float32x4  // light
    ];

    pub fn new(model: Mat4, color: Color) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
            light: [0.0; 4],
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ShapeInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

impl InstanceRecord for ShapeInstance {
    fn world_position(&self) -> Vec3 {
        Vec3::new(self.model[3][0], self.model[3][1], self.model[3][2])
    }

    fn set_light(&mut self, light: [f32; 4]) {
        self.light = light;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// `[u0, v0, u1, v1]` inside the bound texture.
    pub uv_rect: [f32; 4],
    pub light: [f32; 4],
}

impl SpriteInstance {
    const ATTRS: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        2 => Float32x4, // model col 0
        3 => Float32x4, // model col 1
        4 => Float32x4, // model col 2
        5 => Float32x4, // model col 3
        6 => Float32x4, // color
        7 => Float32x4, // uv rect
        8 => Float32x4  // light
    ];

    pub fn new(model: Mat4, color: Color, uv: UvRect) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
            uv_rect: uv.to_array(),
            light: [0.0; 4],
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

impl InstanceRecord for SpriteInstance {
    fn world_position(&self) -> Vec3 {
        Vec3::new(self.model[3][0], self.model[3][1], self.model[3][2])
    }

    fn set_light(&mut self, light: [f32; 4]) {
        self.light = light;
    }
}

// ── uniforms ──────────────────────────────────────────────────────────────

/// Per-frame uniform block, vertex stage binding 2.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl FrameUniforms {
    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        }
    }
}

/// Composition fragment constants, fragment stage binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CompositionConstants {
    pub ambient: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_layouts() {
        assert_eq!(ShapeInstance::SIZE, 96);
        assert_eq!(SpriteInstance::SIZE, 112);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 128);
        assert_eq!(std::mem::size_of::<CompositionConstants>(), 16);
        assert_eq!(ShapeInstance::layout().array_stride, 96);
    }

    #[test]
    fn instance_locations_follow_geometry_locations() {
        let shape_first = ShapeInstance::layout().attributes[0].shader_location;
        let sprite_first = SpriteInstance::layout().attributes[0].shader_location;
        assert_eq!(shape_first, ShapeVertex::layout().attributes.len() as u32);
        assert_eq!(sprite_first, SpriteVertex::layout().attributes.len() as u32);
    }

    #[test]
    fn world_position_is_model_translation() {
        let record = ShapeInstance::new(
            Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0)),
            Color::WHITE,
        );
        assert_eq!(record.world_position(), Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn lights_fill_the_light_term() {
        let light = Light::new(Vec3::ZERO, Color::WHITE, 2.0, 10.0);
        let mut records = [
            ShapeInstance::new(Mat4::IDENTITY, Color::WHITE),
            ShapeInstance::new(Mat4::from_translation(Vec3::new(20.0, 0.0, 0.0)), Color::WHITE),
        ];
        apply_lights(&mut records, &[light]);
        assert_eq!(records[0].light, [2.0, 2.0, 2.0, 1.0]);
        assert_eq!(records[1].light, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn no_lights_leaves_term_zero() {
        assert_eq!(light_term(&[], Vec3::ZERO), [0.0; 4]);
    }
}
