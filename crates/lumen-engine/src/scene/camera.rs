use glam::{Mat4, Vec3};

use crate::render::records::FrameUniforms;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Pixel space: origin top-left, y down, `near..far` depth range.
    Orthographic { near: f32, far: f32 },
    Perspective { fov_y: f32, near: f32, far: f32 },
}

/// View + projection source for the frame uniforms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    /// World position the view is centered on (ortho: top-left offset).
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::orthographic()
    }
}

impl Camera {
    pub fn orthographic() -> Self {
        Self {
            projection: Projection::Orthographic {
                near: -1000.0,
                far: 1000.0,
            },
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
        }
    }

    pub fn perspective(fov_y: f32, position: Vec3, target: Vec3) -> Self {
        Self {
            projection: Projection::Perspective {
                fov_y,
                near: 0.1,
                far: 1000.0,
            },
            position,
            target,
        }
    }

    pub fn projection_matrix(&self, width: f32, height: f32) -> Mat4 {
        let width = width.max(1.0);
        let height = height.max(1.0);
        match self.projection {
            Projection::Orthographic { near, far } => {
                Mat4::orthographic_rh(0.0, width, height, 0.0, near, far)
            }
            Projection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, width / height, near, far)
            }
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Orthographic { .. } => Mat4::from_translation(-self.position),
            Projection::Perspective { .. } => {
                Mat4::look_at_rh(self.position, self.target, Vec3::NEG_Y)
            }
        }
    }

    pub fn uniforms(&self, width: f32, height: f32) -> FrameUniforms {
        FrameUniforms::new(self.projection_matrix(width, height), self.view_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn ortho_maps_pixels_to_clip_space() {
        let camera = Camera::orthographic();
        let vp = camera.projection_matrix(800.0, 600.0) * camera.view_matrix();

        let top_left = vp * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = vp * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!((top_left.x + 1.0).abs() < 1e-5 && (top_left.y - 1.0).abs() < 1e-5);
        assert!((bottom_right.x - 1.0).abs() < 1e-5 && (bottom_right.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_size_viewport_is_clamped() {
        let m = Camera::orthographic().projection_matrix(0.0, 0.0);
        assert!(m.is_finite());
    }
}
