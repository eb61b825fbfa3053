use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Local model matrix of a node plus its explicit depth.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodeTransform {
    pub model: Mat4,
    /// Layer depth. Written into the world matrix regardless of nesting.
    pub z: f32,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            z: 0.0,
        }
    }
}

impl NodeTransform {
    pub fn new(model: Mat4, z: f32) -> Self {
        Self { model, z }
    }

    /// 2D transform: non-uniform scale, then rotation about +Z, then translation.
    pub fn from_parts(translation: Vec2, rotation: f32, scale: Vec2, z: f32) -> Self {
        let model = Mat4::from_scale_rotation_translation(
            scale.extend(1.0),
            Quat::from_rotation_z(rotation),
            translation.extend(z),
        );
        Self { model, z }
    }

    /// World matrix of this node under `parent`.
    pub fn decompose(&self, parent: &Mat4) -> Mat4 {
        decompose(parent, &self.model, self.z)
    }
}

/// Composes a node's local model matrix with its parent's.
///
/// - rotation/scale: `parent.3x3 * local.3x3`
/// - translation: `parent.translation + local.translation`, then `z` replaced
///   by the node's own depth and `w` set to 1
pub fn decompose(parent: &Mat4, local: &Mat4, z: f32) -> Mat4 {
    let rot_scale = Mat3::from_mat4(*parent) * Mat3::from_mat4(*local);
    let translation: Vec3 = parent.w_axis.truncate() + local.w_axis.truncate();

    Mat4::from_cols(
        rot_scale.x_axis.extend(0.0),
        rot_scale.y_axis.extend(0.0),
        rot_scale.z_axis.extend(0.0),
        Vec4::new(translation.x, translation.y, z, 1.0),
    )
}
