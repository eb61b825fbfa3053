use glam::Vec3;

use crate::paint::Color;

/// Point light with linear radius falloff, squared.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Color,
    pub intensity: f32,
    pub radius: f32,
}

impl Light {
    pub fn new(position: Vec3, color: Color, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            radius,
        }
    }

    /// RGB contribution at `point`: `color * intensity * (1 - d / radius)^2`, zero past `radius`.
    pub fn influence_at(&self, point: Vec3) -> Vec3 {
        if self.radius <= 0.0 {
            return Vec3::ZERO;
        }
        let d = self.position.distance(point);
        let falloff = (1.0 - d / self.radius).max(0.0);
        Vec3::new(self.color.r, self.color.g, self.color.b) * self.intensity * falloff * falloff
    }
}
