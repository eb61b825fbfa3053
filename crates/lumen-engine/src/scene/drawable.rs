use glam::{Mat4, Vec2};

use crate::paint::Color;
use crate::render::batch::InstanceBatcher;

use super::transform::NodeTransform;

/// Handle to a texture registered with the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(pub u32);

/// Built-in unit shapes; each maps to one static geometry upload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShapeGeometry {
    Quad,
    Triangle,
}

/// Texture sub-rectangle in normalized coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    pub const fn new(u0: f32, v0: f32, u1: f32, v1: f32) -> Self {
        Self { u0, v0, u1, v1 }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.u1, self.v1]
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Untextured shape. `size` scales the unit geometry; the transform places its center.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    pub geometry: ShapeGeometry,
    pub transform: NodeTransform,
    pub size: Vec2,
    pub color: Color,
    /// Hidden nodes stay in the list but produce no instances.
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteNode {
    pub texture: TextureId,
    pub transform: NodeTransform,
    pub size: Vec2,
    /// Tint, multiplied with the sampled texel.
    pub color: Color,
    pub uv: UvRect,
    pub visible: bool,
}

/// One laid-out glyph quad, relative to the text node's origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    /// Top-left offset.
    pub offset: Vec2,
    pub size: Vec2,
    pub uv: UvRect,
}

impl Glyph {
    /// Glyph model matrix relative to its node: unit quad moved to the glyph's center.
    pub fn local_model(&self) -> Mat4 {
        let center = self.offset + self.size * 0.5;
        Mat4::from_translation(center.extend(0.0)) * Mat4::from_scale(self.size.extend(1.0))
    }
}

/// Pre-laid-out text: glyph quads sampled from an atlas texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub atlas: TextureId,
    pub transform: NodeTransform,
    pub color: Color,
    pub glyphs: Vec<Glyph>,
    pub visible: bool,
}

/// Everything the renderer can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    Shape(ShapeNode),
    Sprite(SpriteNode),
    Text(TextNode),
}

impl Drawable {
    pub fn shape(geometry: ShapeGeometry, transform: NodeTransform, size: Vec2, color: Color) -> Self {
        Drawable::Shape(ShapeNode {
            geometry,
            transform,
            size,
            color,
            visible: true,
        })
    }

    pub fn sprite(texture: TextureId, transform: NodeTransform, size: Vec2, color: Color) -> Self {
        Drawable::Sprite(SpriteNode {
            texture,
            transform,
            size,
            color,
            uv: UvRect::FULL,
            visible: true,
        })
    }

    pub fn transform(&self) -> &NodeTransform {
        match self {
            Drawable::Shape(n) => &n.transform,
            Drawable::Sprite(n) => &n.transform,
            Drawable::Text(n) => &n.transform,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Drawable::Shape(n) => n.visible,
            Drawable::Sprite(n) => n.visible,
            Drawable::Text(n) => n.visible,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        match self {
            Drawable::Shape(n) => n.visible = visible,
            Drawable::Sprite(n) => n.visible = visible,
            Drawable::Text(n) => n.visible = visible,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Drawable::Shape(n) => n.color,
            Drawable::Sprite(n) => n.color,
            Drawable::Text(n) => n.color,
        }
    }

    pub fn texture(&self) -> Option<TextureId> {
        match self {
            Drawable::Shape(_) => None,
            Drawable::Sprite(n) => Some(n.texture),
            Drawable::Text(n) => Some(n.atlas),
        }
    }

    /// Shape geometry for untextured drawables; textured ones use the sprite quad.
    pub fn geometry(&self) -> Option<ShapeGeometry> {
        match self {
            Drawable::Shape(n) => Some(n.geometry),
            Drawable::Sprite(_) | Drawable::Text(_) => None,
        }
    }

    /// World matrix under `parent`.
    pub fn decompose(&self, parent: &Mat4) -> Mat4 {
        self.transform().decompose(parent)
    }

    /// Records this drawable's instances for the current frame.
    pub fn draw(&self, parent: &Mat4, batcher: &mut InstanceBatcher) {
        batcher.push_drawable(parent, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn accessors_follow_variant() {
        let shape = Drawable::shape(
            ShapeGeometry::Triangle,
            NodeTransform::default(),
            Vec2::ONE,
            Color::WHITE,
        );
        assert_eq!(shape.texture(), None);
        assert_eq!(shape.geometry(), Some(ShapeGeometry::Triangle));

        let sprite = Drawable::sprite(TextureId(3), NodeTransform::default(), Vec2::ONE, Color::BLACK);
        assert_eq!(sprite.texture(), Some(TextureId(3)));
        assert_eq!(sprite.geometry(), None);
        assert_eq!(sprite.color(), Color::BLACK);
    }

    #[test]
    fn drawables_start_visible() {
        let mut shape = Drawable::shape(
            ShapeGeometry::Quad,
            NodeTransform::default(),
            Vec2::ONE,
            Color::WHITE,
        );
        assert!(shape.is_visible());
        shape.set_visible(false);
        assert!(!shape.is_visible());
        assert!(matches!(shape, Drawable::Shape(ShapeNode { visible: false, .. })));
    }

    #[test]
    fn glyph_model_covers_its_rect() {
        let glyph = Glyph {
            offset: Vec2::new(10.0, 20.0),
            size: Vec2::new(4.0, 8.0),
            uv: UvRect::FULL,
        };
        let m = glyph.local_model();
        assert_eq!(m * Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec4::new(10.0, 20.0, 0.0, 1.0));
        assert_eq!(m * Vec4::new(0.5, 0.5, 0.0, 1.0), Vec4::new(14.0, 28.0, 0.0, 1.0));
    }
}
