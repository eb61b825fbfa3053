//! Groups drawables into one instanced draw per (pipeline, geometry/texture).

use glam::Mat4;

use crate::scene::{Drawable, DrawList, ShapeGeometry, TextureId};

use super::records::{ShapeInstance, SpriteInstance};

#[derive(Debug, Clone)]
pub struct ShapeBatch {
    pub geometry: ShapeGeometry,
    pub instances: Vec<ShapeInstance>,
}

#[derive(Debug, Clone)]
pub struct SpriteBatch {
    pub texture: TextureId,
    pub instances: Vec<SpriteInstance>,
}

/// Per-frame instance batches.
///
/// Batches appear in the order their key is first seen; records inside a
/// batch keep insertion order. Batch vectors are pooled across frames.
#[derive(Debug, Default)]
pub struct InstanceBatcher {
    shapes: Vec<ShapeBatch>,
    active_shapes: usize,
    sprites: Vec<SpriteBatch>,
    active_sprites: usize,
}

impl InstanceBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for batch in &mut self.shapes[..self.active_shapes] {
            batch.instances.clear();
        }
        for batch in &mut self.sprites[..self.active_sprites] {
            batch.instances.clear();
        }
        self.active_shapes = 0;
        self.active_sprites = 0;
    }

    /// Rebuilds the batches from `list`.
    pub fn build(&mut self, list: &DrawList) {
        self.clear();
        for item in list.items() {
            item.drawable.draw(&item.parent, self);
        }
    }

    /// Appends the instances of one drawable.
    pub fn push_drawable(&mut self, parent: &Mat4, drawable: &Drawable) {
        if !drawable.is_visible() {
            return;
        }
        let world = drawable.decompose(parent);
        match drawable {
            Drawable::Shape(node) => {
                let model = world * Mat4::from_scale(node.size.extend(1.0));
                self.shape_batch(node.geometry)
                    .push(ShapeInstance::new(model, node.color));
            }
            Drawable::Sprite(node) => {
                let model = world * Mat4::from_scale(node.size.extend(1.0));
                self.sprite_batch(node.texture)
                    .push(SpriteInstance::new(model, node.color, node.uv));
            }
            Drawable::Text(node) => {
                if node.glyphs.is_empty() {
                    return;
                }
                let batch = self.sprite_batch(node.atlas);
                batch.extend(
                    node.glyphs
                        .iter()
                        .map(|g| SpriteInstance::new(world * g.local_model(), node.color, g.uv)),
                );
            }
        }
    }

    pub fn shape_batches(&self) -> &[ShapeBatch] {
        &self.shapes[..self.active_shapes]
    }

    pub fn sprite_batches(&self) -> &[SpriteBatch] {
        &self.sprites[..self.active_sprites]
    }

    pub fn shape_instance_count(&self) -> usize {
        self.shape_batches().iter().map(|b| b.instances.len()).sum()
    }

    pub fn sprite_instance_count(&self) -> usize {
        self.sprite_batches().iter().map(|b| b.instances.len()).sum()
    }

    fn shape_batch(&mut self, geometry: ShapeGeometry) -> &mut Vec<ShapeInstance> {
        let active = &self.shapes[..self.active_shapes];
        let index = match active.iter().position(|b| b.geometry == geometry) {
            Some(i) => i,
            None => {
                if let Some(pooled) = self.shapes.get_mut(self.active_shapes) {
                    pooled.geometry = geometry;
                    pooled.instances.clear();
                } else {
                    self.shapes.push(ShapeBatch {
                        geometry,
                        instances: Vec::new(),
                    });
                }
                self.active_shapes += 1;
                self.active_shapes - 1
            }
        };
        &mut self.shapes[index].instances
    }

    fn sprite_batch(&mut self, texture: TextureId) -> &mut Vec<SpriteInstance> {
        let active = &self.sprites[..self.active_sprites];
        let index = match active.iter().position(|b| b.texture == texture) {
            Some(i) => i,
            None => {
                if let Some(pooled) = self.sprites.get_mut(self.active_sprites) {
                    pooled.texture = texture;
                    pooled.instances.clear();
                } else {
                    self.sprites.push(SpriteBatch {
                        texture,
                        instances: Vec::new(),
                    });
                }
                self.active_sprites += 1;
                self.active_sprites - 1
            }
        };
        &mut self.sprites[index].instances
    }
}
