use glam::Mat4;

use super::drawable::Drawable;
use super::light::Light;
use super::transform::NodeTransform;

/// A drawable with the world matrix of its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub parent: Mat4,
    pub drawable: Drawable,
}

impl DrawItem {
    /// World matrix of the drawable.
    pub fn world(&self) -> Mat4 {
        self.drawable.decompose(&self.parent)
    }
}

/// Flattened scene for one frame.
///
/// Items are drawn in insertion order. Use [`push_parent`](Self::push_parent) /
/// [`pop_parent`](Self::pop_parent) to nest drawables under a node.
#[derive(Debug, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
    lights: Vec<Light>,

    /// World matrices of the open parents; the top is the current parent.
    parent_stack: Vec<Mat4>,
}

impl DrawList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears items, lights and the parent stack. Keeps capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
        self.lights.clear();
        self.parent_stack.clear();
    }

    #[inline]
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current parent world matrix (identity at the root).
    #[inline]
    pub fn current_parent(&self) -> Mat4 {
        self.parent_stack.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Adds a drawable under the current parent.
    #[inline]
    pub fn push(&mut self, drawable: Drawable) {
        let parent = self.current_parent();
        self.items.push(DrawItem { parent, drawable });
    }

    /// Adds a drawable under an explicit parent matrix.
    #[inline]
    pub fn push_with_parent(&mut self, parent: Mat4, drawable: Drawable) {
        self.items.push(DrawItem { parent, drawable });
    }

    /// Opens a parent node. Must be balanced with [`pop_parent`](Self::pop_parent).
    pub fn push_parent(&mut self, transform: &NodeTransform) {
        let world = transform.decompose(&self.current_parent());
        self.parent_stack.push(world);
    }

    pub fn pop_parent(&mut self) {
        debug_assert!(!self.parent_stack.is_empty(), "pop_parent without push_parent");
        self.parent_stack.pop();
    }

    #[inline]
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }
}
