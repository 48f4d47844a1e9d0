//! Layer node kinds and the layer tree.
//!
//! Every layer is one of three kinds: [`TileLayer`], [`ObjectLayer`] or
//! [`GroupLayer`], wrapped in the [`Layer`] sum type. The shared state
//! (metadata, opacity, visibility, persistent id) lives in a
//! [`LayerDelegate`] that each kind embeds.
//!
//! Layers are stored in a [`LayerTree`], an arena keyed by UUID where group
//! layers hold the ordered ids of their children. Removing a layer hands the
//! whole detached subtree to the caller as a [`LayerSubtree`], which can be
//! inserted again later without rebuilding it.

mod group_layer;
mod object;
mod object_layer;
mod tile_layer;
mod tree;

pub use group_layer::GroupLayer;
pub use object::{Object, ObjectKind};
pub use object_layer::ObjectLayer;
pub use tile_layer::TileLayer;
pub use tree::{LayerSubtree, LayerTree, LayerVisitor};

use uuid::Uuid;

use crate::error::MapError;
use crate::meta::Metadata;

/// Discriminant of a [`Layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Tile,
    Object,
    Group,
}

/// State shared by every layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDelegate {
    meta: Metadata,
    opacity: f32,
    visible: bool,
    persistent_id: Option<i32>,
}

impl LayerDelegate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: Metadata::new(name),
            opacity: 1.0,
            visible: true,
            persistent_id: None,
        }
    }

    #[inline] pub fn meta(&self) -> &Metadata { &self.meta }
    #[inline] pub fn meta_mut(&mut self) -> &mut Metadata { &mut self.meta }
    #[inline] pub fn opacity(&self) -> f32 { self.opacity }
    #[inline] pub fn is_visible(&self) -> bool { self.visible }
    #[inline] pub fn persistent_id(&self) -> Option<i32> { self.persistent_id }

    /// Sets the opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_persistent_id(&mut self, id: Option<i32>) {
        self.persistent_id = id;
    }

    /// Copy with fresh identity; the persistent id is left for the caller to assign.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            meta: self.meta.duplicate(),
            persistent_id: None,
            ..self.clone()
        }
    }
}

/// Monotonic persistent id counters for layers and objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentIds {
    pub next_layer_id: i32,
    pub next_object_id: i32,
}

impl Default for PersistentIds {
    fn default() -> Self {
        Self {
            next_layer_id: 1,
            next_object_id: 1,
        }
    }
}

impl PersistentIds {
    pub fn next_layer(&mut self) -> Result<i32, MapError> {
        take_next(&mut self.next_layer_id, "layer")
    }

    pub fn next_object(&mut self) -> Result<i32, MapError> {
        take_next(&mut self.next_object_id, "object")
    }
}

fn take_next(counter: &mut i32, kind: &'static str) -> Result<i32, MapError> {
    let id = *counter;
    *counter = id.checked_add(1).ok_or(MapError::IdsExhausted { kind })?;
    Ok(id)
}

/// A node of the layer tree.
#[derive(Debug)]
pub enum Layer {
    Tile(TileLayer),
    Object(ObjectLayer),
    Group(GroupLayer),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Tile(_) => LayerKind::Tile,
            Layer::Object(_) => LayerKind::Object,
            Layer::Group(_) => LayerKind::Group,
        }
    }

    pub fn delegate(&self) -> &LayerDelegate {
        match self {
            Layer::Tile(layer) => layer.delegate(),
            Layer::Object(layer) => layer.delegate(),
            Layer::Group(layer) => layer.delegate(),
        }
    }

    pub fn delegate_mut(&mut self) -> &mut LayerDelegate {
        match self {
            Layer::Tile(layer) => layer.delegate_mut(),
            Layer::Object(layer) => layer.delegate_mut(),
            Layer::Group(layer) => layer.delegate_mut(),
        }
    }

    #[inline] pub fn uuid(&self) -> Uuid { self.delegate().meta().uuid() }
    #[inline] pub fn meta(&self) -> &Metadata { self.delegate().meta() }
    #[inline] pub fn meta_mut(&mut self) -> &mut Metadata { self.delegate_mut().meta_mut() }
    #[inline] pub fn name(&self) -> &str { self.meta().name() }
    #[inline] pub fn opacity(&self) -> f32 { self.delegate().opacity() }
    #[inline] pub fn is_visible(&self) -> bool { self.delegate().is_visible() }
    #[inline] pub fn persistent_id(&self) -> Option<i32> { self.delegate().persistent_id() }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.delegate_mut().set_opacity(opacity);
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.delegate_mut().set_visible(visible);
    }

    pub fn set_persistent_id(&mut self, id: Option<i32>) {
        self.delegate_mut().set_persistent_id(id);
    }

    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match self {
            Layer::Tile(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_tile_layer_mut(&mut self) -> Option<&mut TileLayer> {
        match self {
            Layer::Tile(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_object_layer(&self) -> Option<&ObjectLayer> {
        match self {
            Layer::Object(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_object_layer_mut(&mut self) -> Option<&mut ObjectLayer> {
        match self {
            Layer::Object(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_group_layer(&self) -> Option<&GroupLayer> {
        match self {
            Layer::Group(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_group_layer_mut(&mut self) -> Option<&mut GroupLayer> {
        match self {
            Layer::Group(layer) => Some(layer),
            _ => None,
        }
    }
}

impl From<TileLayer> for Layer {
    fn from(layer: TileLayer) -> Self {
        Layer::Tile(layer)
    }
}

impl From<ObjectLayer> for Layer {
    fn from(layer: ObjectLayer) -> Self {
        Layer::Object(layer)
    }
}

impl From<GroupLayer> for Layer {
    fn from(layer: GroupLayer) -> Self {
        Layer::Group(layer)
    }
}
