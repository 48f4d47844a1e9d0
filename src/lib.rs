//! Editable tile map document model.
//!
//! A [`Map`] owns a tree of [`Layer`]s (tile, object and group layers), the
//! attached tilesets and the component definitions. Every entity carries
//! [`Metadata`]: a UUID, a name, typed [`Attribute`] properties and component
//! instances. [`Map::to_ir`] and [`Map::from_ir`] convert to and from the
//! identity-free [`ir_map`] snapshot that save formats consume.

mod attribute;
mod command;
mod component;
mod config;
mod error;
pub mod ir_map;
mod layer;
pub mod loader {
    //! Document (de)serialization.
    mod convert;
    pub mod json_loader;
}
mod map;
mod meta;
mod spatial;
mod tileset;

pub use attribute::{
    color_from_hex, color_to_hex, color_to_rgba8, Attribute, AttributeType, ObjectRef,
    UnknownAttributeType,
};
pub use command::TilePatch;
pub use component::{Component, ComponentBundle, ComponentDefinition, ComponentIndex};
pub use config::{DuplicateObjectPolicy, MapConfig};
pub use error::MapError;
pub use layer::{
    GroupLayer, Layer, LayerDelegate, LayerKind, LayerSubtree, LayerTree, LayerVisitor, Object,
    ObjectKind, ObjectLayer, PersistentIds, TileLayer,
};
pub use map::{Map, RemovedComponent, RestoreLayerError};
pub use meta::{AttributeMap, Metadata};
pub use spatial::{TileExtent, TileId, TileMatrix, TilePos};
pub use tileset::{Tileset, TilesetBundle, TilesetRef};
