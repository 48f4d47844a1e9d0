//! Identity-free snapshot of a map document.
//!
//! These types carry no UUIDs and no behaviour. Save-format emitters read
//! them; the JSON loader (de)serializes them directly.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Newest document version this crate writes and understands.
pub const FORMAT_VERSION: u32 = 1;

/// Canonical, format-agnostic map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrMap {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(flatten)]
    pub meta: IrMetadata,
    pub rows: usize,
    pub cols: usize,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default = "one")]
    pub next_layer_id: i32,
    #[serde(default = "one")]
    pub next_object_id: i32,
    /// Component definitions; attached instances live in each entity's metadata.
    #[serde(default)]
    pub definitions: Vec<IrComponent>,
    #[serde(default)]
    pub tilesets: Vec<IrTilesetRef>, // sorted by first_tile
    #[serde(default)]
    pub layers: Vec<IrLayer>, // top-level layers, first to last
}

fn current_version() -> u32 {
    FORMAT_VERSION
}
fn one() -> i32 {
    1
}
fn one_f32() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}

/// Name, properties and component values of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, IrAttribute>,
    /// Attached components keyed by definition name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, BTreeMap<String, IrAttribute>>,
}

/// A component definition with its default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrComponent {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, IrAttribute>,
}

/// An attached tileset and the first global tile id it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrTilesetRef {
    pub first_tile: i32,
    #[serde(flatten)]
    pub meta: IrMetadata,
    pub image: PathBuf,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: i32,
    pub column_count: i32,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrLayer {
    #[serde(flatten)]
    pub meta: IrMetadata,
    #[serde(default)]
    pub persistent_id: Option<i32>,
    #[serde(default = "one_f32")]
    pub opacity: f32,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub kind: IrLayerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IrLayerKind {
    Tiles {
        rows: usize,
        cols: usize,
        data: Vec<i32>, // row-major tile ids, 0 = empty
    },
    Objects {
        #[serde(default)]
        objects: Vec<IrObject>,
    },
    Group {
        #[serde(default)]
        layers: Vec<IrLayer>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrObject {
    #[serde(flatten)]
    pub meta: IrMetadata,
    #[serde(default)]
    pub persistent_id: Option<i32>,
    /// "point", "rect" or "ellipse".
    pub shape: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// A typed attribute value. The tag names match
/// [`AttributeType::name`](crate::AttributeType::name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum IrAttribute {
    String(String),
    Int(i32),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Bool(bool),
    /// `#RRGGBBAA`
    Color(String),
    Path(PathBuf),
    Object(i32),
}
