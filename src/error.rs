use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::attribute::AttributeType;

/// Error type for map document operations and the IR loader
#[derive(Debug, Error)]
pub enum MapError {
    /// An attribute accessor was used for a kind other than the active one
    #[error("attribute type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The kind the caller asked for
        expected: AttributeType,
        /// The kind actually stored
        actual: AttributeType,
    },

    /// A property, component attribute or definition name is already in use
    #[error("name '{name}' is already in use")]
    DuplicateName {
        /// The colliding name
        name: String,
    },

    /// No property or attribute with the given name exists
    #[error("no attribute named '{name}'")]
    NameNotFound {
        /// The missing name
        name: String,
    },

    /// No component (definition or instance) with the given id exists
    #[error("no component with id {0}")]
    ComponentNotFound(Uuid),

    /// The bundle already holds an instance of the component definition
    #[error("component {0} is already attached")]
    DuplicateComponent(Uuid),

    /// No object with the given id exists
    #[error("no object with id {0}")]
    ObjectNotFound(Uuid),

    /// An object with the same id already lives in the layer
    #[error("object {uuid} already exists in layer")]
    DuplicateObject {
        /// The colliding object id
        uuid: Uuid,
    },

    /// No layer with the given id exists in the searched tree
    #[error("no layer with id {0}")]
    LayerNotFound(Uuid),

    /// A layer with the same id is already part of the tree
    #[error("layer {0} is already in the tree")]
    LayerAlreadyPresent(Uuid),

    /// The layer exists but is not a group layer
    #[error("layer {0} is not a group layer")]
    NotAGroup(Uuid),

    /// No context (map, layer, object or tileset) with the given id exists
    #[error("no context with id {0}")]
    ContextNotFound(Uuid),

    /// No tileset with the given id is attached
    #[error("no tileset with id {0}")]
    TilesetNotFound(Uuid),

    /// A tileset range would overlap an already attached tileset
    #[error("tile range starting at {first} overlaps an attached tileset")]
    TileRangeOverlap {
        /// The requested first tile id
        first: i32,
    },

    /// An index lies outside the valid range `[0, len]`
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The offending index
        index: usize,
        /// The current number of elements
        len: usize,
    },

    /// Requested dimensions would leave a row or column count below 1
    #[error("invalid extent {rows}x{cols}: rows and columns must be at least 1")]
    InvalidExtent {
        /// Requested rows
        rows: usize,
        /// Requested columns
        cols: usize,
    },

    /// Requested dimensions cannot be addressed or allocated
    #[error("extent {rows}x{cols} is too large")]
    ExtentTooLarge {
        /// Requested rows
        rows: usize,
        /// Requested columns
        cols: usize,
    },

    /// A persistent id counter reached `i32::MAX`
    #[error("persistent {kind} ids are exhausted")]
    IdsExhausted {
        /// "layer" or "object"
        kind: &'static str,
    },

    /// File I/O error
    #[error("I/O error for {path:?}: {source}")]
    Io {
        /// The file being read or written
        path: PathBuf,
        /// The underlying error
        #[source]
        source: io::Error,
    },

    /// JSON parse or write error
    #[error("JSON error for {path:?}: {source}")]
    Json {
        /// The file being read or written
        path: PathBuf,
        /// The underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The document is structurally invalid
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// A tile layer references a tile id that no attached tileset provides
    #[error("layer '{layer}' references tile {tile}, but the largest valid id is {max}")]
    InvalidTileId {
        /// The layer name
        layer: String,
        /// The offending tile id
        tile: i32,
        /// The largest valid tile id
        max: i32,
    },
}
