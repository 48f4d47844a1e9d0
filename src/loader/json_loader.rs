use std::path::Path;

use tracing::debug;

use crate::error::MapError;
use crate::ir_map::IrMap;

/// Parses a JSON document held in memory.
pub fn decode_map_str(txt: &str) -> Result<IrMap, MapError> {
    serde_json::from_str(txt).map_err(|e| MapError::InvalidMap(format!("malformed map JSON: {e}")))
}

/// Reads and parses a `.json` map file.
pub fn decode_map_file(path: impl AsRef<Path>) -> Result<IrMap, MapError> {
    let p = path.as_ref();
    if p.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(MapError::InvalidMap(format!(
            "Map file must be a JSON file: {}",
            p.display()
        )));
    }

    let txt = std::fs::read_to_string(p).map_err(|source| MapError::Io {
        path: p.to_path_buf(),
        source,
    })?;
    let ir: IrMap = serde_json::from_str(&txt).map_err(|source| MapError::Json {
        path: p.to_path_buf(),
        source,
    })?;

    debug!(path = %p.display(), layers = ir.layers.len(), "decoded map file");
    Ok(ir)
}

/// Renders a document as pretty-printed JSON.
pub fn encode_map_string(ir: &IrMap) -> Result<String, MapError> {
    serde_json::to_string_pretty(ir).map_err(|e| MapError::InvalidMap(format!("cannot encode map: {e}")))
}

/// Writes a document to `path` as pretty-printed JSON.
pub fn encode_map_file(ir: &IrMap, path: impl AsRef<Path>) -> Result<(), MapError> {
    let p = path.as_ref();
    let txt = serde_json::to_string_pretty(ir).map_err(|source| MapError::Json {
        path: p.to_path_buf(),
        source,
    })?;
    std::fs::write(p, txt).map_err(|source| MapError::Io {
        path: p.to_path_buf(),
        source,
    })?;
    debug!(path = %p.display(), "encoded map file");
    Ok(())
}
