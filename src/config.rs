//! Construction-time settings for a [`Map`](crate::Map).

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::spatial::check_extent;

/// What [`ObjectLayer::add_object`](crate::ObjectLayer::add_object) does when
/// an object with the same UUID already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateObjectPolicy {
    /// Fail with [`MapError::DuplicateObject`] and keep the existing object.
    #[default]
    Reject,
    /// Replace the existing object.
    Overwrite,
}

/// Initial dimensions and behaviour switches of a new map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_extent")]
    pub rows: usize,
    #[serde(default = "default_extent")]
    pub cols: usize,
    #[serde(default = "default_tile_size")]
    pub tile_width: u32,
    #[serde(default = "default_tile_size")]
    pub tile_height: u32,
    #[serde(default)]
    pub object_policy: DuplicateObjectPolicy,
}

fn default_extent() -> usize {
    16
}
fn default_tile_size() -> u32 {
    32
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            rows: default_extent(),
            cols: default_extent(),
            tile_width: default_tile_size(),
            tile_height: default_tile_size(),
            object_policy: DuplicateObjectPolicy::default(),
        }
    }
}

impl MapConfig {
    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json_str(txt: &str) -> Result<Self, MapError> {
        let config: Self = serde_json::from_str(txt)
            .map_err(|e| MapError::InvalidMap(format!("invalid map config: {e}")))?;
        check_extent(config.rows, config.cols)?;
        Ok(config)
    }
}
