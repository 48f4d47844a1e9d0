//! Tile addressing and the dense tile grid.

mod index;
mod matrix;

pub use index::{TileExtent, TileId, TilePos};
pub use matrix::TileMatrix;
pub(crate) use matrix::check_extent;
