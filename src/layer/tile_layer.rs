use crate::error::MapError;
use crate::spatial::{TileExtent, TileId, TileMatrix, TilePos};

use super::LayerDelegate;

/// A layer holding a grid of tiles, always as large as its map.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    delegate: LayerDelegate,
    matrix: TileMatrix,
}

impl TileLayer {
    /// Creates a layer of empty tiles.
    pub fn new(name: impl Into<String>, extent: TileExtent) -> Result<Self, MapError> {
        Ok(Self {
            delegate: LayerDelegate::new(name),
            matrix: TileMatrix::new(extent)?,
        })
    }

    /// Creates a layer around existing tile data.
    pub fn with_matrix(name: impl Into<String>, matrix: TileMatrix) -> Self {
        Self {
            delegate: LayerDelegate::new(name),
            matrix,
        }
    }

    #[inline] pub fn delegate(&self) -> &LayerDelegate { &self.delegate }
    #[inline] pub fn delegate_mut(&mut self) -> &mut LayerDelegate { &mut self.delegate }
    #[inline] pub fn matrix(&self) -> &TileMatrix { &self.matrix }
    #[inline] pub fn extent(&self) -> TileExtent { self.matrix.extent() }

    /// Returns the tile at `pos`, or `None` outside the layer.
    pub fn tile_at(&self, pos: TilePos) -> Option<TileId> {
        self.matrix.get(pos)
    }

    /// Writes a tile; positions outside the layer are ignored.
    pub fn set_tile(&mut self, pos: TilePos, id: TileId) -> bool {
        self.matrix.set(pos, id)
    }

    /// Bucket fill. See [`TileMatrix::flood`].
    pub fn flood(&mut self, origin: TilePos, replacement: TileId, affected: Option<&mut Vec<TilePos>>) {
        self.matrix.flood(origin, replacement, affected);
    }

    pub fn add_row(&mut self) {
        self.matrix.add_row();
    }

    pub fn add_column(&mut self) {
        self.matrix.add_column();
    }

    pub fn remove_row(&mut self) -> Result<(), MapError> {
        self.matrix.remove_row()
    }

    pub fn remove_column(&mut self) -> Result<(), MapError> {
        self.matrix.remove_column()
    }

    pub fn resize(&mut self, extent: TileExtent) -> Result<(), MapError> {
        self.matrix.resize(extent.rows, extent.cols)
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            delegate: self.delegate.duplicate(),
            matrix: self.matrix.clone(),
        }
    }
}
