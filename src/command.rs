//! Tile-level inverse data for undoable edits.

use std::collections::BTreeMap;

use crate::layer::TileLayer;
use crate::spatial::{TileId, TilePos};

/// Position → tile id pairs recorded before an edit.
///
/// Applying the patch writes every recorded id back, which makes it the
/// inverse of a flood fill or of [`Map::fix_tiles`](crate::Map::fix_tiles).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilePatch {
    tiles: BTreeMap<TilePos, TileId>,
}

impl TilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a patch from a flood's affected positions; every position held
    /// `previous` before the fill.
    pub fn from_affected(positions: &[TilePos], previous: TileId) -> Self {
        positions.iter().map(|pos| (*pos, previous)).collect()
    }

    /// Records the previous id of `pos`. The first recorded value wins.
    pub fn insert(&mut self, pos: TilePos, id: TileId) {
        self.tiles.entry(pos).or_insert(id);
    }

    pub fn get(&self, pos: TilePos) -> Option<TileId> {
        self.tiles.get(&pos).copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Recorded pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, TileId)> + '_ {
        self.tiles.iter().map(|(pos, id)| (*pos, *id))
    }

    /// Writes every recorded id into `layer`, skipping positions outside it.
    /// Returns how many cells were written.
    pub fn apply(&self, layer: &mut TileLayer) -> usize {
        self.iter()
            .filter(|(pos, id)| layer.set_tile(*pos, *id))
            .count()
    }
}

impl FromIterator<(TilePos, TileId)> for TilePatch {
    fn from_iter<I: IntoIterator<Item = (TilePos, TileId)>>(iter: I) -> Self {
        let mut patch = Self::new();
        for (pos, id) in iter {
            patch.insert(pos, id);
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::TileExtent;

    #[test]
    fn patch_from_flood_restores_layer() {
        let mut layer = TileLayer::new("ground", TileExtent::new(3, 3)).unwrap();
        layer.set_tile(TilePos::new(1, 1), TileId(2));
        let before = layer.clone();

        let mut affected = Vec::new();
        layer.flood(TilePos::new(0, 0), TileId(5), Some(&mut affected));
        assert_eq!(affected.len(), 8);

        let patch = TilePatch::from_affected(&affected, TileId::EMPTY);
        assert_eq!(patch.apply(&mut layer), 8);
        assert_eq!(layer, before);
    }

    #[test]
    fn first_recorded_value_wins() {
        let mut patch = TilePatch::new();
        patch.insert(TilePos::new(0, 0), TileId(1));
        patch.insert(TilePos::new(0, 0), TileId(2));
        assert_eq!(patch.get(TilePos::new(0, 0)), Some(TileId(1)));
        assert_eq!(patch.len(), 1);
    }

    #[test]
    fn apply_skips_positions_outside_layer() {
        let mut layer = TileLayer::new("small", TileExtent::new(1, 1)).unwrap();
        let patch: TilePatch = [(TilePos::new(0, 0), TileId(4)), (TilePos::new(3, 3), TileId(4))]
            .into_iter()
            .collect();
        assert_eq!(patch.apply(&mut layer), 1);
        assert_eq!(layer.tile_at(TilePos::new(0, 0)), Some(TileId(4)));
    }
}
