use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use crate::error::MapError;
use crate::meta::Metadata;
use crate::spatial::TileId;

/// An image atlas cut into a regular grid of tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    meta: Metadata,
    pub image_path: PathBuf,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: i32,
    pub column_count: i32,
}

impl Tileset {
    pub fn new(
        name: impl Into<String>,
        image_path: impl Into<PathBuf>,
        tile_width: u32,
        tile_height: u32,
        tile_count: i32,
        column_count: i32,
    ) -> Self {
        Self {
            meta: Metadata::new(name),
            image_path: image_path.into(),
            tile_width,
            tile_height,
            tile_count,
            column_count,
        }
    }

    #[inline] pub fn uuid(&self) -> Uuid { self.meta.uuid() }
    #[inline] pub fn meta(&self) -> &Metadata { &self.meta }
    #[inline] pub fn meta_mut(&mut self) -> &mut Metadata { &mut self.meta }
    #[inline] pub fn name(&self) -> &str { self.meta.name() }

    #[inline]
    pub fn row_count(&self) -> i32 {
        if self.column_count > 0 {
            (self.tile_count + self.column_count - 1) / self.column_count
        } else {
            0
        }
    }
}

/// An attached tileset together with the global tile ids it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    tileset: Tileset,
    first_tile: TileId,
    last_tile: TileId,
}

impl TilesetRef {
    #[inline] pub fn tileset(&self) -> &Tileset { &self.tileset }
    #[inline] pub fn tileset_mut(&mut self) -> &mut Tileset { &mut self.tileset }
    #[inline] pub fn first_tile(&self) -> TileId { self.first_tile }
    #[inline] pub fn last_tile(&self) -> TileId { self.last_tile }

    #[inline]
    pub fn contains(&self, id: TileId) -> bool {
        id >= self.first_tile && id <= self.last_tile
    }

    /// Index of a global tile id within this tileset.
    pub fn to_index(&self, id: TileId) -> Option<i32> {
        self.contains(id).then(|| id.raw() - self.first_tile.raw())
    }

    fn overlaps(&self, first: TileId, last: TileId) -> bool {
        first <= self.last_tile && self.first_tile <= last
    }
}

/// Tilesets attached to a map, each owning a contiguous range of global tile ids.
///
/// Ranges are handed out in attachment order starting at 1 and are never
/// reused, so detaching a tileset leaves a gap that invalidates its tiles.
#[derive(Debug, Clone)]
pub struct TilesetBundle {
    refs: BTreeMap<Uuid, TilesetRef>,
    next_tile_id: i32,
    active: Option<Uuid>,
}

impl Default for TilesetBundle {
    fn default() -> Self {
        Self {
            refs: BTreeMap::new(),
            next_tile_id: 1,
            active: None,
        }
    }
}

impl TilesetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a tileset at the next free tile id and returns its first id.
    /// The first tileset attached becomes the active one.
    pub fn attach(&mut self, tileset: Tileset) -> Result<TileId, MapError> {
        let first = TileId(self.next_tile_id);
        self.attach_at(tileset, first)?;
        Ok(first)
    }

    /// Attaches a tileset with a fixed first tile id, as when restoring a
    /// detached tileset or loading a document.
    pub fn attach_at(&mut self, tileset: Tileset, first: TileId) -> Result<(), MapError> {
        let uuid = tileset.uuid();
        if self.refs.contains_key(&uuid) {
            return Err(MapError::InvalidMap(format!("tileset {uuid} is already attached")));
        }
        if tileset.tile_count < 1 || first.raw() < 1 {
            return Err(MapError::InvalidMap(format!(
                "tileset '{}' needs at least one tile and a positive first id",
                tileset.name()
            )));
        }
        // The id after the range must stay representable for `next_tile_id`.
        let end = first.raw().checked_add(tileset.tile_count).ok_or_else(|| {
            MapError::InvalidMap(format!(
                "tileset '{}' with {} tiles does not fit after tile id {first}",
                tileset.name(),
                tileset.tile_count
            ))
        })?;
        let last = TileId(end - 1);
        if self.refs.values().any(|r| r.overlaps(first, last)) {
            return Err(MapError::TileRangeOverlap { first: first.raw() });
        }

        debug!(tileset = %uuid, %first, %last, "attached tileset");
        self.next_tile_id = self.next_tile_id.max(end);
        self.refs.insert(
            uuid,
            TilesetRef {
                tileset,
                first_tile: first,
                last_tile: last,
            },
        );
        if self.active.is_none() {
            self.active = Some(uuid);
        }
        Ok(())
    }

    /// Detaches a tileset, returning it with its id range.
    pub fn detach(&mut self, uuid: Uuid) -> Option<TilesetRef> {
        let removed = self.refs.remove(&uuid)?;
        if self.active == Some(uuid) {
            self.active = self.refs.keys().next().copied();
        }
        debug!(tileset = %uuid, "detached tileset");
        Some(removed)
    }

    pub fn find(&self, uuid: Uuid) -> Option<&TilesetRef> {
        self.refs.get(&uuid)
    }

    pub fn find_mut(&mut self, uuid: Uuid) -> Option<&mut TilesetRef> {
        self.refs.get_mut(&uuid)
    }

    /// The tileset owning `id` and the tile's index inside it.
    pub fn find_ref_for_tile(&self, id: TileId) -> Option<(&TilesetRef, i32)> {
        self.refs
            .values()
            .find_map(|r| r.to_index(id).map(|index| (r, index)))
    }

    /// Whether some attached tileset owns `id`. The empty tile is never valid.
    pub fn is_valid_tile(&self, id: TileId) -> bool {
        self.refs.values().any(|r| r.contains(id))
    }

    /// Largest tile id owned by any attached tileset.
    pub fn max_tile_id(&self) -> Option<TileId> {
        self.refs.values().map(|r| r.last_tile).max()
    }

    #[inline]
    pub fn next_tile_id(&self) -> TileId {
        TileId(self.next_tile_id)
    }

    pub fn select(&mut self, uuid: Uuid) -> Result<(), MapError> {
        if !self.refs.contains_key(&uuid) {
            return Err(MapError::TilesetNotFound(uuid));
        }
        self.active = Some(uuid);
        Ok(())
    }

    #[inline]
    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    pub fn active_tileset(&self) -> Option<&TilesetRef> {
        self.active.and_then(|id| self.refs.get(&id))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Attached tilesets ordered by first tile id.
    pub fn iter(&self) -> impl Iterator<Item = &TilesetRef> {
        let mut refs: Vec<_> = self.refs.values().collect();
        refs.sort_by_key(|r| r.first_tile);
        refs.into_iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TilesetRef> {
        self.refs.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tileset(count: i32) -> Tileset {
        Tileset::new("terrain", "terrain.png", 16, 16, count, 4)
    }

    #[test]
    fn ranges_past_the_largest_id_are_rejected() {
        let mut bundle = TilesetBundle::new();
        assert!(matches!(
            bundle.attach_at(tileset(5), TileId(i32::MAX)),
            Err(MapError::InvalidMap(_))
        ));
        assert!(bundle.is_empty());

        bundle.attach_at(tileset(1), TileId(i32::MAX - 1)).unwrap();
        assert_eq!(bundle.next_tile_id(), TileId(i32::MAX));
        assert!(matches!(bundle.attach(tileset(1)), Err(MapError::InvalidMap(_))));
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn ranges_are_contiguous_from_one() {
        let mut bundle = TilesetBundle::new();
        let a = tileset(8);
        let b = tileset(4);
        let (a_id, b_id) = (a.uuid(), b.uuid());

        assert_eq!(bundle.attach(a).unwrap(), TileId(1));
        assert_eq!(bundle.attach(b).unwrap(), TileId(9));
        assert_eq!(bundle.next_tile_id(), TileId(13));
        assert_eq!(bundle.active(), Some(a_id));

        let (found, index) = bundle.find_ref_for_tile(TileId(10)).unwrap();
        assert_eq!(found.tileset().uuid(), b_id);
        assert_eq!(index, 1);
        assert!(bundle.is_valid_tile(TileId(12)));
        assert!(!bundle.is_valid_tile(TileId(13)));
        assert!(!bundle.is_valid_tile(TileId::EMPTY));
    }

    #[test]
    fn detach_and_restore_keep_range() {
        let mut bundle = TilesetBundle::new();
        let a = tileset(8);
        let id = a.uuid();
        bundle.attach(a).unwrap();

        let removed = bundle.detach(id).unwrap();
        assert!(!bundle.is_valid_tile(TileId(3)));
        assert_eq!(bundle.active(), None);
        assert_eq!(bundle.next_tile_id(), TileId(9));

        let first = removed.first_tile();
        bundle.attach_at(removed.tileset().clone(), first).unwrap();
        assert!(bundle.is_valid_tile(TileId(3)));
    }

    #[test]
    fn overlapping_range_is_rejected() {
        let mut bundle = TilesetBundle::new();
        bundle.attach(tileset(8)).unwrap();
        assert!(matches!(
            bundle.attach_at(tileset(2), TileId(8)),
            Err(MapError::TileRangeOverlap { first: 8 })
        ));
        assert!(bundle.attach_at(tileset(0), TileId(20)).is_err());
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn select_requires_attached_tileset() {
        let mut bundle = TilesetBundle::new();
        assert!(bundle.select(Uuid::new_v4()).is_err());
        let a = tileset(1);
        let b = tileset(1);
        let b_id = b.uuid();
        bundle.attach(a).unwrap();
        bundle.attach(b).unwrap();
        bundle.select(b_id).unwrap();
        assert_eq!(bundle.active_tileset().unwrap().tileset().uuid(), b_id);
    }
}
