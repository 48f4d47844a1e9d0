use std::collections::VecDeque;

use tracing::trace;

use crate::error::MapError;

use super::{TileExtent, TileId, TilePos};

/// Dense row-major grid of tile ids, never smaller than 1x1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMatrix {
    extent: TileExtent,
    tiles: Vec<TileId>,
}

impl TileMatrix {
    /// Creates a grid of empty tiles.
    pub fn new(extent: TileExtent) -> Result<Self, MapError> {
        check_extent(extent.rows, extent.cols)?;
        Ok(Self {
            extent,
            tiles: vec![TileId::EMPTY; extent.area()],
        })
    }

    /// Wraps existing row-major data; `data.len()` must equal the extent's area.
    pub fn from_raw(extent: TileExtent, data: Vec<TileId>) -> Result<Self, MapError> {
        check_extent(extent.rows, extent.cols)?;
        if data.len() != extent.area() {
            return Err(MapError::InvalidMap(format!(
                "tile data holds {} cells but extent {} needs {}",
                data.len(),
                extent,
                extent.area()
            )));
        }
        Ok(Self { extent, tiles: data })
    }

    #[inline] pub fn extent(&self) -> TileExtent { self.extent }
    #[inline] pub fn rows(&self) -> usize { self.extent.rows }
    #[inline] pub fn cols(&self) -> usize { self.extent.cols }

    /// Row-major view of every cell.
    #[inline]
    pub fn as_slice(&self) -> &[TileId] {
        &self.tiles
    }

    /// Returns the tile at `pos`, or `None` outside the grid.
    pub fn get(&self, pos: TilePos) -> Option<TileId> {
        self.extent.index_of(pos).map(|i| self.tiles[i])
    }

    /// Writes the tile at `pos`. Returns `false` (and does nothing) outside the grid.
    pub fn set(&mut self, pos: TilePos, id: TileId) -> bool {
        match self.extent.index_of(pos) {
            Some(i) => {
                self.tiles[i] = id;
                true
            }
            None => false,
        }
    }

    /// Iterates every cell with its position, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, TileId)> + '_ {
        let extent = self.extent;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, id)| (extent.pos_of(i), *id))
    }

    /// Appends an empty row at the bottom.
    pub fn add_row(&mut self) {
        self.tiles
            .extend(std::iter::repeat(TileId::EMPTY).take(self.extent.cols));
        self.extent.rows += 1;
    }

    /// Appends an empty column on the right.
    pub fn add_column(&mut self) {
        let cols = self.extent.cols;
        let mut tiles = Vec::with_capacity(self.extent.rows * (cols + 1));
        for row in self.tiles.chunks(cols) {
            tiles.extend_from_slice(row);
            tiles.push(TileId::EMPTY);
        }
        self.tiles = tiles;
        self.extent.cols += 1;
    }

    /// Removes the bottom row. Fails when only one row is left.
    pub fn remove_row(&mut self) -> Result<(), MapError> {
        check_extent(self.extent.rows - 1, self.extent.cols)?;
        self.tiles.truncate((self.extent.rows - 1) * self.extent.cols);
        self.extent.rows -= 1;
        Ok(())
    }

    /// Removes the rightmost column. Fails when only one column is left.
    pub fn remove_column(&mut self) -> Result<(), MapError> {
        check_extent(self.extent.rows, self.extent.cols - 1)?;
        let cols = self.extent.cols;
        let tiles = self
            .tiles
            .chunks(cols)
            .flat_map(|row| row[..cols - 1].iter().copied())
            .collect();
        self.tiles = tiles;
        self.extent.cols -= 1;
        Ok(())
    }

    /// Adds or removes trailing rows and columns until the grid is `rows` x `cols`.
    ///
    /// Both dimensions are validated before anything changes.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), MapError> {
        check_extent(rows, cols)?;
        while self.extent.rows < rows {
            self.add_row();
        }
        while self.extent.rows > rows {
            self.remove_row()?;
        }
        while self.extent.cols < cols {
            self.add_column();
        }
        while self.extent.cols > cols {
            self.remove_column()?;
        }
        Ok(())
    }

    /// Breadth-first 4-connected fill from `origin`.
    ///
    /// Every cell reachable from `origin` through cells holding the origin's
    /// original id is set to `replacement`. Changed positions are appended to
    /// `affected` in visitation order, origin first. Out-of-bounds origins and
    /// origins already holding `replacement` leave everything untouched.
    pub fn flood(
        &mut self,
        origin: TilePos,
        replacement: TileId,
        mut affected: Option<&mut Vec<TilePos>>,
    ) {
        let Some(target) = self.get(origin) else {
            return;
        };
        if target == replacement {
            return;
        }

        let mut changed = 0usize;
        let mut queue = VecDeque::new();
        let mut visit = |matrix: &mut Self, pos: TilePos, queue: &mut VecDeque<TilePos>| {
            if matrix.get(pos) == Some(target) {
                matrix.set(pos, replacement);
                if let Some(out) = affected.as_deref_mut() {
                    out.push(pos);
                }
                changed += 1;
                queue.push_back(pos);
            }
        };

        visit(self, origin, &mut queue);
        while let Some(pos) = queue.pop_front() {
            for next in [pos.west(), pos.east(), pos.south(), pos.north()] {
                visit(self, next, &mut queue);
            }
        }

        trace!(%origin, %target, %replacement, changed, "flood fill");
    }
}

/// Rows and columns must be at least 1, addressable by a [`TilePos`], and
/// their product must fit in a `usize`.
pub(crate) fn check_extent(rows: usize, cols: usize) -> Result<(), MapError> {
    if rows == 0 || cols == 0 {
        return Err(MapError::InvalidExtent { rows, cols });
    }
    let max = i32::MAX as usize;
    if rows > max || cols > max || TileExtent::new(rows, cols).checked_area().is_none() {
        return Err(MapError::ExtentTooLarge { rows, cols });
    }
    Ok(())
}
