use std::fmt;

/// Global tile identifier. `0` is the empty tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub i32);

impl TileId {
    /// The reserved "no tile" value.
    pub const EMPTY: TileId = TileId(0);

    #[inline] pub fn raw(self) -> i32 { self.0 }
    #[inline] pub fn is_empty(self) -> bool { self == Self::EMPTY }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row/column position in a tile grid. Signed so neighbours of edge cells can be
/// expressed and then rejected by bounds checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    pub row: i32,
    pub col: i32,
}

impl TilePos {
    #[inline]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    #[inline] pub fn north(self) -> Self { Self::new(self.row - 1, self.col) }
    #[inline] pub fn south(self) -> Self { Self::new(self.row + 1, self.col) }
    #[inline] pub fn west(self) -> Self { Self::new(self.row, self.col - 1) }
    #[inline] pub fn east(self) -> Self { Self::new(self.row, self.col + 1) }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Size of a tile grid in rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileExtent {
    pub rows: usize,
    pub cols: usize,
}

impl TileExtent {
    #[inline]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells, saturating at `usize::MAX`.
    #[inline]
    pub fn area(self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Number of cells, or `None` if it does not fit in a `usize`.
    #[inline]
    pub fn checked_area(self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Whether `pos` addresses a cell inside the grid.
    #[inline]
    pub fn contains(self, pos: TilePos) -> bool {
        pos.row >= 0
            && pos.col >= 0
            && (pos.row as usize) < self.rows
            && (pos.col as usize) < self.cols
    }

    /// Row-major index of `pos`, if it lies inside the grid.
    #[inline]
    pub fn index_of(self, pos: TilePos) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.row as usize * self.cols + pos.col as usize)
    }

    /// Position of a row-major index.
    #[inline]
    pub fn pos_of(self, index: usize) -> TilePos {
        TilePos::new((index / self.cols) as i32, (index % self.cols) as i32)
    }
}

impl fmt::Display for TileExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}
