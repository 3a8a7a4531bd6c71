//! Grid data types.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Moore neighborhood offsets: N, S, W, E, NW, NE, SW, SE.
const OFFSETS_8: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Population group of an occupied cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    A,
    B,
    C,
}

impl Group {
    /// Category code of the group (empty cells use 0).
    pub fn code(self) -> u8 {
        match self {
            Group::A => 1,
            Group::B => 2,
            Group::C => 3,
        }
    }
}

/// Cell coordinate.
///
/// Ordering is row-major, so ordered sets of positions iterate the grid
/// the same way a full scan does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Agent of the simulation: an occupied cell and its group.
///
/// Not stored anywhere, always derived from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    pub pos: Position,
    pub group: Group,
}

/// Square grid of cells with absorbing borders.
///
/// `None` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Group>>,
}

impl Grid {
    /// Create an empty `size x size` grid.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Build a grid from a flat row-major sequence of `size * size` cells.
    pub fn from_cells(size: usize, cells: Vec<Option<Group>>) -> Result<Self> {
        if cells.len() != size * size {
            bail!("{} cells do not fill a {size}x{size} grid", cells.len());
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, pos: Position) -> Option<Group> {
        self.cells[self.index(pos)]
    }

    pub fn set(&mut self, pos: Position, cell: Option<Group>) {
        let index = self.index(pos);
        self.cells[index] = cell;
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let size = self.size;
        (0..size * size).map(move |idx| Position::new(idx / size, idx % size))
    }

    /// In-bounds Moore neighbors of `pos`.
    ///
    /// Corners have 3, border cells 5 and interior cells 8.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + use<> {
        let size = self.size;
        OFFSETS_8.into_iter().filter_map(move |(dr, dc)| {
            let row = pos.row.checked_add_signed(dr).filter(|&r| r < size)?;
            let col = pos.col.checked_add_signed(dc).filter(|&c| c < size)?;
            Some(Position::new(row, col))
        })
    }

    /// `pos` together with its in-bounds Moore neighbors.
    pub fn block(&self, pos: Position) -> impl Iterator<Item = Position> + use<> {
        std::iter::once(pos).chain(self.neighbors(pos))
    }

    /// Number of cells holding `cell`.
    pub fn count(&self, cell: Option<Group>) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    /// Matrix of category codes (0 empty, 1..=3 groups).
    pub fn to_codes(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.size.max(1))
            .map(|row| row.iter().map(|c| c.map_or(0, Group::code)).collect())
            .collect()
    }

    fn index(&self, pos: Position) -> usize {
        debug_assert!(pos.row < self.size && pos.col < self.size);
        pos.row * self.size + pos.col
    }
}
