use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GRID_SIZE: usize = 5;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// The five tile symbols. They travel over the wire as the emoji themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "⛵")]
    Boat,
    #[serde(rename = "☀️")]
    Sun,
    #[serde(rename = "🏖️")]
    Beach,
    #[serde(rename = "🍺")]
    Beer,
    #[serde(rename = "😊")]
    Smile,
}

impl Symbol {
    pub const ALL: [Symbol; 5] = [
        Symbol::Boat,
        Symbol::Sun,
        Symbol::Beach,
        Symbol::Beer,
        Symbol::Smile,
    ];

    pub fn emoji(&self) -> &'static str {
        match self {
            Symbol::Boat => "⛵",
            Symbol::Sun => "☀️",
            Symbol::Beach => "🏖️",
            Symbol::Beer => "🍺",
            Symbol::Smile => "😊",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid must have {expected} cells, got {found}")]
    WrongLength { expected: usize, found: usize },
}

/// Row-major 5x5 board. A cell is `None` only while a clear is in progress.
///
/// All accessors are bounds-safe: out-of-range indices read as empty and
/// writes to them are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Option<Symbol>>", into = "Vec<Option<Symbol>>")]
pub struct Grid {
    cells: [Option<Symbol>; CELL_COUNT],
}

impl Grid {
    pub fn empty() -> Self {
        Self {
            cells: [None; CELL_COUNT],
        }
    }

    pub fn from_rows(rows: [[Symbol; GRID_SIZE]; GRID_SIZE]) -> Self {
        let mut grid = Self::empty();
        for (row, symbols) in rows.iter().enumerate() {
            for (col, symbol) in symbols.iter().enumerate() {
                grid.cells[row * GRID_SIZE + col] = Some(*symbol);
            }
        }
        grid
    }

    pub fn index(row: usize, col: usize) -> Option<usize> {
        if row < GRID_SIZE && col < GRID_SIZE {
            Some(row * GRID_SIZE + col)
        } else {
            None
        }
    }

    pub fn position(index: usize) -> Option<(usize, usize)> {
        if index < CELL_COUNT {
            Some((index / GRID_SIZE, index % GRID_SIZE))
        } else {
            None
        }
    }

    /// The cell one step away from `index`, or `None` when that leaves the board.
    pub fn offset(index: usize, d_row: isize, d_col: isize) -> Option<usize> {
        let (row, col) = Self::position(index)?;
        let row = row.checked_add_signed(d_row)?;
        let col = col.checked_add_signed(d_col)?;
        Self::index(row, col)
    }

    /// Orthogonal neighbours in up, down, left, right order.
    pub fn neighbors(index: usize) -> Vec<usize> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .filter_map(|(d_row, d_col)| Self::offset(index, d_row, d_col))
            .collect()
    }

    pub fn are_adjacent(a: usize, b: usize) -> bool {
        match (Self::position(a), Self::position(b)) {
            (Some((r1, c1)), Some((r2, c2))) => r1.abs_diff(r2) + c1.abs_diff(c2) == 1,
            _ => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<Symbol> {
        self.cells.get(index).copied().flatten()
    }

    pub fn at(&self, row: usize, col: usize) -> Option<Symbol> {
        Self::index(row, col).and_then(|index| self.get(index))
    }

    pub fn set(&mut self, index: usize, cell: Option<Symbol>) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    pub fn clear(&mut self, index: usize) {
        self.set(index, None);
    }

    /// Swaps two cells. Returns `false` and leaves the grid untouched if either
    /// index is out of range.
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= CELL_COUNT || b >= CELL_COUNT {
            return false;
        }
        self.cells.swap(a, b);
        true
    }

    pub fn cells(&self) -> &[Option<Symbol>] {
        &self.cells
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn indices_of(&self, symbol: Symbol) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Some(symbol))
            .map(|(index, _)| index)
            .collect()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<Vec<Option<Symbol>>> for Grid {
    type Error = GridError;

    fn try_from(cells: Vec<Option<Symbol>>) -> Result<Self, Self::Error> {
        let found = cells.len();
        let cells: [Option<Symbol>; CELL_COUNT] =
            cells.try_into().map_err(|_| GridError::WrongLength {
                expected: CELL_COUNT,
                found,
            })?;
        Ok(Self { cells })
    }
}

impl From<Grid> for Vec<Option<Symbol>> {
    fn from(grid: Grid) -> Self {
        grid.cells.to_vec()
    }
}
