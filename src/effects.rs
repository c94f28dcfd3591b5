use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use boat_match3_protocol::GameState;

use crate::grid::{Grid, CELL_COUNT};
use crate::timer::Delay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialTile {
    Bomb,
    Crystal,
}

impl SpecialTile {
    pub fn stock(self, state: &GameState) -> u32 {
        match self {
            SpecialTile::Bomb => state.bombs,
            SpecialTile::Crystal => state.crystals,
        }
    }

    pub(crate) fn stock_mut(self, state: &mut GameState) -> &mut u32 {
        match self {
            SpecialTile::Bomb => &mut state.bombs,
            SpecialTile::Crystal => &mut state.crystals,
        }
    }
}

/// Target plus its orthogonal neighbours that exist.
pub fn bomb_area(index: usize) -> BTreeSet<usize> {
    if index >= CELL_COUNT {
        return BTreeSet::new();
    }
    let mut cells: BTreeSet<usize> = Grid::neighbors(index).into_iter().collect();
    cells.insert(index);
    cells
}

/// Every cell holding the target's symbol. Empty if the target is empty.
pub fn crystal_area(grid: &Grid, index: usize) -> BTreeSet<usize> {
    match grid.get(index) {
        Some(symbol) => grid.indices_of(symbol).into_iter().collect(),
        None => BTreeSet::new(),
    }
}

pub fn affected_cells(kind: SpecialTile, grid: &Grid, index: usize) -> BTreeSet<usize> {
    match kind {
        SpecialTile::Bomb => bomb_area(index),
        SpecialTile::Crystal => crystal_area(grid, index),
    }
}

/// The explosion highlight shown before the resolved board is swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectPreview {
    pub kind: SpecialTile,
    pub target: usize,
    pub cells: BTreeSet<usize>,
    delay: Delay,
}

impl EffectPreview {
    pub fn new(kind: SpecialTile, grid: &Grid, target: usize, duration: Duration) -> Self {
        Self {
            kind,
            target,
            cells: affected_cells(kind, grid, target),
            delay: Delay::new(duration),
        }
    }

    /// Returns `true` once the preview window has passed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.delay.advance(dt).is_some()
    }
}
