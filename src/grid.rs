use rand::Rng;

pub use boat_match3_protocol::{Grid, Symbol, CELL_COUNT, GRID_SIZE};

pub fn random_symbol<R: Rng + ?Sized>(rng: &mut R) -> Symbol {
    Symbol::ALL[rng.gen_range(0..Symbol::ALL.len())]
}

/// A completely random board; it may contain runs until it is resolved.
pub fn random_grid<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    let mut grid = Grid::empty();
    for index in 0..CELL_COUNT {
        grid.set(index, Some(random_symbol(rng)));
    }
    grid
}
