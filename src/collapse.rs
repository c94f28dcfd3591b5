use std::collections::BTreeSet;

use rand::Rng;

use crate::grid::{random_symbol, Grid, Symbol, GRID_SIZE};

pub fn clear_cells(grid: &mut Grid, indices: impl IntoIterator<Item = usize>) {
    for index in indices {
        grid.clear(index);
    }
}

/// Drops surviving symbols to the bottom of each column, keeping their order,
/// and refills the vacated top cells. Returns the refilled indices.
pub fn collapse<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> BTreeSet<usize> {
    let mut filled = BTreeSet::new();

    for col in 0..GRID_SIZE {
        // bottom-up
        let survivors: Vec<Symbol> = (0..GRID_SIZE)
            .rev()
            .filter_map(|row| grid.at(row, col))
            .collect();
        let mut survivors = survivors.into_iter();

        for row in (0..GRID_SIZE).rev() {
            let index = row * GRID_SIZE + col;
            match survivors.next() {
                Some(symbol) => grid.set(index, Some(symbol)),
                None => {
                    grid.set(index, Some(random_symbol(rng)));
                    filled.insert(index);
                }
            }
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::fixtures::quiet_grid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn column(grid: &Grid, col: usize) -> Vec<Option<Symbol>> {
        (0..GRID_SIZE).map(|row| grid.at(row, col)).collect()
    }

    #[test]
    fn untouched_grid_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut grid = quiet_grid();
        let filled = collapse(&mut grid, &mut rng);
        assert!(filled.is_empty());
        assert_eq!(grid, quiet_grid());
    }

    #[test]
    fn survivors_keep_their_vertical_order() {
        let mut rng = StdRng::seed_from_u64(2);
        let original = quiet_grid();
        let mut grid = original.clone();
        // holes in column 1 at rows 1 and 3
        clear_cells(&mut grid, [6, 16]);

        let filled = collapse(&mut grid, &mut rng);

        assert_eq!(filled, BTreeSet::from([1, 6]));
        let before = column(&original, 1);
        let after = column(&grid, 1);
        assert_eq!(after[2..], [before[0], before[2], before[4]]);
        assert!(grid.is_full());
    }

    #[test]
    fn clearing_top_row_refills_only_the_top_row() {
        let mut rng = StdRng::seed_from_u64(3);
        let original = quiet_grid();
        let mut grid = original.clone();
        clear_cells(&mut grid, [0, 1, 2]);

        let filled = collapse(&mut grid, &mut rng);

        assert_eq!(filled, BTreeSet::from([0, 1, 2]));
        for index in 3..25 {
            assert_eq!(grid.get(index), original.get(index));
        }
    }

    #[test]
    fn column_with_every_cell_cleared_is_refilled_from_scratch() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut grid = quiet_grid();
        clear_cells(&mut grid, [3, 8, 13, 18, 23]);

        let filled = collapse(&mut grid, &mut rng);

        assert_eq!(filled, BTreeSet::from([3, 8, 13, 18, 23]));
        assert!(grid.is_full());
    }
}
