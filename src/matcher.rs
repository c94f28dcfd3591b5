use std::collections::BTreeSet;

use crate::grid::{Grid, Symbol, GRID_SIZE};

pub const MIN_RUN: usize = 3;

/// Result of one scan. A cell in both a row run and a column run appears once
/// in `matched`, but both run lengths are listed in `runs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub matched: BTreeSet<usize>,
    pub runs: Vec<usize>,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

pub fn find_matches(grid: &Grid) -> MatchReport {
    let mut report = MatchReport::default();
    for row in 0..GRID_SIZE {
        scan_line(grid, (0..GRID_SIZE).map(|col| row * GRID_SIZE + col), &mut report);
    }
    for col in 0..GRID_SIZE {
        scan_line(grid, (0..GRID_SIZE).map(|row| row * GRID_SIZE + col), &mut report);
    }
    report
}

pub fn has_matches(grid: &Grid) -> bool {
    !find_matches(grid).is_empty()
}

fn scan_line(grid: &Grid, line: impl Iterator<Item = usize>, report: &mut MatchReport) {
    let mut run: Vec<usize> = Vec::with_capacity(GRID_SIZE);
    let mut current: Option<Symbol> = None;

    for index in line {
        let cell = grid.get(index);
        if cell.is_some() && cell == current {
            run.push(index);
            continue;
        }
        record_run(&run, current, report);
        current = cell;
        run.clear();
        run.push(index);
    }
    record_run(&run, current, report);
}

fn record_run(run: &[usize], symbol: Option<Symbol>, report: &mut MatchReport) {
    if symbol.is_some() && run.len() >= MIN_RUN {
        report.runs.push(run.len());
        report.matched.extend(run.iter().copied());
    }
}
