use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;

use crate::collapse::{clear_cells, collapse};
use crate::grid::Grid;
use crate::matcher::{find_matches, MatchReport};
use crate::timer::Delay;

/// One clear/collapse pass. Returns the matches that were cleared, or `None`
/// when the grid is already stable.
pub fn resolve_pass<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Option<MatchReport> {
    let report = find_matches(grid);
    if report.is_empty() {
        return None;
    }
    clear_cells(grid, report.matched.iter().copied());
    collapse(grid, rng);
    Some(report)
}

/// Resolves every chained pass with no delay. Used to build fresh boards.
pub fn resolve_immediate<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Vec<MatchReport> {
    let mut passes = Vec::new();
    while let Some(report) = resolve_pass(grid, rng) {
        passes.push(report);
    }
    passes
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CascadePhase {
    #[default]
    Idle,
    /// Matched cells are highlighted; they are still on the grid.
    Clearing { cells: BTreeSet<usize>, delay: Delay },
    /// Refilled cells are falling in.
    Falling { cells: BTreeSet<usize>, delay: Delay },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    Collapsed { filled: BTreeSet<usize> },
    /// The settled board had further matches; a new pass has started.
    Chained(MatchReport),
    Settled,
}

/// Plays cascades as `clearing -> falling -> idle`, one pass at a time.
#[derive(Debug, Clone)]
pub struct CascadeAnimator {
    phase: CascadePhase,
    clear_delay: Duration,
    settle_delay: Duration,
}

impl CascadeAnimator {
    pub fn new(clear_delay: Duration, settle_delay: Duration) -> Self {
        Self {
            phase: CascadePhase::Idle,
            clear_delay,
            settle_delay,
        }
    }

    pub fn phase(&self) -> &CascadePhase {
        &self.phase
    }

    pub fn is_animating(&self) -> bool {
        self.phase != CascadePhase::Idle
    }

    pub fn clearing(&self) -> Option<&BTreeSet<usize>> {
        match &self.phase {
            CascadePhase::Clearing { cells, .. } => Some(cells),
            _ => None,
        }
    }

    pub fn falling(&self) -> Option<&BTreeSet<usize>> {
        match &self.phase {
            CascadePhase::Falling { cells, .. } => Some(cells),
            _ => None,
        }
    }

    /// Begins a pass if the grid has matches and nothing is animating. The
    /// returned report is what the caller scores for this pass.
    pub fn start(&mut self, grid: &Grid) -> Option<MatchReport> {
        if self.is_animating() {
            return None;
        }
        let report = find_matches(grid);
        if report.is_empty() {
            return None;
        }
        self.phase = CascadePhase::Clearing {
            cells: report.matched.clone(),
            delay: Delay::new(self.clear_delay),
        };
        Some(report)
    }

    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        dt: Duration,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Vec<CascadeStep> {
        let mut steps = Vec::new();
        let mut budget = dt;

        loop {
            match &mut self.phase {
                CascadePhase::Idle => break,
                CascadePhase::Clearing { cells, delay } => {
                    let Some(leftover) = delay.advance(budget) else {
                        break;
                    };
                    budget = leftover;
                    let cells = std::mem::take(cells);
                    clear_cells(grid, cells);
                    let filled = collapse(grid, rng);
                    self.phase = CascadePhase::Falling {
                        cells: filled.clone(),
                        delay: Delay::new(self.settle_delay),
                    };
                    steps.push(CascadeStep::Collapsed { filled });
                }
                CascadePhase::Falling { delay, .. } => {
                    let Some(leftover) = delay.advance(budget) else {
                        break;
                    };
                    budget = leftover;
                    self.phase = CascadePhase::Idle;
                    match self.start(grid) {
                        Some(report) => steps.push(CascadeStep::Chained(report)),
                        None => {
                            steps.push(CascadeStep::Settled);
                            break;
                        }
                    }
                }
            }
        }

        steps
    }

    pub fn cancel(&mut self) {
        self.phase = CascadePhase::Idle;
    }
}
