use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use boat_match3_protocol::{GameState, Status, UpgradeKind};

use crate::matcher::MatchReport;

pub const CHOICES_OFFERED: usize = 3;

/// Pre-multiplier points for one run.
pub fn run_points(length: usize) -> u32 {
    match length {
        0..=2 => 0,
        3 => 10,
        4 => 20,
        _ => 50,
    }
}

/// Points for a whole pass. Every run counts, including two runs that share a cell.
pub fn pass_points(runs: &[usize], multiplier: f64) -> u32 {
    let points: u32 = runs.iter().map(|&length| run_points(length)).sum();
    if points > 0 && multiplier > 1.0 {
        (points as f64 * multiplier).round() as u32
    } else {
        points
    }
}

/// Score thresholds that open an upgrade offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub first: u32,
    /// Ascending. These also drive the progress bar.
    pub further: Vec<u32>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            first: 20,
            further: vec![250, 750, 2000],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub segment_start: u32,
    pub segment_end: u32,
    pub percent: f64,
}

impl Thresholds {
    pub fn all(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.first).chain(self.further.iter().copied())
    }

    /// True if going from `before` to `after` reaches a threshold from below.
    pub fn crossed(&self, before: u32, after: u32) -> bool {
        self.all().any(|t| before < t && after >= t)
    }

    /// Where `score` sits between the surrounding thresholds. Past the last one
    /// the bar stays full.
    pub fn progress(&self, score: u32) -> Progress {
        let (segment_start, segment_end) = match self.further.iter().position(|&t| score < t) {
            Some(0) => (0, self.further[0]),
            Some(i) => (self.further[i - 1], self.further[i]),
            None => match self.further.last() {
                Some(&last) => (last, last),
                None => (0, self.first),
            },
        };
        let size = segment_end.saturating_sub(segment_start).max(1);
        let into = score.saturating_sub(segment_start).min(size);
        Progress {
            segment_start,
            segment_end,
            percent: into as f64 / size as f64 * 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drops {
    pub bomb: bool,
    pub crystal: bool,
}

/// One independent draw per kind.
pub fn roll_drops<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Drops {
    Drops {
        bomb: rng.gen::<f64>() < state.bomb_drop_chance,
        crystal: rng.gen::<f64>() < state.crystal_drop_chance,
    }
}

pub fn sample_upgrade_choices<R: Rng + ?Sized>(rng: &mut R) -> Vec<UpgradeKind> {
    let mut pool = UpgradeKind::ALL.to_vec();
    pool.shuffle(rng);
    pool.truncate(CHOICES_OFFERED);
    pool
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    pub points: u32,
    pub drops: Drops,
    pub upgrade_offered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    pub thresholds: Thresholds,
}

impl ScoreEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Scores one cascade pass: drops first, then points and the threshold check.
    pub fn apply_pass<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        report: &MatchReport,
        rng: &mut R,
    ) -> PassOutcome {
        let drops = roll_drops(state, rng);
        if drops.bomb {
            state.bombs += 1;
        }
        if drops.crystal {
            state.crystals += 1;
        }
        let points = pass_points(&report.runs, state.score_multiplier);
        let upgrade_offered = self.add_points(state, points, rng);
        PassOutcome {
            points,
            drops,
            upgrade_offered,
        }
    }

    /// Returns `true` if this opened an upgrade offer.
    pub fn add_points<R: Rng + ?Sized>(&self, state: &mut GameState, points: u32, rng: &mut R) -> bool {
        if points == 0 {
            return false;
        }
        let before = state.score;
        let after = before.saturating_add(points);
        state.score = after;

        if state.awaiting_upgrade() || !self.thresholds.crossed(before, after) {
            return false;
        }
        state.upgrade_pending = true;
        state.upgrade_choices = sample_upgrade_choices(rng);
        if state.status == Status::Active {
            state.status = Status::Upgrade;
        }
        debug!(before, after, choices = ?state.upgrade_choices, "upgrade offered");
        true
    }
}
