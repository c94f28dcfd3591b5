//! Authoritative session rules. The server applies every accepted action
//! through these, and the engine uses them directly when playing offline.
//!
//! Every operation validates before it mutates, so a rejected action leaves
//! the state exactly as it was.

use rand::Rng;
use tracing::debug;

use boat_match3_protocol::{GameState, Status, UpgradeKind, UpgradeTier};

use crate::cascade::{resolve_immediate, resolve_pass};
use crate::collapse::{clear_cells, collapse};
use crate::config::RulesConfig;
use crate::effects::{affected_cells, SpecialTile};
use crate::error::RuleError;
use crate::grid::{random_grid, Grid, CELL_COUNT};
use crate::score::{PassOutcome, ScoreEngine};
use crate::upgrade;

#[derive(Debug, Clone)]
pub struct Rules {
    config: RulesConfig,
    scoring: ScoreEngine,
}

impl Default for Rules {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

impl Rules {
    pub fn new(config: RulesConfig) -> Self {
        Self {
            scoring: ScoreEngine::new(config.thresholds.clone()),
            config,
        }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn scoring(&self) -> &ScoreEngine {
        &self.scoring
    }

    /// A stable board with everything else at its starting value.
    pub fn new_session<R: Rng + ?Sized>(&self, start: bool, rng: &mut R) -> GameState {
        GameState {
            grid: fresh_grid(rng),
            score: 0,
            time_left: self.config.game_duration,
            status: if start { Status::Active } else { Status::Ready },
            bombs: 0,
            crystals: 0,
            bomb_drop_chance: 0.0,
            crystal_drop_chance: 0.0,
            score_multiplier: 1.0,
            refresh_base: self.config.refresh_base,
            upgrade_pending: false,
            upgrade_tier: -1,
            upgrade_choices: Vec::new(),
        }
    }

    /// Handles a session request. The current session is kept unless a reset
    /// is asked for, or a start is asked for and the session is not in play.
    pub fn open_session<R: Rng + ?Sized>(
        &self,
        current: Option<GameState>,
        start: bool,
        reset: bool,
        rng: &mut R,
    ) -> GameState {
        match current {
            Some(state)
                if !reset
                    && !(start && !matches!(state.status, Status::Active | Status::Upgrade)) =>
            {
                state
            }
            _ => self.new_session(start, rng),
        }
    }

    fn ensure_playing(state: &GameState) -> Result<(), RuleError> {
        if state.awaiting_upgrade() {
            return Err(RuleError::UpgradePending);
        }
        if state.status != Status::Active || state.time_left == 0 {
            return Err(RuleError::NotActive(state.status));
        }
        Ok(())
    }

    pub fn check_swap(&self, state: &GameState, from: usize, to: usize) -> Result<(), RuleError> {
        Self::ensure_playing(state)?;
        for index in [from, to] {
            if index >= CELL_COUNT {
                return Err(RuleError::OutOfBounds(index));
            }
        }
        if !Grid::are_adjacent(from, to) {
            return Err(RuleError::NotAdjacent { from, to });
        }
        Ok(())
    }

    /// Swaps and resolves every chained pass. A swap that matches nothing still
    /// stands and yields no passes.
    pub fn apply_move<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        from: usize,
        to: usize,
        rng: &mut R,
    ) -> Result<Vec<PassOutcome>, RuleError> {
        self.check_swap(state, from, to)?;
        state.grid.swap(from, to);
        Ok(self.resolve(state, rng))
    }

    /// Clears matches until the board is stable, scoring every pass.
    pub fn resolve<R: Rng + ?Sized>(&self, state: &mut GameState, rng: &mut R) -> Vec<PassOutcome> {
        let mut outcomes = Vec::new();
        while let Some(report) = resolve_pass(&mut state.grid, rng) {
            outcomes.push(self.scoring.apply_pass(state, &report, rng));
        }
        if !outcomes.is_empty() {
            debug!(passes = outcomes.len(), score = state.score, "board resolved");
        }
        outcomes
    }

    pub fn check_special(
        &self,
        state: &GameState,
        kind: SpecialTile,
        index: usize,
    ) -> Result<(), RuleError> {
        Self::ensure_playing(state)?;
        if index >= CELL_COUNT {
            return Err(RuleError::OutOfBounds(index));
        }
        if kind.stock(state) == 0 {
            return Err(RuleError::OutOfStock(kind));
        }
        Ok(())
    }

    /// Uses one bomb or crystal on `index`. The blast itself scores nothing;
    /// matches formed by the refill are scored as usual.
    pub fn apply_special<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        kind: SpecialTile,
        index: usize,
        rng: &mut R,
    ) -> Result<Vec<PassOutcome>, RuleError> {
        self.check_special(state, kind, index)?;
        *kind.stock_mut(state) -= 1;

        let cells = affected_cells(kind, &state.grid, index);
        debug!(?kind, index, cleared = cells.len(), "special tile used");
        clear_cells(&mut state.grid, cells);
        collapse(&mut state.grid, rng);
        Ok(self.resolve(state, rng))
    }

    pub fn apply_bomb<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        index: usize,
        rng: &mut R,
    ) -> Result<Vec<PassOutcome>, RuleError> {
        self.apply_special(state, SpecialTile::Bomb, index, rng)
    }

    pub fn apply_crystal<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        index: usize,
        rng: &mut R,
    ) -> Result<Vec<PassOutcome>, RuleError> {
        self.apply_special(state, SpecialTile::Crystal, index, rng)
    }

    pub fn choose_upgrade(
        &self,
        state: &mut GameState,
        choice: UpgradeKind,
    ) -> Result<UpgradeTier, RuleError> {
        upgrade::accept(state, choice)
    }

    /// Replaces the board with a new stable one.
    pub fn refresh<R: Rng + ?Sized>(&self, state: &mut GameState, rng: &mut R) -> Result<(), RuleError> {
        Self::ensure_playing(state)?;
        state.grid = fresh_grid(rng);
        Ok(())
    }

    /// Runs the clock down by `seconds`. Returns `true` when this tick ended the session.
    pub fn tick(&self, state: &mut GameState, seconds: u32) -> bool {
        if !state.is_playing() {
            return false;
        }
        state.time_left = state.time_left.saturating_sub(seconds);
        if state.time_left == 0 {
            state.status = Status::Ended;
            return true;
        }
        false
    }

    pub fn end(&self, state: &mut GameState) -> u32 {
        state.status = Status::Ended;
        state.upgrade_pending = false;
        state.upgrade_choices.clear();
        state.score
    }
}

fn fresh_grid<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    let mut grid = random_grid(rng);
    resolve_immediate(&mut grid, rng);
    grid
}
