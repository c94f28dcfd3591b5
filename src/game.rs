use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use boat_match3_protocol::{EndSummary, GameState, Status, UpgradeKind};

use crate::cascade::{CascadeAnimator, CascadeStep};
use crate::collapse::{clear_cells, collapse};
use crate::config::EngineConfig;
use crate::effects::{EffectPreview, SpecialTile};
use crate::error::SyncError;
use crate::input::{InputController, Intent, PointerEvent};
use crate::matcher::MatchReport;
use crate::rules::Rules;
use crate::score::Progress;
use crate::sync::{Completion, Proposal, SessionLink, SessionSync};
use crate::timer::{Delay, TimerController};
use crate::upgrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// Practice play: the engine applies its own rules.
    Offline,
    /// Every action goes through the session authority.
    Online,
}

/// Things a front end reacts to with sound or animation.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ScoreIncreased { from: u32, to: u32 },
    BombAwarded,
    CrystalAwarded,
    UpgradeOffered(Vec<UpgradeKind>),
    SessionEnded,
    EndSubmitted(EndSummary),
    EndFailed(String),
    SwapReverted { from: usize, to: usize },
}

/// A special tile that has been accepted and is showing its blast. Online the
/// resolved state is already known; offline the effect is applied when the
/// preview ends.
#[derive(Debug, Clone)]
struct PendingEffect {
    preview: EffectPreview,
    resolved: Option<GameState>,
}

/// Counters compared before and after a state change to raise events.
#[derive(Debug, Clone, Copy)]
struct Tally {
    score: u32,
    bombs: u32,
    crystals: u32,
    awaiting_upgrade: bool,
}

impl Tally {
    fn of(state: Option<&GameState>) -> Self {
        match state {
            Some(state) => Self {
                score: state.score,
                bombs: state.bombs,
                crystals: state.crystals,
                awaiting_upgrade: state.awaiting_upgrade(),
            },
            None => Self {
                score: 0,
                bombs: 0,
                crystals: 0,
                awaiting_upgrade: false,
            },
        }
    }
}

/// The match-3 engine instance. Drive it with [`Game::handle_pointer`] and
/// [`Game::update`], render from its accessors and drain its events.
pub struct Game {
    config: EngineConfig,
    rules: Rules,
    rng: StdRng,
    mode: NetworkMode,
    state: Option<GameState>,
    cascade: CascadeAnimator,
    input: InputController,
    timers: TimerController,
    sync: SessionSync,
    effect: Option<PendingEffect>,
    score_highlight: Option<Delay>,
    end_submitted: bool,
    end_deferred: bool,
    end_summary: Option<EndSummary>,
    end_error: Option<String>,
    view_active: bool,
    best_offline: u32,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            rules: Rules::new(config.rules.clone()),
            cascade: CascadeAnimator::new(config.clear_delay(), config.settle_delay()),
            input: InputController::new(config.tile_size_px, config.drag_jitter_px),
            config,
            rng,
            mode: NetworkMode::Offline,
            state: None,
            timers: TimerController::new(),
            sync: SessionSync::new(),
            effect: None,
            score_highlight: None,
            end_submitted: false,
            end_deferred: false,
            end_summary: None,
            end_error: None,
            view_active: false,
            best_offline: 0,
            events: Vec::new(),
        }
    }

    /// Switches to online play against the authority behind `link`.
    pub fn attach_link(&mut self, link: SessionLink, token: impl Into<String>) {
        self.sync.attach(link, token);
        self.mode = NetworkMode::Online;
        self.discard_session();
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn set_tile_size(&mut self, tile_size: f32) {
        self.input.set_tile_size(tile_size);
    }

    pub fn cascade(&self) -> &CascadeAnimator {
        &self.cascade
    }

    pub fn effect_preview(&self) -> Option<&EffectPreview> {
        self.effect.as_ref().map(|effect| &effect.preview)
    }

    pub fn is_busy(&self) -> bool {
        self.sync.is_busy()
    }

    pub fn score_highlighted(&self) -> bool {
        self.score_highlight.is_some()
    }

    pub fn refresh_cooldown(&self) -> u32 {
        self.timers.refresh_cooldown()
    }

    pub fn upgrade_progress(&self) -> Progress {
        let score = self.state.as_ref().map_or(0, |state| state.score);
        self.rules.scoring().thresholds.progress(score)
    }

    pub fn upgrade_labels(&self) -> Vec<(UpgradeKind, String)> {
        self.state.as_ref().map(upgrade::offer_labels).unwrap_or_default()
    }

    pub fn end_summary(&self) -> Option<&EndSummary> {
        self.end_summary.as_ref()
    }

    pub fn end_error(&self) -> Option<&str> {
        self.end_error.as_deref()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn enter_view(&mut self) {
        self.view_active = true;
        self.ensure_session();
    }

    /// Stops timers and forgets the local session. A request already in flight
    /// is not cancelled; its reply is still applied when it arrives.
    pub fn leave_view(&mut self) {
        self.view_active = false;
        self.discard_session();
    }

    fn discard_session(&mut self) {
        self.state = None;
        self.input.cancel();
        self.cascade.cancel();
        self.effect = None;
        self.score_highlight = None;
        self.timers.stop();
        self.reset_end_flags();
    }

    fn reset_end_flags(&mut self) {
        self.end_submitted = false;
        self.end_deferred = false;
        self.end_summary = None;
        self.end_error = None;
    }

    /// Loads the session if there is none yet. A failed load leaves the engine
    /// empty; the next interaction tries again.
    fn ensure_session(&mut self) {
        if self.state.is_some() {
            return;
        }
        match self.mode {
            NetworkMode::Online => {
                if let Err(e) = self.sync.submit(Proposal::Session {
                    start: false,
                    reset: false,
                }) {
                    debug!("session load not sent: {e}");
                }
            }
            NetworkMode::Offline => {
                let state = self.rules.new_session(false, &mut self.rng);
                self.apply_state(state);
            }
        }
    }

    pub fn start(&mut self) {
        if self.state.as_ref().is_some_and(|s| s.status == Status::Active) {
            return;
        }
        self.open_session(true, false);
    }

    pub fn restart(&mut self) {
        self.open_session(true, true);
    }

    fn open_session(&mut self, start: bool, reset: bool) {
        self.reset_end_flags();
        match self.mode {
            NetworkMode::Online => {
                if let Err(e) = self.sync.submit(Proposal::Session { start, reset }) {
                    debug!("session request not sent: {e}");
                }
            }
            NetworkMode::Offline => {
                self.cascade.cancel();
                self.effect = None;
                let state =
                    self.rules
                        .open_session(self.state.take(), start, reset, &mut self.rng);
                self.apply_state(state);
            }
        }
    }

    /// Whether the board takes swaps and special tiles right now.
    pub fn accepts_input(&self) -> bool {
        self.view_active
            && self.state.as_ref().is_some_and(GameState::is_playing)
            && !self.cascade.is_animating()
            && self.effect.is_none()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !self.view_active {
            return;
        }
        if self.state.is_none() {
            self.input.cancel();
            self.ensure_session();
            return;
        }

        let mut allowed = self.accepts_input();
        if let PointerEvent::PressSpecial { kind } = event {
            allowed &= self.state.as_ref().is_some_and(|s| kind.stock(s) > 0);
        }
        match self.input.handle(event, allowed) {
            Some(Intent::Swap { from, to }) => self.swap(from, to),
            Some(Intent::Special { kind, index }) => self.use_special(kind, index),
            None => {}
        }
    }

    fn swap(&mut self, from: usize, to: usize) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if let Err(e) = self.rules.check_swap(state, from, to) {
            debug!("swap refused: {e}");
            return;
        }

        match self.mode {
            NetworkMode::Online => {
                let snapshot = state.grid.clone();
                state.grid.swap(from, to);
                let proposal = Proposal::Move { from, to, snapshot };
                if let Err(e) = self.sync.submit(proposal.clone()) {
                    debug!("move not sent: {e}");
                    self.roll_back(proposal, e);
                }
            }
            NetworkMode::Offline => {
                state.grid.swap(from, to);
                if let Some(report) = self.cascade.start(&state.grid) {
                    self.score_pass(&report);
                }
            }
        }
    }

    /// Uses a bomb or crystal on `index`. Nothing changes locally until the
    /// authority has accepted it.
    pub fn use_special(&mut self, kind: SpecialTile, index: usize) {
        if !self.accepts_input() {
            return;
        }
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if let Err(e) = self.rules.check_special(state, kind, index) {
            debug!("{kind:?} refused: {e}");
            return;
        }

        match self.mode {
            NetworkMode::Online => {
                if let Err(e) = self.sync.submit(Proposal::Special { kind, index }) {
                    debug!("{kind:?} not sent: {e}");
                }
            }
            NetworkMode::Offline => {
                let preview =
                    EffectPreview::new(kind, &state.grid, index, self.config.effect_preview());
                self.effect = Some(PendingEffect {
                    preview,
                    resolved: None,
                });
            }
        }
    }

    pub fn choose_upgrade(&mut self, choice: UpgradeKind) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if !state.awaiting_upgrade() {
            return;
        }
        match self.mode {
            NetworkMode::Online => {
                if let Err(e) = self.sync.submit(Proposal::Upgrade { choice }) {
                    debug!("upgrade not sent: {e}");
                }
            }
            NetworkMode::Offline => match self.rules.choose_upgrade(state, choice) {
                Ok(_) => self.timers.resync_clock(),
                Err(e) => debug!("upgrade refused: {e}"),
            },
        }
    }

    pub fn refresh_board(&mut self) {
        if !self.accepts_input() || !self.timers.refresh_ready() {
            return;
        }
        match self.mode {
            NetworkMode::Online => {
                if let Err(e) = self.sync.submit(Proposal::Refresh) {
                    debug!("refresh not sent: {e}");
                }
            }
            NetworkMode::Offline => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                if self.rules.refresh(state, &mut self.rng).is_ok() {
                    self.timers.restart_refresh(state.refresh_base);
                }
            }
        }
    }

    pub fn update(&mut self, dt: Duration) {
        if let Some(completion) = self.sync.poll() {
            self.complete(completion);
        }
        if !self.view_active {
            return;
        }

        if let Some(highlight) = self.score_highlight.as_mut() {
            if highlight.advance(dt).is_some() {
                self.score_highlight = None;
            }
        }

        if let Some(effect) = self.effect.as_mut() {
            if effect.preview.advance(dt) {
                if let Some(effect) = self.effect.take() {
                    self.finish_effect(effect);
                }
            }
        }

        self.advance_cascade(dt);

        let mut clock_ran_out = false;
        if let Some(state) = self.state.as_mut() {
            clock_ran_out = self.timers.tick_clock(dt, state);
        }
        self.timers.tick_refresh(dt);
        if clock_ran_out {
            info!("time is up");
            self.input.cancel();
            self.events.push(GameEvent::SessionEnded);
            self.submit_end();
        }

        if self.end_deferred && !self.sync.is_busy() {
            self.submit_end();
        }
    }

    fn advance_cascade(&mut self, dt: Duration) {
        if !self.cascade.is_animating() {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            self.cascade.cancel();
            return;
        };
        let steps = self.cascade.advance(dt, &mut state.grid, &mut self.rng);
        for step in steps {
            if let CascadeStep::Chained(report) = step {
                self.score_pass(&report);
            }
        }
    }

    /// Scores one offline pass and restarts the refresh cooldown.
    fn score_pass(&mut self, report: &MatchReport) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let before = Tally::of(Some(&*state));
        self.rules.scoring().apply_pass(state, report, &mut self.rng);
        let refresh_base = state.refresh_base;
        self.timers.restart_refresh(refresh_base);
        self.raise_events(before);
    }

    fn finish_effect(&mut self, effect: PendingEffect) {
        match effect.resolved {
            Some(state) => self.apply_state(state),
            None => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                let kind = effect.preview.kind;
                if self.rules.check_special(state, kind, effect.preview.target).is_err() {
                    return;
                }
                *kind.stock_mut(state) -= 1;
                clear_cells(&mut state.grid, effect.preview.cells.iter().copied());
                collapse(&mut state.grid, &mut self.rng);
                if let Some(report) = self.cascade.start(&state.grid) {
                    self.score_pass(&report);
                }
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Committed {
                proposal: Proposal::Special { kind, index },
                state,
            } if self.view_active => {
                let preview = self.state.as_ref().map(|local| {
                    EffectPreview::new(kind, &local.grid, index, self.config.effect_preview())
                });
                match preview {
                    Some(preview) => {
                        self.effect = Some(PendingEffect {
                            preview,
                            resolved: Some(state),
                        })
                    }
                    None => self.apply_state(state),
                }
            }
            Completion::Committed { state, .. } => {
                self.drop_stale_effect();
                self.apply_state(state)
            }
            Completion::Ended { summary } => {
                self.drop_stale_effect();
                info!(
                    final_score = summary.final_score,
                    personal_best = summary.personal_best,
                    "session result saved"
                );
                if let Some(state) = self.state.as_mut() {
                    state.status = Status::Ended;
                }
                self.end_summary = Some(summary.clone());
                self.events.push(GameEvent::EndSubmitted(summary));
            }
            Completion::RolledBack { proposal, error } => self.roll_back(proposal, error),
        }
    }

    /// A newer reply replaces whatever an unfinished preview was holding.
    fn drop_stale_effect(&mut self) {
        if let Some(effect) = self.effect.take() {
            debug!(kind = ?effect.preview.kind, "effect preview superseded");
        }
    }

    fn roll_back(&mut self, proposal: Proposal, error: SyncError) {
        match proposal {
            Proposal::Move { from, to, snapshot } => {
                if let Some(state) = self.state.as_mut() {
                    state.grid = snapshot;
                }
                self.events.push(GameEvent::SwapReverted { from, to });
            }
            Proposal::End => {
                warn!("end of session not saved: {error}");
                let message = error.to_string();
                self.end_error = Some(message.clone());
                self.events.push(GameEvent::EndFailed(message));
            }
            proposal => {
                debug!(endpoint = proposal.action().endpoint(), "no state change: {error}");
            }
        }
    }

    /// Replaces the local session wholesale, as after an authoritative reply.
    /// Offline play can use this to restore a saved session.
    pub fn restore(&mut self, state: GameState) {
        self.apply_state(state);
    }

    fn apply_state(&mut self, state: GameState) {
        let before = Tally::of(self.state.as_ref());
        let had_session = self.state.is_some();
        self.timers.restart_refresh(state.refresh_base);
        self.timers.resync_clock();
        let time_up = state.time_left == 0;
        self.state = Some(state);
        if had_session {
            self.raise_events(before);
        }
        if time_up && !self.end_submitted {
            self.submit_end();
        }
    }

    fn raise_events(&mut self, before: Tally) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if state.score > before.score {
            self.events.push(GameEvent::ScoreIncreased {
                from: before.score,
                to: state.score,
            });
            self.score_highlight = Some(Delay::new(self.config.score_highlight()));
        }
        if state.bombs > before.bombs {
            self.events.push(GameEvent::BombAwarded);
        }
        if state.crystals > before.crystals {
            self.events.push(GameEvent::CrystalAwarded);
        }
        if state.awaiting_upgrade() && !before.awaiting_upgrade {
            self.events
                .push(GameEvent::UpgradeOffered(state.upgrade_choices.clone()));
        }
    }

    /// Submits the final score once per session. If another request is in
    /// flight the submission waits for it instead of being dropped.
    fn submit_end(&mut self) {
        if self.end_submitted {
            return;
        }
        match self.mode {
            NetworkMode::Online => match self.sync.submit(Proposal::End) {
                Ok(()) => {
                    self.end_submitted = true;
                    self.end_deferred = false;
                }
                Err(SyncError::Busy) => self.end_deferred = true,
                Err(e) => {
                    warn!("end of session not sent: {e}");
                    self.end_submitted = true;
                    self.end_deferred = false;
                    let message = e.to_string();
                    self.end_error = Some(message.clone());
                    self.events.push(GameEvent::EndFailed(message));
                }
            },
            NetworkMode::Offline => {
                self.end_submitted = true;
                self.end_deferred = false;
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                let final_score = self.rules.end(state);
                let was_improved = final_score > self.best_offline;
                self.best_offline = self.best_offline.max(final_score);
                let summary = EndSummary {
                    final_score,
                    personal_best: self.best_offline,
                    was_improved,
                };
                self.end_summary = Some(summary.clone());
                self.events.push(GameEvent::EndSubmitted(summary));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::fixtures::{corner_swap_grid, quiet_grid};
    use crate::grid::Symbol;
    use crate::input::Point;
    use crate::sync::AuthorityEnd;
    use boat_match3_protocol::{GameAction, ServerMessage};

    const FRAME: Duration = Duration::from_millis(16);

    fn active_state() -> GameState {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = Rules::default().new_session(true, &mut rng);
        state.grid = quiet_grid();
        state
    }

    fn reply(authority: &AuthorityEnd, state: &GameState) {
        authority
            .replies
            .send(ServerMessage::State {
                state: state.clone(),
            })
            .unwrap();
    }

    fn next_action(authority: &mut AuthorityEnd) -> GameAction {
        authority.requests.try_recv().unwrap().action
    }

    /// An online game that has loaded `state`.
    fn online(state: &GameState) -> (Game, AuthorityEnd) {
        let mut game = Game::with_seed(EngineConfig::default(), 1);
        let (link, mut authority) = SessionLink::pair();
        game.attach_link(link, "token");
        game.enter_view();
        assert_eq!(
            next_action(&mut authority),
            GameAction::Session {
                start: false,
                reset: false
            }
        );
        reply(&authority, state);
        game.update(FRAME);
        assert!(game.state().is_some());
        (game, authority)
    }

    fn offline(state: GameState) -> Game {
        let mut game = Game::with_seed(EngineConfig::default(), 1);
        game.enter_view();
        game.restore(state);
        game.drain_events();
        game
    }

    fn drag(game: &mut Game, cell: usize, dx: f32, dy: f32) {
        let start = Point::new(200.0, 200.0);
        game.handle_pointer(PointerEvent::Press { cell, at: start });
        game.handle_pointer(PointerEvent::Move {
            at: Point::new(start.x + dx, start.y + dy),
            over: None,
        });
        game.handle_pointer(PointerEvent::Release { over: None });
    }

    #[test]
    fn rejected_swap_reverts_to_the_snapshot() {
        let state = active_state();
        let (mut game, mut authority) = online(&state);

        drag(&mut game, 0, 40.0, 0.0);
        // shown immediately
        assert_eq!(game.state().unwrap().grid.get(0), Some(Symbol::Sun));
        assert_eq!(next_action(&mut authority), GameAction::Move { from: 0, to: 1 });

        authority
            .replies
            .send(ServerMessage::Rejected {
                reason: "stale".into(),
            })
            .unwrap();
        game.update(FRAME);

        assert_eq!(game.state().unwrap().grid, quiet_grid());
        assert_eq!(
            game.drain_events(),
            vec![GameEvent::SwapReverted { from: 0, to: 1 }]
        );
    }

    #[test]
    fn committed_swap_takes_the_authoritative_state() {
        let state = active_state();
        let (mut game, mut authority) = online(&state);

        drag(&mut game, 0, 40.0, 0.0);
        next_action(&mut authority);
        let mut resolved = state.clone();
        resolved.score = 30;
        resolved.bombs = 1;
        reply(&authority, &resolved);
        game.update(FRAME);

        assert_eq!(game.state(), Some(&resolved));
        assert!(game.score_highlighted());
        assert_eq!(
            game.drain_events(),
            vec![
                GameEvent::ScoreIncreased { from: 0, to: 30 },
                GameEvent::BombAwarded
            ]
        );
        game.update(Duration::from_millis(600));
        assert!(!game.score_highlighted());
    }

    #[test]
    fn swap_while_busy_is_dropped_and_reverted() {
        let state = active_state();
        let (mut game, mut authority) = online(&state);
        game.choose_upgrade(UpgradeKind::Time); // not offered: ignored
        game.refresh_board(); // cooldown still running: ignored
        game.timers.restart_refresh(0);
        game.refresh_board();
        assert_eq!(next_action(&mut authority), GameAction::Refresh);

        drag(&mut game, 0, 40.0, 0.0);

        assert!(authority.requests.try_recv().is_err());
        assert_eq!(game.state().unwrap().grid, quiet_grid());
        assert_eq!(
            game.drain_events(),
            vec![GameEvent::SwapReverted { from: 0, to: 1 }]
        );
    }

    #[test]
    fn offline_cascade_scores_each_pass() {
        let mut state = active_state();
        state.grid = corner_swap_grid();
        let mut game = offline(state);

        drag(&mut game, 12, 0.0, 40.0);

        // crossing row and column runs: 10 + 10, which reaches the first threshold
        let state = game.state().unwrap();
        assert_eq!(state.score, 20);
        assert!(state.awaiting_upgrade());
        assert!(game.cascade().is_animating());
        assert!(!game.accepts_input());
        let events = game.drain_events();
        assert_eq!(events[0], GameEvent::ScoreIncreased { from: 0, to: 20 });
        assert!(matches!(events[1], GameEvent::UpgradeOffered(ref choices) if choices.len() == 3));

        for _ in 0..200 {
            game.update(FRAME);
        }
        assert!(!game.cascade().is_animating());
        // clock held while the offer is open
        assert_eq!(game.state().unwrap().time_left, 60);

        let choice = game.state().unwrap().upgrade_choices[0];
        game.choose_upgrade(choice);
        assert!(game.state().unwrap().is_playing());
    }

    #[test]
    fn end_is_submitted_once_and_failure_is_shown() {
        let mut state = active_state();
        state.time_left = 1;
        let (mut game, mut authority) = online(&state);

        game.update(Duration::from_secs(1));
        assert_eq!(game.state().unwrap().status, Status::Ended);
        assert_eq!(next_action(&mut authority), GameAction::End);

        authority
            .replies
            .send(ServerMessage::Rejected {
                reason: "storage unavailable".into(),
            })
            .unwrap();
        game.update(FRAME);

        assert!(game.end_error().is_some());
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::SessionEnded));
        assert!(matches!(events.last(), Some(GameEvent::EndFailed(_))));

        // a later state with no time left does not submit again
        let mut ended = state.clone();
        ended.time_left = 0;
        ended.status = Status::Ended;
        game.restore(ended);
        game.update(Duration::from_secs(2));
        assert!(authority.requests.try_recv().is_err());
    }

    #[test]
    fn end_waits_for_the_request_in_flight() {
        let mut state = active_state();
        state.time_left = 1;
        let (mut game, mut authority) = online(&state);
        game.timers.restart_refresh(0);
        game.refresh_board();
        assert_eq!(next_action(&mut authority), GameAction::Refresh);

        game.update(Duration::from_secs(1));
        assert!(authority.requests.try_recv().is_err());

        let mut refreshed = state.clone();
        refreshed.time_left = 0;
        reply(&authority, &refreshed);
        game.update(FRAME);
        assert_eq!(next_action(&mut authority), GameAction::End);

        let summary = EndSummary {
            final_score: 0,
            personal_best: 40,
            was_improved: false,
        };
        authority
            .replies
            .send(ServerMessage::Ended {
                summary: summary.clone(),
            })
            .unwrap();
        game.update(FRAME);
        assert_eq!(game.end_summary(), Some(&summary));
    }

    #[test]
    fn bomb_previews_before_the_state_is_replaced() {
        let mut state = active_state();
        state.bombs = 1;
        let (mut game, mut authority) = online(&state);

        game.handle_pointer(PointerEvent::PressSpecial {
            kind: SpecialTile::Bomb,
        });
        game.handle_pointer(PointerEvent::Release { over: Some(12) });
        assert_eq!(next_action(&mut authority), GameAction::Bomb { index: 12 });

        let mut resolved = state.clone();
        resolved.bombs = 0;
        resolved.grid.set(12, Some(Symbol::Smile));
        reply(&authority, &resolved);
        game.update(FRAME);

        let preview = game.effect_preview().unwrap();
        assert_eq!(preview.cells.len(), 5);
        assert_eq!(game.state().unwrap().bombs, 1);
        assert!(!game.accepts_input());

        game.update(Duration::from_millis(320));
        assert!(game.effect_preview().is_none());
        assert_eq!(game.state(), Some(&resolved));
    }

    #[test]
    fn restart_during_a_preview_keeps_the_new_session() {
        let mut state = active_state();
        state.bombs = 1;
        let (mut game, mut authority) = online(&state);

        game.use_special(SpecialTile::Bomb, 12);
        assert_eq!(next_action(&mut authority), GameAction::Bomb { index: 12 });
        let mut bombed = state.clone();
        bombed.bombs = 0;
        bombed.score = 30;
        bombed.grid.set(12, Some(Symbol::Smile));
        reply(&authority, &bombed);
        game.update(FRAME);
        assert!(game.effect_preview().is_some());

        game.restart();
        assert_eq!(
            next_action(&mut authority),
            GameAction::Session {
                start: true,
                reset: true
            }
        );
        let mut fresh = state.clone();
        fresh.bombs = 0;
        fresh.time_left = 45;
        reply(&authority, &fresh);
        game.update(FRAME);
        assert!(game.effect_preview().is_none());

        game.update(Duration::from_millis(320));
        let current = game.state().unwrap();
        assert_eq!(current.score, 0);
        assert_eq!(current.grid, fresh.grid);
    }

    #[test]
    fn cascade_pass_restarts_the_refresh_cooldown() {
        let mut state = active_state();
        state.grid = corner_swap_grid();
        let mut game = offline(state);
        assert_eq!(game.refresh_cooldown(), 10);

        game.update(Duration::from_millis(999));
        assert_eq!(game.refresh_cooldown(), 10);
        game.update(Duration::from_millis(1));
        assert_eq!(game.refresh_cooldown(), 9);
        game.update(Duration::from_secs(2));
        assert_eq!(game.refresh_cooldown(), 7);

        drag(&mut game, 12, 0.0, 40.0);
        assert_eq!(game.state().unwrap().score, 20);
        assert_eq!(game.refresh_cooldown(), 10);
    }

    #[test]
    fn manual_refresh_waits_for_its_cooldown() {
        let mut game = offline(active_state());

        game.refresh_board();
        assert_eq!(game.state().unwrap().grid, quiet_grid());
        assert_eq!(game.refresh_cooldown(), 10);

        game.update(Duration::from_secs(10));
        assert_eq!(game.refresh_cooldown(), 0);
        game.refresh_board();
        assert_ne!(game.state().unwrap().grid, quiet_grid());
        assert_eq!(game.refresh_cooldown(), 10);

        let refreshed = game.state().unwrap().grid.clone();
        game.refresh_board();
        assert_eq!(game.state().unwrap().grid, refreshed);
    }

    #[test]
    fn special_without_stock_cannot_be_aimed() {
        let state = active_state();
        let (mut game, mut authority) = online(&state);
        game.handle_pointer(PointerEvent::PressSpecial {
            kind: SpecialTile::Crystal,
        });
        game.handle_pointer(PointerEvent::Release { over: Some(3) });
        assert!(authority.requests.try_recv().is_err());
    }

    #[test]
    fn offline_crystal_clears_after_its_preview() {
        let mut state = active_state();
        state.crystals = 1;
        state.grid.set(23, Some(Symbol::Beer));
        let mut game = offline(state);

        game.use_special(SpecialTile::Crystal, 12);
        assert_eq!(game.effect_preview().unwrap().cells.len(), 4);
        assert_eq!(game.state().unwrap().crystals, 1);

        game.update(Duration::from_millis(320));
        assert_eq!(game.state().unwrap().crystals, 0);
        assert!(game.effect_preview().is_none());
        for _ in 0..200 {
            game.update(FRAME);
        }
        assert!(game.state().unwrap().grid.is_full());
    }

    #[test]
    fn failed_bootstrap_is_retried_on_next_interaction() {
        let mut game = Game::with_seed(EngineConfig::default(), 1);
        let (link, mut authority) = SessionLink::pair();
        game.attach_link(link, "token");
        game.enter_view();
        next_action(&mut authority);
        authority
            .replies
            .send(ServerMessage::Rejected {
                reason: "unavailable".into(),
            })
            .unwrap();
        game.update(FRAME);
        assert!(game.state().is_none());

        game.handle_pointer(PointerEvent::Press {
            cell: 0,
            at: Point::default(),
        });
        assert_eq!(
            next_action(&mut authority),
            GameAction::Session {
                start: false,
                reset: false
            }
        );
    }

    #[test]
    fn leaving_the_view_keeps_the_request_in_flight() {
        let state = active_state();
        let (mut game, mut authority) = online(&state);
        game.start(); // already active: no request
        assert!(authority.requests.try_recv().is_err());

        game.restart();
        assert_eq!(
            next_action(&mut authority),
            GameAction::Session {
                start: true,
                reset: true
            }
        );
        game.leave_view();
        assert!(game.state().is_none());
        assert!(game.is_busy());

        reply(&authority, &state);
        game.update(FRAME);
        assert_eq!(game.state(), Some(&state));
    }

    #[test]
    fn offline_session_starts_and_ends_locally() {
        let mut game = Game::with_seed(EngineConfig::default(), 4);
        game.enter_view();
        assert_eq!(game.state().unwrap().status, Status::Ready);
        assert!(!game.accepts_input());

        game.start();
        assert!(game.accepts_input());
        game.update(Duration::from_secs(61));

        let summary = game.end_summary().unwrap();
        assert_eq!(summary.final_score, 0);
        assert!(!summary.was_improved);
        assert_eq!(game.state().unwrap().status, Status::Ended);
    }
}
