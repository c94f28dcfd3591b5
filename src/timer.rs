use std::time::Duration;

use boat_match3_protocol::{GameState, Status};

const SECOND: Duration = Duration::from_secs(1);

/// One-shot delay driven by frame time. Cancel by dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    remaining: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self {
            remaining: duration,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Consumes up to `dt`. Returns the unused part of `dt` once the delay has
    /// elapsed, `None` while it is still running.
    pub fn advance(&mut self, dt: Duration) -> Option<Duration> {
        if dt < self.remaining {
            self.remaining -= dt;
            None
        } else {
            let leftover = dt - self.remaining;
            self.remaining = Duration::ZERO;
            Some(leftover)
        }
    }
}

/// Whole-second countdown fed with frame time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    remaining: u32,
    carry: Duration,
}

impl Countdown {
    pub fn new(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            carry: Duration::ZERO,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    pub fn reset(&mut self, seconds: u32) {
        self.remaining = seconds;
        self.carry = Duration::ZERO;
    }

    /// Returns how many seconds were ticked off.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.remaining == 0 {
            self.carry = Duration::ZERO;
            return 0;
        }
        self.carry += dt;
        let mut ticks = 0;
        while self.carry >= SECOND && self.remaining > 0 {
            self.carry -= SECOND;
            self.remaining -= 1;
            ticks += 1;
        }
        if self.remaining == 0 {
            self.carry = Duration::ZERO;
        }
        ticks
    }
}

/// The session clock and the manual-refresh cooldown.
///
/// The session clock writes straight into `GameState::time_left` so the local
/// cache always shows what the player sees; an authoritative replacement simply
/// overwrites it.
#[derive(Debug, Clone, Default)]
pub struct TimerController {
    clock_carry: Duration,
    refresh: Countdown,
}

impl TimerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock_running(state: &GameState) -> bool {
        state.is_playing()
    }

    /// Advances the session clock. Returns `true` on the update where time runs
    /// out; the state is moved to `Ended` at that point.
    pub fn tick_clock(&mut self, dt: Duration, state: &mut GameState) -> bool {
        if !Self::clock_running(state) {
            return false;
        }
        self.clock_carry += dt;
        while self.clock_carry >= SECOND && state.time_left > 0 {
            self.clock_carry -= SECOND;
            state.time_left -= 1;
        }
        if state.time_left == 0 {
            self.clock_carry = Duration::ZERO;
            state.status = Status::Ended;
            return true;
        }
        false
    }

    /// Drops any partial second, e.g. after the state was replaced.
    pub fn resync_clock(&mut self) {
        self.clock_carry = Duration::ZERO;
    }

    pub fn restart_refresh(&mut self, seconds: u32) {
        self.refresh.reset(seconds);
    }

    pub fn tick_refresh(&mut self, dt: Duration) {
        self.refresh.advance(dt);
    }

    pub fn refresh_cooldown(&self) -> u32 {
        self.refresh.remaining()
    }

    pub fn refresh_ready(&self) -> bool {
        self.refresh.is_done()
    }

    pub fn stop(&mut self) {
        self.clock_carry = Duration::ZERO;
        self.refresh.reset(0);
    }
}
