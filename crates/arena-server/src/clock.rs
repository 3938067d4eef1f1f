//! Chess clock state. Pure: every operation takes the current instant, the
//! session actor drives it from its ticker.

use std::time::{Duration, Instant};

use arena_core::{ClockSnapshot, TimeControl};
use chess_core::Color;

/// Armageddon main times.
pub const ARMAGEDDON_WHITE: Duration = Duration::from_secs(5 * 60);
pub const ARMAGEDDON_BLACK: Duration = Duration::from_secs(4 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    remaining: [Duration; 2],
    increment: [Duration; 2],
    running: Option<Color>,
    last_tick: Instant,
    flagged: Option<Color>,
}

impl Clock {
    pub fn new(tc: TimeControl, now: Instant) -> Self {
        let initial = Duration::from_millis(tc.initial_ms);
        let inc = Duration::from_millis(tc.increment_ms);
        Self {
            remaining: [initial, initial],
            increment: [inc, inc],
            running: None,
            last_tick: now,
            flagged: None,
        }
    }

    /// 5:00 for White against 4:00 for Black, no increment.
    pub fn armageddon(now: Instant) -> Self {
        Self {
            remaining: [ARMAGEDDON_WHITE, ARMAGEDDON_BLACK],
            increment: [Duration::ZERO; 2],
            running: None,
            last_tick: now,
            flagged: None,
        }
    }

    pub fn running(&self) -> Option<Color> {
        self.running
    }

    pub fn flagged(&self) -> Option<Color> {
        self.flagged
    }

    pub fn remaining(&self, side: Color) -> Duration {
        self.remaining[side.idx()]
    }

    pub fn increment(&self, side: Color) -> Duration {
        self.increment[side.idx()]
    }

    /// Starts `side`, stopping whichever side was running.
    pub fn start(&mut self, side: Color, now: Instant) {
        if self.flagged.is_some() {
            return;
        }
        self.charge(now);
        self.running = Some(side);
    }

    pub fn stop(&mut self, now: Instant) {
        self.charge(now);
        self.running = None;
    }

    /// Charges the running side; returns the side whose flag fell, if any.
    /// A flag stops the clock for good.
    pub fn tick(&mut self, now: Instant) -> Option<Color> {
        self.charge(now);
        self.flagged
    }

    /// `mover` completed a move. Charges elapsed time, adds the increment and
    /// starts the opponent unless `game_over`.
    ///
    /// Returns the flagged side when `mover` ran out before pressing.
    /// When the move itself ended the game (`game_over`) the flag is not
    /// consulted: a mate on the board beats a clock that hit zero after it.
    pub fn press(&mut self, mover: Color, now: Instant, game_over: bool) -> Option<Color> {
        if self.flagged.is_some() {
            return self.flagged;
        }
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if self.running == Some(mover) {
            let left = &mut self.remaining[mover.idx()];
            if elapsed >= *left && !game_over {
                *left = Duration::ZERO;
                self.running = None;
                self.flagged = Some(mover);
                return self.flagged;
            }
            *left = left.saturating_sub(elapsed);
        } else if let Some(other) = self.running {
            self.drain(other, elapsed);
            if self.flagged.is_some() {
                return self.flagged;
            }
        }
        if game_over {
            self.running = None;
            return None;
        }
        self.remaining[mover.idx()] += self.increment[mover.idx()];
        self.running = Some(mover.other());
        None
    }

    fn charge(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if let Some(side) = self.running {
            self.drain(side, elapsed);
        }
    }

    fn drain(&mut self, side: Color, elapsed: Duration) {
        let left = &mut self.remaining[side.idx()];
        if elapsed >= *left {
            *left = Duration::ZERO;
            self.running = None;
            self.flagged = Some(side);
        } else {
            *left -= elapsed;
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white_ms: self.remaining[Color::White.idx()].as_millis() as u64,
            black_ms: self.remaining[Color::Black.idx()].as_millis() as u64,
            running: self.running,
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod clock_tests;
