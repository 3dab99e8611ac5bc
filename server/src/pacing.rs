//! Tick pacing helpers for the game loop.

use std::time::Duration;
use tokio::time::Instant;

/// How long to sleep after a tick that took `elapsed` to process.
/// Never negative: an overrun tick is followed immediately by the next one,
/// and missed ticks are not replayed.
pub fn sleep_budget(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Measures wall time between ticks to produce the simulation `dt`.
#[derive(Debug)]
pub struct TickClock {
    last: Instant,
    max_dt: f64,
}

impl TickClock {
    pub fn new(start: Instant, max_dt: f64) -> Self {
        Self { last: start, max_dt }
    }

    /// Seconds since the previous call, capped at `max_dt` so a stalled
    /// process doesn't teleport everything on resume.
    pub fn advance(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        dt.min(self.max_dt)
    }
}
