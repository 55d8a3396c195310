//! Tick-driven cadence accumulators

use std::time::Duration;

/// Fires once every `interval` of accumulated tick time.
///
/// Starts due, so the first tick fires. Leftover time is dropped when it
/// fires, so a long stall yields one firing rather than a burst.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    accumulated: Duration,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Add `dt` and report whether the cadence elapsed
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.accumulated = self.accumulated.saturating_add(dt);
        if self.accumulated >= self.interval {
            self.accumulated = Duration::ZERO;
            true
        } else {
            false
        }
    }
}
