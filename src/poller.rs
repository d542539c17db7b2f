//! Fixed-interval timer driving the readout polling.
//!
//! The timer owns no thread. The frame loop asks [`PollTimer::is_due`] on every frame and
//! uses [`PollTimer::remaining`] to schedule the next wake-up.

use std::time::{Duration, Instant};

/// Readouts are refreshed this often by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy)]
pub struct PollTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for PollTimer {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A timer that never fired is due immediately.
    pub fn is_due(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Record a tick at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// If due, record the tick and return true.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    /// Time left until the next tick, zero when due.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}
