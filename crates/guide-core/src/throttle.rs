//! Frame throttle: at most one run per time budget.
//!
//! Scroll and resize both go through this. A call that lands inside the
//! budget is not lost: it is coalesced into a single trailing run that the
//! owner picks up with `flush` on its next frame tick.

use std::time::{Duration, Instant};

/// Default budget: one animation frame.
pub const FRAME_BUDGET: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct FrameThrottle {
    budget: Duration,
    last_run: Option<Instant>,
    pending: bool,
}

impl FrameThrottle {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_run: None,
            pending: false,
        }
    }

    fn budget_elapsed(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.budget,
        }
    }

    /// Returns true when the caller should run its handler now. Otherwise
    /// the call is remembered as pending.
    pub fn try_run(&mut self, now: Instant) -> bool {
        if self.budget_elapsed(now) {
            self.last_run = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Trailing edge: true once per coalesced burst, after the budget.
    pub fn flush(&mut self, now: Instant) -> bool {
        if self.pending && self.budget_elapsed(now) {
            self.last_run = Some(now);
            self.pending = false;
            return true;
        }
        false
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(FRAME_BUDGET)
    }
}
