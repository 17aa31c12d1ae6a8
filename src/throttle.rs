// ===============================
// src/throttle.rs (exchange action budget)
// ===============================
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::metrics::THROTTLED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState { Open, Throttled }

/// Budget exhausted; nothing may be sent before `resume_at`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("action budget exhausted until window reset")]
pub struct Throttled {
    pub resume_at: Instant,
}

/// Fixed-window counter of inserts + cancels.
///
/// The first window opens with the first action. A window only rolls once
/// `window` has fully elapsed; the count is then zeroed and the new window
/// starts at the instant the roll is observed.
#[derive(Debug)]
pub struct ActionThrottle {
    limit: u32,
    window: Duration,
    count: u32,
    window_start: Option<Instant>,
}

impl ActionThrottle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, count: 0, window_start: None }
    }

    fn roll(&mut self, now: Instant) {
        if let Some(start) = self.window_start {
            if now.saturating_duration_since(start) >= self.window {
                self.count = 0;
                self.window_start = Some(now);
            }
        }
    }

    /// Take one unit of budget, or report when the window reopens.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Throttled> {
        self.roll(now);
        if self.count >= self.limit {
            let resume_at = self.resume_at().unwrap_or(now);
            THROTTLED.inc();
            warn!(count = self.count, limit = self.limit, "action budget exhausted");
            return Err(Throttled { resume_at });
        }
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.count += 1;
        Ok(())
    }

    pub fn state(&mut self, now: Instant) -> ThrottleState {
        self.roll(now);
        if self.count >= self.limit { ThrottleState::Throttled } else { ThrottleState::Open }
    }

    /// Actions spent in the current window (as of the last acquire/state call).
    pub fn count(&self) -> u32 { self.count }

    pub fn limit(&self) -> u32 { self.limit }

    pub fn resume_at(&self) -> Option<Instant> {
        self.window_start.map(|s| s + self.window)
    }
}
