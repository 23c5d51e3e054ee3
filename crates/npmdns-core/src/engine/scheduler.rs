//! Polling policy
//!
//! The scheduler never sleeps itself. It tells the driver whether the next
//! cycle is a forced refresh and how long to wait after a cycle, so the
//! policy is testable without timers.
//!
//! - The first cycle is always forced, then every `force_every`-th cycle.
//!   A forced refresh stays pending until a cycle completes.
//! - A successful cycle resets the error counter.
//! - Failed cycles count up; when the counter reaches the threshold the next
//!   delay is doubled once and the counter starts over.

use std::time::Duration;

use crate::config::ScheduleConfig;

/// Polling policy state
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    force_every: u64,
    max_consecutive_errors: u32,
    /// Cycles recorded so far
    cycle: u64,
    pending_force: bool,
    consecutive_errors: u32,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// `force_every` and `max_consecutive_errors` are clamped to at least 1.
    pub fn new(interval: Duration, force_every: u64, max_consecutive_errors: u32) -> Self {
        Self {
            interval,
            force_every: force_every.max(1),
            max_consecutive_errors: max_consecutive_errors.max(1),
            cycle: 0,
            pending_force: true,
            consecutive_errors: 0,
        }
    }

    /// Create a scheduler from configuration
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(
            config.interval(),
            config.force_every(),
            config.max_consecutive_errors,
        )
    }

    /// Whether the next cycle should rewrite every domain
    pub fn force_next(&self) -> bool {
        self.pending_force
    }

    fn advance(&mut self) {
        self.cycle += 1;
        if self.cycle % self.force_every == 0 {
            self.pending_force = true;
        }
    }

    /// Record a completed cycle and get the delay before the next one
    pub fn record_success(&mut self) -> Duration {
        self.pending_force = false;
        self.advance();
        self.consecutive_errors = 0;
        self.interval
    }

    /// Record an aborted cycle and get the delay before the next one
    ///
    /// A pending forced refresh is carried over to the next cycle.
    pub fn record_failure(&mut self) -> Duration {
        self.advance();
        self.consecutive_errors += 1;

        if self.consecutive_errors >= self.max_consecutive_errors {
            tracing::warn!(
                "{} consecutive failed cycles, backing off to {:?}",
                self.consecutive_errors,
                self.interval * 2
            );
            self.consecutive_errors = 0;
            self.interval * 2
        } else {
            self.interval
        }
    }

    /// Failed cycles since the last success or backoff
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Cycles recorded so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }
}
