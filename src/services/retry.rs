//! Retry Scheduling
//!
//! Bounded per-line retry with a classification-driven sleep schedule.
//! Transport hiccups and wait timeouts get a short back-off; rate limits
//! and truncated responses sleep long enough for the assistant's quota
//! window to roll over. Every sleep is cancellable.

use std::time::Duration;

use baitline_core::{sleep_cancellable, CancellationToken};
use tracing::{info, warn};

use crate::services::validator::ResponseClass;
use crate::utils::error::{AppError, AppResult};

/// Short back-off for transport failures, timeouts and empty copies
const SHORT_SLEEP_SECS: u64 = 60;
/// Long back-off for rate limits and truncated responses
const LONG_SLEEP_SECS: u64 = 1800;

/// Retry configuration shared by every line of a campaign
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed per line (0-based counter compared against this)
    pub max_retries_per_line: u32,
    /// Short back-off duration
    pub short_sleep: Duration,
    /// Long back-off duration
    pub long_sleep: Duration,
}

impl RetryPolicy {
    /// Production schedule: 60 s short, 1800 s long
    pub fn new(max_retries_per_line: u32) -> Self {
        Self {
            max_retries_per_line,
            short_sleep: Duration::from_secs(SHORT_SLEEP_SECS),
            long_sleep: Duration::from_secs(LONG_SLEEP_SECS),
        }
    }

    /// Schedule override for tests
    pub fn with_sleeps(mut self, short: Duration, long: Duration) -> Self {
        self.short_sleep = short;
        self.long_sleep = long;
        self
    }

    /// The sleep matching a failure class
    fn sleep_for(&self, class: ResponseClass) -> Duration {
        match class {
            ResponseClass::RateLimit | ResponseClass::Truncated => self.long_sleep,
            ResponseClass::Timeout | ResponseClass::Transport => self.short_sleep,
            ResponseClass::Ok => Duration::ZERO,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back-off completed; re-attempt the line
    Retry,
    /// The retry budget is exhausted; demote the line to failed
    GiveUp,
}

/// Per-line retry state machine.
///
/// One controller is created per target line attempt; `backoff` counts the
/// failure, sleeps per the schedule, and says whether to try again.
#[derive(Debug)]
pub struct RetryController {
    policy: RetryPolicy,
    retry_count: u32,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_count: 0,
        }
    }

    /// Failures recorded so far
    pub fn attempts(&self) -> u32 {
        self.retry_count
    }

    /// Record a failure of `class` and sleep per the schedule.
    ///
    /// Returns `GiveUp` once the budget is exhausted (without sleeping).
    /// A cancel during the sleep unwinds with `AppError::Interrupted`.
    pub async fn backoff(
        &mut self,
        class: ResponseClass,
        cancel: &CancellationToken,
    ) -> AppResult<RetryDecision> {
        self.retry_count += 1;
        if self.retry_count >= self.policy.max_retries_per_line {
            warn!(
                retries = self.retry_count,
                cause = %class,
                "retry budget exhausted, giving up on line"
            );
            return Ok(RetryDecision::GiveUp);
        }

        let sleep = self.policy.sleep_for(class);
        info!(
            retry = self.retry_count,
            cause = %class,
            sleep_secs = sleep.as_secs(),
            "backing off before retry"
        );
        if !sleep_cancellable(sleep, cancel).await {
            return Err(AppError::Interrupted);
        }
        Ok(RetryDecision::Retry)
    }
}
