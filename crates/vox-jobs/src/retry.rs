//! Retry policy for failed job attempts.

use std::time::Duration;

use vox_core::defaults::{JOB_MAX_RETRIES, JOB_RETRY_BASE_DELAY_MS, JOB_RETRY_MAX_DELAY_MS};
use vox_core::ErrorClass;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the job after `delay`.
    Retry { delay: Duration },
    /// Give up; the job fails permanently.
    Fail,
}

/// Bounded exponential backoff over total attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per job, including the first.
    pub max_retries: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: JOB_MAX_RETRIES,
            base_delay: Duration::from_millis(JOB_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(JOB_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Create policy from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_MAX_RETRIES` | `3` | Total attempts per job |
    /// | `JOB_RETRY_BASE_DELAY_MS` | `2000` | First backoff delay |
    /// | `JOB_RETRY_MAX_DELAY_MS` | `30000` | Backoff ceiling |
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        Self {
            max_retries: var("JOB_MAX_RETRIES").unwrap_or(JOB_MAX_RETRIES).max(1),
            base_delay: Duration::from_millis(
                var("JOB_RETRY_BASE_DELAY_MS").unwrap_or(JOB_RETRY_BASE_DELAY_MS),
            ),
            max_delay: Duration::from_millis(
                var("JOB_RETRY_MAX_DELAY_MS").unwrap_or(JOB_RETRY_MAX_DELAY_MS),
            ),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay after the given (1-based) attempt: `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide what to do after attempt number `attempt` failed with `class`.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        if class.is_retryable() && attempt < self.max_retries {
            RetryDecision::Retry {
                delay: self.backoff(attempt),
            }
        } else {
            RetryDecision::Fail
        }
    }
}
