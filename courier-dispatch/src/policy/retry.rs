//! Retry policy for failed deliveries.
//!
//! Decides whether a job that failed with a retryable error goes back to
//! `pending`, and when it becomes due again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::SystemError, queue::retry::calculate_backoff};

/// Retry policy configuration.
///
/// Only temporary failures are retried. A policy with `max_attempts = 1`
/// treats every failure as terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts before giving up.
    ///
    /// Default: 5 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in seconds).
    ///
    /// The actual delay is calculated as: `base * 2^(attempts - 1)`
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,

    /// Maximum retry delay (in seconds).
    ///
    /// Default: 3600 seconds (1 hour)
    #[serde(default = "defaults::max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    /// Jitter factor for randomizing retry delays, within ±`retry_jitter_factor`.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::retry_jitter_factor")]
    pub retry_jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_retry_delay_secs: defaults::base_retry_delay_secs(),
            max_retry_delay_secs: defaults::max_retry_delay_secs(),
            retry_jitter_factor: defaults::retry_jitter_factor(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy under which every failure is terminal
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check if another attempt is allowed after `attempt_count` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// When a job that has had `attempt_count` attempts becomes due again.
    #[must_use]
    pub fn next_attempt_at(&self, attempt_count: u32, from: DateTime<Utc>) -> DateTime<Utc> {
        let delay = calculate_backoff(
            attempt_count,
            self.base_retry_delay_secs,
            self.max_retry_delay_secs,
            self.retry_jitter_factor,
        );

        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| from.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Get the number of remaining attempts.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }

    /// # Errors
    /// If `max_attempts` is zero or the jitter factor is outside `[0, 1]`
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.max_attempts == 0 {
            return Err(SystemError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            return Err(SystemError::Configuration(format!(
                "retry.retry_jitter_factor must be within [0, 1], got {}",
                self.retry_jitter_factor
            )));
        }

        Ok(())
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn base_retry_delay_secs() -> u64 {
        60
    }

    pub const fn max_retry_delay_secs() -> u64 {
        3600
    }

    pub const fn retry_jitter_factor() -> f64 {
        0.1
    }
}
