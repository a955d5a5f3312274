//! Retry policy for failed fetches

use std::time::Duration;

use crate::error::FetchError;

/// Bounded exponential backoff for transient producer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): 1s, 2s, 4s, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// Whether another attempt should follow `retries_used` earlier retries
    pub fn should_retry(&self, error: &FetchError, retries_used: u32) -> bool {
        error.is_transient() && retries_used < self.max_retries
    }
}

/// Message-pattern classification for errors that arrive without a tag.
///
/// Only consulted for raw messages (e.g. an untagged server error body);
/// tagged errors are never reclassified.
pub mod legacy {
    /// Lower-case fragments of messages known to clear up on retry
    const TRANSIENT_PATTERNS: &[&str] = &[
        // database connection/transaction state
        "prepared statement",
        "transaction is aborted",
        "in failed sql transaction",
        "sqlstate[25p02]",
        "sqlstate[26000]",
        // driver type coercion glitches
        "invalid input syntax for type boolean",
        "cannot be cast",
        // auth context not loaded yet
        "auth not loaded",
        "authentication not ready",
        "token",
        "network",
    ];

    pub fn is_transient_message(message: &str) -> bool {
        let lower = message.to_lowercase();
        TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
    }

}
