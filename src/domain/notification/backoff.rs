//! Reconnect backoff for the client relay.
//!
//! The delay for retry `n` is `first × 2^n`, clamped to `max`. The base is
//! derived purely from the retry count, so a reset counter always restarts
//! the sequence at `first`.
//!
//! ```rust
//! use std::time::Duration;
//! use marketplace_relay::domain::notification::ReconnectBackoff;
//!
//! let backoff = ReconnectBackoff::default();
//! assert_eq!(backoff.delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay(4), Duration::from_secs(16));
//! assert_eq!(backoff.delay(5), Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Capped exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for ReconnectBackoff {
    /// `first = 1s`, `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectBackoff {
    pub fn new(first: Duration, max: Duration) -> Self {
        Self { first, max }
    }

    /// Delay to wait before reconnecting after `retry_count` consecutive
    /// failures.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let first = self.first.as_millis();
        let max = self.max.as_millis();
        let millis = 2u128
            .checked_pow(retry_count)
            .and_then(|factor| first.checked_mul(factor))
            .map_or(max, |m| m.min(max));
        Duration::from_millis(millis as u64)
    }
}
