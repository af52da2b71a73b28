//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed call is retryable
//! - Compute the delay before each retry
//!
//! # Design Decisions
//! - No response at all (connect error, timeout) is always retryable
//! - 5xx, 429 and 408 are retryable; other statuses are final
//! - Jittered backoff prevents thundering herd

use std::time::Duration;

use crate::config::HttpClientConfig;
use crate::resilience::backoff::calculate_backoff;

/// Whether an outcome should be retried. `None` means no response arrived.
pub fn is_retryable(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(code) => code >= 500 || code == 429 || code == 408,
    }
}

/// Retry budget of a single logical call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpClientConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            jitter_ms: config.retry_jitter_ms,
        }
    }

    /// Whether another attempt may follow failed attempt `attempt` (0-based).
    pub fn can_retry_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Delay to sleep after failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.jitter_ms)
    }
}
