//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay without jitter before the retry that follows failed attempt `attempt` (0-based).
pub fn base_backoff(attempt: u32, base_ms: u64) -> Duration {
    let exponential_base = 2u64.saturating_pow(attempt);
    Duration::from_millis(base_ms.saturating_mul(exponential_base))
}

/// Calculate exponential backoff delay with jitter.
///
/// `base_ms * 2^attempt` plus a uniform jitter in `[0, jitter_ms]`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, jitter_ms: u64) -> Duration {
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };

    base_backoff(attempt, base_ms) + Duration::from_millis(jitter)
}
