//! Delays between retry attempts.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Calculate exponential backoff delay with jitter.
///
/// Jitter stays under 10% of the delay and the result never exceeds
/// `max_ms`, so delays strictly increase until they reach the cap and then
/// stay exactly at it.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    if delay_ms >= max_ms {
        return Duration::from_millis(max_ms);
    }

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis((delay_ms + jitter).min(max_ms))
}

/// Delay to wait after the `attempt`-th failure (1-based).
pub fn retry_delay(config: &RetryConfig, attempt: u32, exponential: bool) -> Duration {
    if exponential {
        calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms)
    } else {
        Duration::from_millis(config.fixed_delay_ms)
    }
}
