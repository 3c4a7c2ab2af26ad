//! Circuit breaker for command protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: the command is assumed broken, requests fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: total >= volume threshold AND error% >= error threshold
//! Open → Closed: the first success recorded while open (window is reset)
//! ```
//!
//! # Design Decisions
//! - One breaker per key (command name, or one per engine)
//! - No half-open trial count; a single recorded success closes the circuit
//! - The closed → open flip is a compare-and-set so only one caller logs it

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::health::SlidingWindowHealth;

#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    request_volume_threshold: u64,
    error_threshold_percentage: f64,
    health: SlidingWindowHealth,
    open: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: &BreakerConfig) -> Self {
        Self {
            key: key.into(),
            request_volume_threshold: config.request_volume_threshold,
            error_threshold_percentage: config.error_threshold_percentage,
            health: SlidingWindowHealth::new(config.metrics_window),
            open: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn health(&self) -> &SlidingWindowHealth {
        &self.health
    }

    /// Record a success. While open this resets the window and closes the circuit.
    pub fn mark_success(&self, elapsed: Duration) {
        if self.open.load(Ordering::Acquire) {
            self.health.reset();
            if self.open.swap(false, Ordering::AcqRel) {
                tracing::info!(breaker = %self.key, "Circuit breaker closed");
                metrics::record_breaker_transition(&self.key, false);
            }
        } else {
            self.health.mark_success(elapsed);
        }
    }

    pub fn mark_failure(&self, elapsed: Duration) {
        self.health.mark_failure(elapsed);
    }

    /// Evaluate the window and trip the circuit when the error rate is too high.
    pub fn is_open(&self) -> bool {
        if self.open.load(Ordering::Acquire) {
            return true;
        }

        let total = self.health.total_requests();
        if total == 0 || total < self.request_volume_threshold {
            return false;
        }

        let error_percentage = self.health.error_percentage();
        if error_percentage < self.error_threshold_percentage {
            return false;
        }

        if self
            .open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::warn!(
                breaker = %self.key,
                total_requests = total,
                error_percentage,
                "Circuit breaker opened"
            );
            metrics::record_breaker_transition(&self.key, true);
        }
        true
    }

    pub fn allow_request(&self) -> bool {
        !self.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", &BreakerConfig::default())
    }

    #[test]
    fn test_single_failure_opens() {
        let cb = breaker();
        assert!(cb.allow_request());

        cb.mark_failure(Duration::from_millis(10));
        assert!(cb.is_open());
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_while_open_resets_window() {
        let cb = breaker();
        cb.mark_failure(Duration::from_millis(10));
        assert!(cb.is_open());

        cb.mark_success(Duration::from_millis(10));
        assert!(!cb.is_open());
        assert_eq!(cb.health().total_requests(), 0);
        assert_eq!(cb.health().error_count(), 0);
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let cb = breaker();
        cb.mark_success(Duration::from_millis(1));
        cb.mark_success(Duration::from_millis(1));
        cb.mark_failure(Duration::from_millis(1));

        // 1 error out of 3 is 33%
        assert!(!cb.is_open());
    }

    #[test]
    fn test_exact_threshold_trips() {
        let cb = breaker();
        cb.mark_success(Duration::from_millis(1));
        cb.mark_failure(Duration::from_millis(1));

        assert!(cb.is_open());
    }

    #[test]
    fn test_volume_threshold_guards_evaluation() {
        let config = BreakerConfig {
            request_volume_threshold: 5,
            ..BreakerConfig::default()
        };
        let cb = CircuitBreaker::new("volume", &config);
        for _ in 0..4 {
            cb.mark_failure(Duration::from_millis(1));
        }
        assert!(!cb.is_open());

        cb.mark_failure(Duration::from_millis(1));
        assert!(cb.is_open());
    }

    #[test]
    fn test_open_ignores_later_counters() {
        let cb = breaker();
        cb.mark_failure(Duration::from_millis(1));
        assert!(cb.is_open());

        cb.mark_failure(Duration::from_millis(1));
        assert!(cb.is_open());
    }
}
