//! Sliding-window request health.
//!
//! # Responsibilities
//! - Count total/success/error outcomes inside a trailing time window
//! - Accumulate observed latency for the same window
//! - Derive the error percentage the circuit breaker trips on
//!
//! # Design Decisions
//! - Each counter is split into ten buckets of `window / 10`; a bucket ages
//!   out as a whole once its start falls outside the window
//! - Counters are independent, so a reader may observe them mid-update

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const BUCKETS_PER_WINDOW: u32 = 10;

#[derive(Debug)]
struct Bucket {
    start: Instant,
    value: u64,
}

/// Event counter that only reports what happened during the last `window`.
#[derive(Debug)]
pub struct RollingCounter {
    window: Duration,
    bucket_width: Duration,
    buckets: Mutex<VecDeque<Bucket>>,
}

impl RollingCounter {
    pub fn new(window: Duration) -> Self {
        let bucket_width = (window / BUCKETS_PER_WINDOW).max(Duration::from_millis(1));
        Self {
            window,
            bucket_width,
            buckets: Mutex::new(VecDeque::with_capacity(BUCKETS_PER_WINDOW as usize + 1)),
        }
    }

    pub fn increment(&self) {
        self.add(1);
    }

    /// Add `value` to the bucket covering "now".
    pub fn add(&self, value: u64) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict(&mut buckets, now);

        match buckets.back_mut() {
            Some(bucket) if now.duration_since(bucket.start) < self.bucket_width => {
                bucket.value = bucket.value.saturating_add(value);
            }
            _ => buckets.push_back(Bucket { start: now, value }),
        }
    }

    /// Sum of everything recorded inside the window.
    pub fn sum(&self) -> u64 {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict(&mut buckets, Instant::now());
        buckets.iter().map(|b| b.value).sum()
    }

    pub fn reset(&self) {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn evict(&self, buckets: &mut VecDeque<Bucket>, now: Instant) {
        while let Some(front) = buckets.front() {
            if now.duration_since(front.start) >= self.window {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rolling request statistics for one breaker.
#[derive(Debug)]
pub struct SlidingWindowHealth {
    window: Duration,
    total: RollingCounter,
    errors: RollingCounter,
    successes: RollingCounter,
    total_time_ms: RollingCounter,
}

impl SlidingWindowHealth {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            total: RollingCounter::new(window),
            errors: RollingCounter::new(window),
            successes: RollingCounter::new(window),
            total_time_ms: RollingCounter::new(window),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a successful call and its latency.
    pub fn mark_success(&self, elapsed: Duration) {
        self.total.increment();
        self.successes.increment();
        self.total_time_ms.add(elapsed.as_millis() as u64);
    }

    /// Record a failed call and its latency.
    pub fn mark_failure(&self, elapsed: Duration) {
        self.total.increment();
        self.errors.increment();
        self.total_time_ms.add(elapsed.as_millis() as u64);
    }

    pub fn total_requests(&self) -> u64 {
        self.total.sum()
    }

    pub fn error_count(&self) -> u64 {
        self.errors.sum()
    }

    pub fn success_count(&self) -> u64 {
        self.successes.sum()
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_millis(self.total_time_ms.sum())
    }

    /// `errors * 100 / total`, or 0 when the window is empty.
    pub fn error_percentage(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.error_count() as f64 * 100.0 / total as f64
    }

    /// Drop everything recorded so far.
    pub fn reset(&self) {
        self.total.reset();
        self.errors.reset();
        self.successes.reset();
        self.total_time_ms.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_within_window() {
        let health = SlidingWindowHealth::new(Duration::from_secs(10));
        health.mark_success(Duration::from_millis(20));
        health.mark_failure(Duration::from_millis(30));
        health.mark_failure(Duration::from_millis(50));

        assert_eq!(health.total_requests(), 3);
        assert_eq!(health.error_count(), 2);
        assert_eq!(health.success_count(), 1);
        assert_eq!(health.total_time(), Duration::from_millis(100));
        assert!((health.error_percentage() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_window_has_no_errors() {
        let health = SlidingWindowHealth::new(Duration::from_secs(1));
        assert_eq!(health.error_percentage(), 0.0);
    }

    #[test]
    fn test_events_age_out() {
        let counter = RollingCounter::new(Duration::from_millis(50));
        counter.increment();
        counter.increment();
        assert_eq!(counter.sum(), 2);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(counter.sum(), 0);

        counter.increment();
        assert_eq!(counter.sum(), 1);
    }

    #[test]
    fn test_reset_clears_all_counters() {
        let health = SlidingWindowHealth::new(Duration::from_secs(10));
        health.mark_failure(Duration::from_millis(5));
        health.reset();

        assert_eq!(health.total_requests(), 0);
        assert_eq!(health.error_count(), 0);
        assert_eq!(health.total_time(), Duration::ZERO);
    }
}
