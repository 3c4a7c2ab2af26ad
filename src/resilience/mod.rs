//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Command admitted by the engine:
//!     → circuit_breaker.rs (allow_request? trips on error rate in health.rs window)
//!     → retries.rs (re-run the body, waiting per backoff.rs)
//!     → timeouts.rs (deadline raced beside the retrying execution)
//!     → outcome recorded back into circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Breaker statistics live in a rolling time window, not lifetime totals
//! - Timeouts race the execution instead of cancelling it
//! - Timeouts do not count as breaker failures

pub mod backoff;
pub mod circuit_breaker;
pub mod health;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::CircuitBreaker;
pub use health::SlidingWindowHealth;
pub use timeouts::FOREVER;
