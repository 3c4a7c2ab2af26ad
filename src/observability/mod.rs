//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine, breakers, collapser, registry produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`command`, `breaker`, `key`) on every event
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
