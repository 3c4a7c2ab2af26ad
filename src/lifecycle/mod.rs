//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     CommandEngine::shutdown / RequestCollapser::stop
//!     → Shutdown::trigger
//!     → flush loop leaves its select! and the timer thread exits
//! ```
//!
//! # Design Decisions
//! - Background loops never outlive their owner; dropping stops them too
//! - Stop is abrupt: queued work is abandoned, not drained

pub mod shutdown;

pub use shutdown::Shutdown;
