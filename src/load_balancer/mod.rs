//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! client.call(f) / client.call_async(f)
//!     → registry.services(query) (fresh candidate list, uid order)
//!     → round_robin.rs (counter % candidates)
//!     → f(descriptor), or ServiceNotFound when nothing matches
//! ```
//!
//! # Design Decisions
//! - Balancer is stateless apart from its counter; the registry owns instances
//! - Not session-sticky, not weighted

pub mod client;
pub mod round_robin;

use crate::registry::ServiceDescriptor;

pub use client::{Client, LoadBalancedClient};
pub use round_robin::RoundRobin;

/// Strategy picking one instance out of the current candidates.
pub trait LoadBalancer: Send + Sync {
    fn next_service(&self, candidates: &[ServiceDescriptor]) -> Option<ServiceDescriptor>;
}
