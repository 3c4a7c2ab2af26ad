//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::LoadBalancer;
use crate::registry::ServiceDescriptor;

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates; the candidate
/// list is re-read on every pick, so the rotation shifts as instances come and go.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_service(&self, candidates: &[ServiceDescriptor]) -> Option<ServiceDescriptor> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index).cloned()
    }
}
