//! In-memory service registry.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::load_balancer::LoadBalancedClient;
use crate::registry::{
    AsyncServiceRegistry, DiscoveryError, Registration, ServiceDescriptor, ServiceQuery,
    ServiceRegistry,
};

/// Registry backed by a concurrent map keyed by uid.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceRegistry {
    services: Arc<DashMap<String, ServiceDescriptor>>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `services`; their handles are discarded.
    pub fn from_services<I>(services: I) -> Self
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        let registry = Self::new();
        for descriptor in services {
            let _ = registry.register(descriptor);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Every instance, ordered by uid.
    pub fn all_services(&self) -> Vec<ServiceDescriptor> {
        let mut all: Vec<ServiceDescriptor> =
            self.services.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.uid.cmp(&b.uid));
        all
    }

    /// Insert unless the uid is already present.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Registration {
        let uid = descriptor.uid.clone();
        let mut inserted = false;
        self.services.entry(uid.clone()).or_insert_with(|| {
            inserted = true;
            descriptor
        });

        if inserted {
            tracing::debug!(uid = %uid, "Service registered");
        } else {
            tracing::debug!(uid = %uid, "Service already registered, keeping existing entry");
        }

        let services = Arc::clone(&self.services);
        let key = uid.clone();
        Registration::new(uid, move || {
            if services.remove(&key).is_some() {
                tracing::debug!(uid = %key, "Service unregistered");
            }
        })
    }

    pub fn unregister(&self, uid: &str) -> bool {
        self.services.remove(uid).is_some()
    }

    pub fn services(&self, query: &ServiceQuery) -> Vec<ServiceDescriptor> {
        ServiceRegistry::services(self, query)
    }

    pub fn service(&self, query: &ServiceQuery) -> Option<ServiceDescriptor> {
        ServiceRegistry::service(self, query)
    }

    /// Round-robin client over the instances matching `query`.
    pub fn client(&self, query: ServiceQuery) -> LoadBalancedClient {
        LoadBalancedClient::new(Arc::new(self.clone()), query)
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn all_services(&self) -> Vec<ServiceDescriptor> {
        InMemoryServiceRegistry::all_services(self)
    }

    fn register(&self, descriptor: ServiceDescriptor) -> Registration {
        InMemoryServiceRegistry::register(self, descriptor)
    }

    fn unregister(&self, uid: &str) -> bool {
        InMemoryServiceRegistry::unregister(self, uid)
    }
}

#[async_trait]
impl AsyncServiceRegistry for InMemoryServiceRegistry {
    async fn all_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        Ok(InMemoryServiceRegistry::all_services(self))
    }

    async fn register(&self, descriptor: ServiceDescriptor) -> Result<Registration, DiscoveryError> {
        Ok(InMemoryServiceRegistry::register(self, descriptor))
    }

    async fn unregister(&self, uid: &str) -> Result<(), DiscoveryError> {
        InMemoryServiceRegistry::unregister(self, uid);
        Ok(())
    }
}
