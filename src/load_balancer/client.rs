//! Load-balanced service client.
//!
//! # Responsibilities
//! - Resolve the current candidates for a query on every call
//! - Pick one with the configured balancer
//! - Hand the chosen descriptor to caller-supplied code
//!
//! # Design Decisions
//! - No transport here; the caller's closure does the actual call
//! - Selection happens when `call`/`call_async` is invoked, not when awaited

use std::future::Future;
use std::sync::Arc;

use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::LoadBalancer;
use crate::registry::{DiscoveryError, ServiceDescriptor, ServiceQuery, ServiceRegistry};

/// Something that can route a call to one instance of a service.
pub trait Client {
    fn query(&self) -> &ServiceQuery;

    fn best_service(&self) -> Option<ServiceDescriptor>;

    /// Run `f` against the selected instance.
    fn call<T, F>(&self, f: F) -> Result<T, DiscoveryError>
    where
        F: FnOnce(&ServiceDescriptor) -> T,
    {
        let descriptor = self.best_service().ok_or_else(|| self.query().not_found())?;
        Ok(f(&descriptor))
    }

    /// Run the async `f` against the selected instance.
    fn call_async<T, E, F, Fut>(&self, f: F) -> impl Future<Output = Result<T, E>> + Send
    where
        F: FnOnce(ServiceDescriptor) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: From<DiscoveryError>,
    {
        let selected = self.best_service().ok_or_else(|| self.query().not_found());
        async move {
            let descriptor = selected.map_err(E::from)?;
            f(descriptor).await
        }
    }
}

/// Round-robin client over the instances matching one query.
pub struct LoadBalancedClient {
    registry: Arc<dyn ServiceRegistry>,
    query: ServiceQuery,
    balancer: Box<dyn LoadBalancer>,
}

impl LoadBalancedClient {
    pub fn new(registry: Arc<dyn ServiceRegistry>, query: ServiceQuery) -> Self {
        Self::with_balancer(registry, query, Box::new(RoundRobin::new()))
    }

    pub fn with_balancer(
        registry: Arc<dyn ServiceRegistry>,
        query: ServiceQuery,
        balancer: Box<dyn LoadBalancer>,
    ) -> Self {
        Self {
            registry,
            query,
            balancer,
        }
    }
}

impl Client for LoadBalancedClient {
    fn query(&self) -> &ServiceQuery {
        &self.query
    }

    fn best_service(&self) -> Option<ServiceDescriptor> {
        let candidates = self.registry.services(&self.query);
        let selected = self.balancer.next_service(&candidates);
        match &selected {
            Some(d) => tracing::debug!(
                query = %self.query,
                uid = %d.uid,
                candidates = candidates.len(),
                "Selected service instance"
            ),
            None => tracing::debug!(query = %self.query, "No service instance available"),
        }
        selected
    }
}

impl std::fmt::Debug for LoadBalancedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancedClient")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryServiceRegistry;

    fn registry() -> InMemoryServiceRegistry {
        InMemoryServiceRegistry::from_services([
            ServiceDescriptor::new("a", "users", "http://a"),
            ServiceDescriptor::new("b", "users", "http://b"),
            ServiceDescriptor::new("c", "orders", "http://c"),
        ])
    }

    #[test]
    fn test_call_rotates_instances() {
        let client = registry().client(ServiceQuery::new("users"));
        let urls: Vec<String> = (0..4)
            .map(|_| client.call(|d| d.url.clone()).unwrap())
            .collect();
        assert_eq!(urls, vec!["http://a", "http://b", "http://a", "http://b"]);
    }

    #[test]
    fn test_call_without_match_fails() {
        let client = registry().client(ServiceQuery::new("billing").version("1"));
        let err = client.call(|d| d.url.clone()).unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::ServiceNotFound {
                name: "billing".into(),
                version: Some("1".into()),
                roles: vec![],
            }
        );
    }

    #[test]
    fn test_candidates_recomputed_per_call() {
        let registry = registry();
        let client = registry.client(ServiceQuery::new("users"));
        assert!(client.best_service().is_some());

        registry.unregister("a");
        registry.unregister("b");
        assert!(client.best_service().is_none());

        registry.register(ServiceDescriptor::new("d", "users", "http://d"));
        assert_eq!(client.best_service().map(|d| d.uid), Some("d".to_string()));
    }

    #[tokio::test]
    async fn test_call_async() {
        let client = registry().client(ServiceQuery::new("orders"));
        let result: Result<String, DiscoveryError> = client
            .call_async(|d| async move { Ok(format!("{}/ping", d.url)) })
            .await;
        assert_eq!(result.unwrap(), "http://c/ping");

        let missing = registry().client(ServiceQuery::new("billing"));
        let result: Result<String, DiscoveryError> = missing
            .call_async(|d| async move { Ok(d.url) })
            .await;
        assert!(matches!(result, Err(DiscoveryError::ServiceNotFound { .. })));
    }
}
