//! Service discovery through the registry and load-balanced clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use resilient_client::command::{BoxError, CommandError, FnCommand};
use resilient_client::config::loader::parse_config;
use resilient_client::load_balancer::Client;
use resilient_client::registry::{DiscoveryError, InMemoryServiceRegistry, ServiceQuery};

mod common;
use common::{descriptor, engine};

#[test]
fn test_round_robin_visits_every_instance() {
    let registry = InMemoryServiceRegistry::from_services([
        descriptor("a", "users"),
        descriptor("b", "users"),
        descriptor("c", "users"),
        descriptor("x", "orders"),
    ]);
    let client = registry.client(ServiceQuery::new("users"));

    let mut picks: HashMap<String, usize> = HashMap::new();
    for _ in 0..9 {
        let uid = client.call(|d| d.uid.clone()).unwrap();
        *picks.entry(uid).or_default() += 1;
    }
    assert_eq!(picks.len(), 3);
    assert!(picks.values().all(|&n| n == 3));
}

#[test]
fn test_client_follows_registry_changes() {
    let registry = InMemoryServiceRegistry::new();
    let client = registry.client(ServiceQuery::new("users"));
    assert!(client.best_service().is_none());

    let a = registry.register(descriptor("a", "users"));
    assert_eq!(client.call(|d| d.uid.clone()).unwrap(), "a");

    let _b = registry.register(descriptor("b", "users"));
    a.unregister();
    a.unregister();
    assert!(!a.is_active());

    for _ in 0..3 {
        assert_eq!(client.call(|d| d.uid.clone()).unwrap(), "b");
    }
}

#[test]
fn test_missing_service_reports_query() {
    let registry = InMemoryServiceRegistry::from_services([descriptor("a", "users").with_version("1")]);
    let query = ServiceQuery::new("users").version("2").roles(["admin"]);

    let error = registry.client(query).call(|d| d.uid.clone()).unwrap_err();
    assert_eq!(
        error,
        DiscoveryError::ServiceNotFound {
            name: "users".into(),
            version: Some("2".into()),
            roles: vec!["admin".into()],
        }
    );
    assert_eq!(
        error.to_string(),
        r#"Service not found users, Some("2"), ["admin"]"#
    );
}

#[test]
fn test_role_filter_requires_every_instance_role() {
    let registry = InMemoryServiceRegistry::from_services([
        descriptor("reader", "users").with_roles(["read"]),
        descriptor("writer", "users").with_roles(["read", "write"]),
    ]);

    let readers = registry.services(&ServiceQuery::new("users").roles(["read"]));
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].uid, "reader");

    let both = registry.services(&ServiceQuery::new("users").roles(["read", "write"]));
    assert_eq!(both.len(), 2);
}

#[tokio::test]
async fn test_call_async_inside_command() {
    let registry = InMemoryServiceRegistry::from_services([descriptor("a", "users")]);
    let client = Arc::new(registry.client(ServiceQuery::new("users")));
    let engine = engine(10);

    let lookup = Arc::clone(&client);
    let command = FnCommand::new("resolve-users", move || {
        let lookup = Arc::clone(&lookup);
        async move {
            lookup
                .call_async(|d| async move { Ok::<_, BoxError>(d.url) })
                .await
        }
    })
    .with_timeout(Duration::from_secs(1));

    assert_eq!(
        engine.execute(command).await.unwrap(),
        "http://a.local:8080"
    );
}

#[tokio::test]
async fn test_missing_service_fails_command() {
    let registry = InMemoryServiceRegistry::new();
    let client = Arc::new(registry.client(ServiceQuery::new("ghost")));
    let engine = engine(10);

    let command = FnCommand::new("resolve-ghost", move || {
        let client = Arc::clone(&client);
        async move {
            client
                .call_async(|d| async move { Ok::<_, BoxError>(d.uid) })
                .await
        }
    });

    let error = engine.execute(command).await.unwrap_err();
    assert!(matches!(error, CommandError::Execution(_)));
    assert!(matches!(
        error.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::ServiceNotFound { .. })
    ));
}

#[test]
fn test_registry_from_config() {
    let config = parse_config(
        r#"
[[services]]
uid = "users-1"
name = "users"
url = "http://users-1:8080"
version = "2"
roles = ["read"]

[[services]]
uid = "users-2"
name = "users"
url = "http://users-2:8080"
"#,
    )
    .unwrap();

    let registry = InMemoryServiceRegistry::from_services(config.services);
    assert_eq!(registry.len(), 2);

    let v2 = registry.service(&ServiceQuery::new("users").version("2")).unwrap();
    assert_eq!(v2.uid, "users-1");
    assert_eq!(v2.roles, vec!["read".to_string()]);
}
