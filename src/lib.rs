//! Client-side resilience and service discovery.
//!
//! Commands run through a [`CommandEngine`] that applies admission control,
//! circuit breaking, timeouts, retries, caching and request collapsing.
//! Remote instances are found through a [`ServiceRegistry`] and picked
//! round-robin by a [`LoadBalancedClient`].

pub mod command;
pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use command::{Command, CommandEngine, CommandError, CommandResult, Execution, FnCommand};
pub use config::schema::ClientConfig;
pub use lifecycle::Shutdown;
pub use load_balancer::{Client, LoadBalancedClient};
pub use registry::memory::InMemoryServiceRegistry;
pub use registry::{ServiceDescriptor, ServiceQuery, ServiceRegistry};
