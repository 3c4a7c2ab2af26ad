//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Service instance starts
//!     → register(ServiceDescriptor) → Registration handle
//!     → memory.rs stores it keyed by uid (first registration wins)
//!
//! Caller looks up a service
//!     → ServiceQuery { name, version?, roles }
//!     → services() filters the sorted instance list
//!     → load_balancer picks one of the matches
//!
//! Instance goes away
//!     → Registration::unregister() (idempotent) or unregister(uid)
//! ```
//!
//! # Design Decisions
//! - In-process map only; no gossip, no persistence
//! - Role filter is all-of on the instance's roles, not any-overlap
//! - Instances are listed in uid order so round-robin sees a stable sequence

pub mod descriptor;
pub mod memory;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

pub use descriptor::ServiceDescriptor;
pub use memory::InMemoryServiceRegistry;

/// Errors raised by service lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// No registered instance matched the query.
    #[error("Service not found {name}, {version:?}, {roles:?}")]
    ServiceNotFound {
        name: String,
        version: Option<String>,
        roles: Vec<String>,
    },
}

/// Filter applied to the registered instances.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceQuery {
    pub name: String,
    pub version: Option<String>,
    pub roles: Vec<String>,
}

impl ServiceQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            roles: Vec::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Exact name, exact version when given, and every instance role inside
    /// the role filter when one is given.
    pub fn matches(&self, descriptor: &ServiceDescriptor) -> bool {
        if descriptor.name != self.name {
            return false;
        }
        if self.version.is_some() && self.version != descriptor.version {
            return false;
        }
        if !self.roles.is_empty() {
            return descriptor.roles.iter().all(|role| self.roles.contains(role));
        }
        true
    }

    pub fn not_found(&self) -> DiscoveryError {
        DiscoveryError::ServiceNotFound {
            name: self.name.clone(),
            version: self.version.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl fmt::Display for ServiceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        if !self.roles.is_empty() {
            write!(f, " [{}]", self.roles.join(", "))?;
        }
        Ok(())
    }
}

type Cancel = Box<dyn FnOnce() + Send>;

/// Handle returned by `register`; cancels that registration.
pub struct Registration {
    uid: String,
    cancel: Mutex<Option<Cancel>>,
}

impl Registration {
    pub fn new<F>(uid: impl Into<String>, cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            uid: uid.into(),
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Remove the registration. Only the first call has an effect.
    pub fn unregister(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("uid", &self.uid)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Synchronous registry of service instances.
pub trait ServiceRegistry: Send + Sync {
    fn all_services(&self) -> Vec<ServiceDescriptor>;

    /// Insert unless the uid is already present.
    fn register(&self, descriptor: ServiceDescriptor) -> Registration;

    /// Remove by uid. Returns whether an instance was removed.
    fn unregister(&self, uid: &str) -> bool;

    fn services(&self, query: &ServiceQuery) -> Vec<ServiceDescriptor> {
        self.all_services()
            .into_iter()
            .filter(|d| query.matches(d))
            .collect()
    }

    fn service(&self, query: &ServiceQuery) -> Option<ServiceDescriptor> {
        self.services(query).into_iter().next()
    }
}

/// Registry whose backend answers asynchronously.
#[async_trait]
pub trait AsyncServiceRegistry: Send + Sync {
    async fn all_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError>;

    async fn register(&self, descriptor: ServiceDescriptor) -> Result<Registration, DiscoveryError>;

    async fn unregister(&self, uid: &str) -> Result<(), DiscoveryError>;

    async fn services(&self, query: &ServiceQuery) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        let all = self.all_services().await?;
        Ok(all.into_iter().filter(|d| query.matches(d)).collect())
    }

    async fn service(&self, query: &ServiceQuery) -> Result<Option<ServiceDescriptor>, DiscoveryError> {
        Ok(self.services(query).await?.into_iter().next())
    }
}
