//! Service instance descriptor.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

/// One running instance of a logical service.
///
/// Identity is the `uid` alone: two descriptors with the same uid are equal
/// even if every other field differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique instance id.
    pub uid: String,
    /// Logical service name shared by all instances.
    pub name: String,
    /// Endpoint address.
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ServiceDescriptor {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            url: url.into(),
            metadata: BTreeMap::new(),
            roles: Vec::new(),
            version: None,
        }
    }

    /// Descriptor with a random v4 UUID as its uid.
    pub fn generated(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name, url)
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for ServiceDescriptor {}

impl Hash for ServiceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] at {}", self.name, self.uid, self.url)?;
        if let Some(version) = &self.version {
            write!(f, " v{}", version)?;
        }
        Ok(())
    }
}
