//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, durations via duration.rs)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → CommandEngine::from_config / InMemoryServiceRegistry::from_services
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → caller builds a new engine from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes produce new engines
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::BreakerConfig;
pub use schema::BreakerStrategy;
pub use schema::CacheConfig;
pub use schema::ClientConfig;
pub use schema::CollapserConfig;
pub use schema::EngineConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
