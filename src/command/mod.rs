//! Command execution subsystem.
//!
//! # Data Flow
//! ```text
//! Command (definition.rs)
//!     → engine.rs (admission: cache, breaker, concurrency limit)
//!     → collapser.rs (optional, keyed batching per flush window)
//!     → promise.rs (first of body / deadline settles the execution)
//!     → Execution<T> (shared future, awaited by any number of callers)
//! ```
//!
//! # Design Decisions
//! - Failures are values: every execution resolves to `CommandResult<T>`
//! - Commands are stateless descriptions; runtime state lives in the engine
//! - Cache and collapser store type-erased executions and downcast on read

pub mod cache;
pub mod collapser;
pub mod definition;
pub mod engine;
pub mod error;
pub mod promise;

pub use cache::{CachedExecution, CommandCache, InMemoryCommandCache};
pub use collapser::RequestCollapser;
pub use definition::{Command, FnCommand, DEFAULT_TIMEOUT};
pub use engine::{CommandEngine, DEFAULT_BREAKER_KEY};
pub use error::{BoxError, CommandError, CommandResult, SharedError};
pub use promise::Execution;
