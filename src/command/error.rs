//! Command error definitions.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::registry::DiscoveryError;

/// Boxed error returned by command bodies and fallbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shareable error; every waiter on an execution gets a clone.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the command engine.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The breaker for this command is open.
    #[error("The circuit is open")]
    CircuitOpen,

    /// Admission control refused the command.
    #[error("Max allowed request is {0}")]
    TooManyConcurrentRequests(usize),

    /// The command did not settle within its timeout.
    #[error("Request timeout ({0:?})")]
    Timeout(Duration),

    /// The command body failed and no fallback value was available.
    #[error(transparent)]
    Execution(SharedError),

    /// The fallback itself failed.
    #[error("Fallback failed: {0}")]
    Fallback(#[source] SharedError),

    /// The execution was dropped before settling (engine or collapser stopped).
    #[error("Execution abandoned before completion")]
    Abandoned,
}

impl CommandError {
    pub fn execution(error: BoxError) -> Self {
        CommandError::Execution(Arc::from(error))
    }

    pub fn fallback(error: BoxError) -> Self {
        CommandError::Fallback(Arc::from(error))
    }

    /// Underlying error of an `Execution` failure, downcast to `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            CommandError::Execution(e) | CommandError::Fallback(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::CircuitOpen => "circuit_open",
            CommandError::TooManyConcurrentRequests(_) => "too_many_requests",
            CommandError::Timeout(_) => "timeout",
            CommandError::Execution(_) => "error",
            CommandError::Fallback(_) => "fallback_error",
            CommandError::Abandoned => "abandoned",
        }
    }
}

impl From<DiscoveryError> for CommandError {
    fn from(error: DiscoveryError) -> Self {
        CommandError::Execution(Arc::new(error))
    }
}

/// Result type for command executions.
pub type CommandResult<T> = Result<T, CommandError>;
