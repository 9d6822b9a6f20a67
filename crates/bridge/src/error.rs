use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::token::Token;

/// Boxed error type used at the pipeline boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("correlation token {token} already registered")]
    DuplicateToken { token: Token },

    #[error("no pending slot for correlation token {token}")]
    UnknownToken { token: Token },
}

#[derive(Debug, Clone, Error)]
pub enum IngressError {
    #[error("ingress channel already has a subscriber")]
    AlreadySubscribed,

    #[error("ingress channel is closed")]
    Closed,
}

/// Why the pipeline stopped emitting.
#[derive(Debug, Clone)]
pub enum TerminationReason {
    /// The pipeline's output stream ended normally.
    Completed,
    /// The pipeline's output stream yielded an error.
    Failed(Arc<str>),
    /// The bridge was shut down deliberately.
    ShutDown,
}

impl TerminationReason {
    pub(crate) fn failed<S: ToString>(cause: S) -> Self {
        Self::Failed(cause.to_string().into())
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("pipeline output completed"),
            Self::Failed(cause) => write!(f, "pipeline failed: {cause}"),
            Self::ShutDown => f.write_str("bridge shut down"),
        }
    }
}

/// Errors surfaced to a caller of [`Bridge::call`](crate::bridge::Bridge::call).
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The shared pipeline stopped emitting; every waiting and future caller
    /// receives this until the bridge is reconstructed.
    #[error("pipeline terminated: {0}")]
    PipelineTerminated(TerminationReason),

    #[error("no response within {limit:?}")]
    Timeout { limit: Duration },

    #[error("registry rejected call: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },
}
