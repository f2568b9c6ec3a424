//! Error types for the courier framework.

use courier_core::{ClassifyError, UpdateKind};
use thiserror::Error;

/// A boxed error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why dispatching one update failed.
///
/// Both variants are local to the update: the pool logs them and moves on.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The update carried no recognized kind, or a malformed payload.
    /// No handler ran.
    #[error("failed to classify update: {0}")]
    Classify(#[from] ClassifyError),

    /// A matched handler failed; the rest of the chain was skipped.
    #[error("handler #{index} for {kind} failed: {source}")]
    Handler {
        /// The update kind whose chain was running.
        kind: UpdateKind,
        /// Position of the failing handler in its chain.
        index: usize,
        /// The handler's error.
        source: BoxError,
    },
}

impl DispatchError {
    /// The update kind, when classification succeeded.
    pub fn kind(&self) -> Option<UpdateKind> {
        match self {
            Self::Classify(ClassifyError::MalformedPayload { kind, .. }) => Some(*kind),
            Self::Classify(_) => None,
            Self::Handler { kind, .. } => Some(*kind),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
