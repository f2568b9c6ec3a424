//! Runtime error types.

use courier_core::{ApiError, SourceError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bot identity could not be fetched, so nothing was dispatched.
    #[error("Failed to fetch bot identity: {0}")]
    Startup(#[source] ApiError),

    /// The HTTP transport could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The update source stopped with an error.
    #[error("Update source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Update source panicked: {0}")]
    SourcePanicked(String),

    /// Source mode needs a cargo feature that is disabled.
    #[error("Feature `{feature}` is required for {what}")]
    FeatureDisabled {
        feature: &'static str,
        what: &'static str,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
