//! Unified error types for the courier core.
//!
//! Framework-level errors (dispatch failures) live in `courier-framework`;
//! runtime errors (configuration, startup) live in `courier-runtime`.

use thiserror::Error;

use crate::update::UpdateKind;

// =============================================================================
// Value Errors
// =============================================================================

/// Errors produced by the path accessors of [`Value`](crate::Value) and
/// [`Object`](crate::Object).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// An empty path was given.
    #[error("empty path")]
    EmptyPath,

    /// A path segment does not exist.
    #[error("missing key in path '{path}'")]
    MissingKey {
        /// The full path being resolved.
        path: String,
    },

    /// An intermediate segment resolved to something other than an object.
    #[error("cannot traverse '{path}': not an object")]
    NotAnObject {
        /// The path prefix that is not an object.
        path: String,
    },

    /// The value exists but has the wrong type.
    #[error("'{path}' is {found}, expected {expected}")]
    TypeMismatch {
        /// The full path being resolved.
        path: String,
        /// The expected type name.
        expected: &'static str,
        /// The actual type name.
        found: &'static str,
    },
}

// =============================================================================
// Classification Errors
// =============================================================================

/// Errors raised while determining the kind of an incoming update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// None of the recognized top-level keys is present.
    #[error("update carries no recognized kind (keys: {keys:?})")]
    Unclassified {
        /// The top-level keys that were present.
        keys: Vec<String>,
    },

    /// The payload under the recognized key is not an object.
    #[error("{kind} payload is {found}, expected object")]
    MalformedPayload {
        /// The kind whose key was found.
        kind: UpdateKind,
        /// The actual type name of the payload.
        found: &'static str,
    },
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur below the API envelope (network, encoding).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Invalid transport configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote API answered `ok: false`.
    #[error("API error ({code}): {description}")]
    Api {
        /// The `error_code` field of the envelope.
        code: i64,
        /// The `description` field of the envelope.
        description: String,
        /// Seconds to wait before retrying, when the API asks for it.
        retry_after: Option<u64>,
    },

    /// The response body was not a valid envelope.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The envelope was valid but the result had an unexpected shape.
    #[error("unexpected result for {method}: expected {expected}")]
    UnexpectedResult {
        /// The remote method name.
        method: String,
        /// The expected result shape.
        expected: &'static str,
    },

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Returns the number of seconds the API asked us to wait, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Errors raised when building an [`InputFile`](crate::InputFile).
#[derive(Debug, Error)]
pub enum InputFileError {
    /// The file name is empty.
    #[error("file name is empty")]
    EmptyName,

    /// The file contents are empty.
    #[error("file contents are empty")]
    EmptyData,

    /// Reading the source failed.
    #[error("failed to read file contents: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors that terminate an update source.
///
/// Transient failures (a failed poll, a bad request body) are handled inside
/// the source; only conditions the source cannot recover from surface here.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The webhook listener could not bind.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// A setup call against the remote API failed.
    #[error("source setup failed: {0}")]
    Setup(#[from] ApiError),

    /// The webhook route path is not usable.
    #[error("invalid webhook path: {0}")]
    InvalidRoute(String),

    /// The webhook server failed while serving.
    #[error("server error: {0}")]
    Server(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for path accessors.
pub type ValueResult<T> = Result<T, ValueError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for update sources.
pub type SourceResult<T> = Result<T, SourceError>;
