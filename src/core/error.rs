//! Error types for controller operations.

use thiserror::Error;

/// Errors produced by the store boundary and the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The group or member disappeared.
    #[error("not found: {0}")]
    NotFound(String),
    /// A concurrent writer changed the object since it was read.
    #[error("conflict on {key}: expected version {expected}, found {actual}")]
    Conflict {
        /// Object key (`namespace/name`).
        key: String,
        /// Version the writer expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
    /// Store could not be reached or failed transiently.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure (thread spawn, runtime construction).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// Whether the failed work item should be requeued with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::StoreUnavailable(_))
    }

    /// Whether this is a `NotFound`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for ControllerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
