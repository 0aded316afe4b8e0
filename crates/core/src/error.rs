//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant except `Internal` is operational: its message is safe to
/// show to a client. `Internal` messages are logged server-side only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or missing input).
    #[error("Invalid input data. {0}")]
    Validation(String),

    /// A requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A unique constraint was violated.
    #[error("Duplicate field value: {0}. Please use another value")]
    Conflict(String),

    /// Authentication failure (missing/invalid/stale credentials).
    #[error("{0}")]
    Unauthorized(String),

    /// The authenticated user lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// An identifier could not be parsed.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Unexpected failure; message is not shown to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Aggregate several validation messages into one client-readable error.
    pub fn validation_all(msgs: Vec<String>) -> Self {
        Self::Validation(msgs.join(". "))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to perform this action".to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the message is safe to surface to clients as-is.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}
