use thiserror::Error;

use forgepos_core::DomainError;

/// Error surfaced by [`crate::service::PosService`].
#[derive(Debug, Error)]
pub enum PosError {
    /// Malformed input or an invalid identifier.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The operation conflicts with the record's current state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Concurrent modification or a poisoned store.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A required call context value was absent.
    #[error("missing context: {0}")]
    MissingContext(String),
    #[error("configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
}

impl From<DomainError> for PosError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => PosError::Validation(msg),
            DomainError::InvalidId(msg) => PosError::Validation(msg),
            DomainError::InvariantViolation(msg) => PosError::InvariantViolation(msg),
            DomainError::NotFound(msg) => PosError::NotFound(msg),
            DomainError::Conflict(msg) => PosError::Conflict(msg),
            DomainError::Unauthorized(msg) => PosError::Unauthorized(msg),
            DomainError::MissingContext(key) => PosError::MissingContext(key),
        }
    }
}
