//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Channel name is not one of the known telemetry channels
    #[error("Unknown channel: {name}")]
    UnknownChannel { name: String },

    /// Emission mode name is not recognised
    #[error("Unknown emission mode: {name} (expected random or all)")]
    UnknownMode { name: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
