//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by the pure domain crates.
///
/// Storage faults never show up here; the infra crate has its own error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input that breaks a data rule (blank coupon code, malformed slug).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Lifecycle transition from the wrong state, e.g. consuming a used coupon.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
