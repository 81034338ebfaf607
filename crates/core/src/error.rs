//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Both variants are raised before any state is touched, so a record that
/// rejected an operation is exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The caller supplied a structurally invalid input (blank string,
    /// non-positive amount, out-of-range threshold or capacity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The input is well-formed but the current quantities do not allow the
    /// operation (insufficient stock or reservation, capacity exceeded).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

/// Fail with [`DomainError::InvalidArgument`] unless `amount` is strictly positive.
pub fn ensure_positive(amount: i64, what: &str) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::invalid_argument(format!(
            "{what} must be positive (got {amount})"
        )));
    }
    Ok(())
}
