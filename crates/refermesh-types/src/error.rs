//! The shared error taxonomy.
//!
//! Every service reports failures through `CoreError`; the API layer maps
//! each kind onto an HTTP status. Services do not swallow errors, with two
//! deliberate exceptions handled at the service layer: a duplicate
//! idempotency key is converted into success, and re-accepting an accepted
//! match returns the existing agreement.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Error kinds for the transactional core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid authentication context.
    #[error("unauthorized")]
    Unauthorized,

    /// Authorization failed on role or ownership.
    #[error("forbidden")]
    Forbidden,

    /// Entity absent, or an ownership mismatch surfaced as absence.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation (duplicate match, duplicate email).
    #[error("{0}")]
    Conflict(String),

    /// Disallowed state transition or operation on a terminal state.
    #[error("{0}")]
    InvalidState(String),

    /// Replay of an already-applied idempotency key. Treated as success by
    /// the callers that can observe it.
    #[error("duplicate idempotency key")]
    DuplicateIdempotencyKey,

    /// Storage or transport failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] sqlx::Error),
}

impl CoreError {
    /// Stable machine-readable code for logs and API clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::Unauthorized => "unauthorized",
            CoreError::Forbidden => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidState(_) => "invalid_state",
            CoreError::DuplicateIdempotencyKey => "duplicate_idempotency_key",
            CoreError::Infrastructure(_) => "infrastructure",
        }
    }

    /// True when the underlying sqlx error is a Postgres unique violation.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::Validation("x".into()).code(), "validation_error");
        assert_eq!(CoreError::Forbidden.code(), "forbidden");
        assert_eq!(CoreError::NotFound("match").code(), "not_found");
        assert_eq!(CoreError::DuplicateIdempotencyKey.code(), "duplicate_idempotency_key");
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(CoreError::NotFound("agreement").to_string(), "agreement not found");
    }
}
