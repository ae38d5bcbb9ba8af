//! Session error types.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session not found.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The record cannot be stored as given.
    #[error("Session invalid: {0}")]
    Invalid(String),

    /// Storage error.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
