//! # Database Errors
//!
//! Error types for the database seam. Driver messages are kept here for
//! logging only; they are never surfaced to HTTP callers.

use thiserror::Error;

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Database errors
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Pool exhausted, connection refused, or transaction could not begin
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Unique-key violation
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    /// Any other driver-level failure
    #[error("query failed: {0}")]
    Query(String),
}

impl DbError {
    /// Returns true for unique-key violations
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Duplicate(_))
    }
}
