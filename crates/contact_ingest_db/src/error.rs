//! Error types for the data access layer.

use thiserror::Error;

/// Data access layer result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by the data access layer.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Serialization error (row hash canonicalization)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied data did not satisfy a precondition (e.g. empty
    /// contact field, empty user id).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
