//! Error types for storage operations.
//!
//! "No rows found" is never an error at this layer: lookups return an empty
//! `Vec` or `None`. Everything in [`StoreError`] is a real failure of the
//! storage collaborator.

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A uniqueness or check constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Conflict(String),

    /// A record could not be converted to or from its stored form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage lock was poisoned by a panicking writer.
    #[error("Storage lock poisoned: {0}")]
    Lock(String),

    /// Invalid data provided (unknown column, unsupported value type).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The store could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns whether this error is a constraint violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
