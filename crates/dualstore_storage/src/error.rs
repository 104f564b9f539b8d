//! Error types for relational store operations.

use thiserror::Error;

/// Result type for relational store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a record backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store cannot be reached right now. Safe to retry.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A concurrent writer got there first. Safe to retry.
    #[error("write conflict on {table}/{id}")]
    WriteConflict {
        /// Table of the conflicting row.
        table: String,
        /// Id of the conflicting row.
        id: String,
    },

    /// A row was rejected by the backend.
    #[error("invalid row for table {table}: {message}")]
    InvalidRow {
        /// Target table.
        table: String,
        /// Why the row was rejected.
        message: String,
    },

    /// The session was already committed or rolled back.
    #[error("session is closed")]
    Closed,

    /// Backend-specific failure that is not worth retrying.
    #[error("record store error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns true if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::WriteConflict { .. }
        )
    }

    /// Create an invalid row error.
    pub fn invalid_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            table: table.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transience() {
        assert!(StorageError::Unavailable("down".into()).is_transient());
        assert!(!StorageError::Closed.is_transient());
        assert!(!StorageError::invalid_row("t", "no id").is_transient());
    }
}
