//! Error types for search index operations.

use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by an index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index service cannot be reached right now. Safe to retry.
    #[error("search index unavailable: {0}")]
    Unavailable(String),

    /// No schema was created for the collection.
    #[error("unknown index collection {0:?}")]
    UnknownCollection(String),

    /// A document carried a field the schema does not declare.
    #[error("field {field:?} is not declared in collection {collection:?}")]
    UnknownField {
        /// Target collection.
        collection: String,
        /// Offending field.
        field: String,
    },

    /// Two schema declarations disagree about a field.
    #[error("field {field:?} redeclared as {requested}, already {existing}")]
    SchemaConflict {
        /// Field name.
        field: String,
        /// Kind already in the schema.
        existing: String,
        /// Kind requested now.
        requested: String,
    },

    /// A document does not fit the schema.
    #[error("invalid document {id:?}: {message}")]
    InvalidDocument {
        /// Document id.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// The backend cannot perform the operation.
    #[error("unsupported index operation: {0}")]
    Unsupported(String),
}

impl IndexError {
    /// Returns true if retrying may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, IndexError::Unavailable(_))
    }

    /// Returns true if the error comes from a mapping or schema mistake that
    /// retrying cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            IndexError::UnknownCollection(_)
                | IndexError::UnknownField { .. }
                | IndexError::SchemaConflict { .. }
                | IndexError::InvalidDocument { .. }
                | IndexError::Unsupported(_)
        )
    }

    /// Create an invalid document error.
    pub fn invalid_document(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            message: message.into(),
        }
    }
}
