//! Error types for the persistence layer.

use dualstore_codec::CodecError;
use dualstore_index::IndexError;
use dualstore_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for persistence operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by stores, the query compiler and the reindexer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A lookup required the object to exist and it did not.
    #[error("{entity_type} {id} not found")]
    MissingObject {
        /// Entity type name.
        entity_type: String,
        /// Requested id.
        id: String,
    },

    /// A save would violate a uniqueness or state invariant.
    #[error("conflict on {entity_type} {id}: {message}")]
    Conflict {
        /// Entity type name.
        entity_type: String,
        /// Id of the rejected entity.
        id: String,
        /// Which invariant was violated.
        message: String,
    },

    /// A mapping, field table or schema is wrong. Never retried.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is misconfigured.
        message: String,
    },

    /// The query asks for something the target backend cannot express.
    #[error("unsupported parameter: {message}")]
    UnsupportedParameter {
        /// Which parameter and why.
        message: String,
    },

    /// The caller passed an invalid argument.
    #[error("bad argument: {message}")]
    BadArgument {
        /// What is wrong with it.
        message: String,
    },

    /// The transaction was already committed or rolled back.
    #[error("transaction is {state}")]
    TransactionInactive {
        /// State the transaction is in.
        state: String,
    },

    /// Error from the record store.
    #[error("record store: {0}")]
    Storage(#[from] StorageError),

    /// Error from the search index.
    #[error("search index: {0}")]
    Index(#[from] IndexError),

    /// Error converting values.
    #[error("value conversion: {0}")]
    Codec(#[from] CodecError),
}

/// Coarse classification of a [`CoreError`], for callers mapping errors to
/// responses or retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Not found.
    MissingObject,
    /// Uniqueness or state conflict.
    Conflict,
    /// Mapping or schema mistake.
    Configuration,
    /// Backend momentarily unavailable; retry is safe.
    Transient,
    /// Query shape the backend cannot express.
    UnsupportedParameter,
    /// Invalid input.
    BadArgument,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingObject => "missing object",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transient => "transient",
            ErrorKind::UnsupportedParameter => "unsupported parameter",
            ErrorKind::BadArgument => "bad argument",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl CoreError {
    /// Classifies the error, looking through wrapped backend errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::MissingObject { .. } => ErrorKind::MissingObject,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::Configuration { .. } => ErrorKind::Configuration,
            CoreError::UnsupportedParameter { .. } => ErrorKind::UnsupportedParameter,
            CoreError::BadArgument { .. } => ErrorKind::BadArgument,
            CoreError::Storage(e) if e.is_transient() => ErrorKind::Transient,
            CoreError::Index(e) if e.is_transient() => ErrorKind::Transient,
            CoreError::Index(e) if e.is_configuration() => ErrorKind::Configuration,
            CoreError::TransactionInactive { .. }
            | CoreError::Storage(_)
            | CoreError::Index(_)
            | CoreError::Codec(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Create a missing object error.
    pub fn missing(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::MissingObject {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(
        entity_type: impl Into<String>,
        id: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            entity_type: entity_type.into(),
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported parameter error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedParameter {
            message: message.into(),
        }
    }

    /// Create a bad argument error.
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_are_classified() {
        let down = CoreError::from(StorageError::Unavailable("connection refused".into()));
        assert_eq!(down.kind(), ErrorKind::Transient);
        assert!(down.is_retryable());

        let unmapped = CoreError::from(IndexError::UnknownField {
            collection: "producer".into(),
            field: "colour".into(),
        });
        assert_eq!(unmapped.kind(), ErrorKind::Configuration);
        assert!(!unmapped.is_retryable());

        let closed = CoreError::from(StorageError::Closed);
        assert_eq!(closed.kind(), ErrorKind::Internal);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            CoreError::missing("producer", "p-1").to_string(),
            "producer p-1 not found"
        );
        assert_eq!(
            CoreError::unsupported("sort on body").to_string(),
            "unsupported parameter: sort on body"
        );
    }
}
