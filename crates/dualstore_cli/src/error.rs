//! CLI error types.

use dualstore_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An input file is not valid JSON for the expected shape.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Output could not be rendered.
    #[error("cannot render output: {0}")]
    Render(#[from] serde_json::Error),

    /// Mapping or query rejected by the compiler.
    #[error("{kind}: {source}")]
    Core {
        /// Error classification.
        kind: dualstore_core::ErrorKind,
        /// Underlying error.
        source: CoreError,
    },
}

impl From<CoreError> for CliError {
    fn from(source: CoreError) -> Self {
        CliError::Core {
            kind: source.kind(),
            source,
        }
    }
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
