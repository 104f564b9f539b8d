//! CLI command implementations.

pub mod check_fields;
pub mod explain;

use crate::error::{CliError, CliResult};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Reads and parses a JSON input file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "input read");
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}
