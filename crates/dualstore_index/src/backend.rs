//! Index backend trait.

use crate::document::{IndexDocument, IndexSchema};
use crate::error::{IndexError, IndexResult};
use crate::query::{SearchHits, SearchRequest};

/// A search index service holding derived documents.
///
/// The index is a cache of the record store: anything in it can be rebuilt
/// from the records, so backends are free to lag behind.
///
/// # Implementors
///
/// - [`super::InMemoryIndex`] - reference implementation for tests and tools
pub trait IndexBackend: Send + Sync {
    /// Creates the collection or merges new field declarations into it.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::SchemaConflict` if a field changes kind.
    fn ensure_schema(&self, schema: &IndexSchema) -> IndexResult<()>;

    /// Whether [`IndexBackend::drop_schema`] is implemented.
    fn supports_schema_management(&self) -> bool {
        false
    }

    /// Drops a collection with all its documents.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Unsupported` unless the backend manages schemas.
    fn drop_schema(&self, collection: &str) -> IndexResult<()> {
        Err(IndexError::Unsupported(format!(
            "dropping collection {collection:?}"
        )))
    }

    /// Inserts or replaces documents (with their children) by id.
    ///
    /// # Errors
    ///
    /// Returns a configuration-kind error if a document does not fit the schema.
    fn upsert(&self, collection: &str, documents: Vec<IndexDocument>) -> IndexResult<()>;

    /// Removes documents (with their children) by id. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, collection: &str, ids: &[String]) -> IndexResult<()>;

    /// Fetches one top-level document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get(&self, collection: &str, id: &str) -> IndexResult<Option<IndexDocument>>;

    /// Runs a search.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the collection is unknown.
    fn search(&self, request: &SearchRequest) -> IndexResult<SearchHits>;

    /// Every top-level document of a collection, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the collection is unknown.
    fn export(&self, collection: &str) -> IndexResult<Vec<IndexDocument>>;
}
