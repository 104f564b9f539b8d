//! Record backend traits.

use crate::error::StorageResult;
use crate::predicate::Predicate;
use crate::row::Row;
use crate::select::Select;

/// A transactional relational record store.
///
/// The backend is the system of record. Everything written through a
/// [`RecordSession`] becomes visible to other sessions only when the session
/// commits, and becomes visible all at once.
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - reference implementation for tests and tools
pub trait RecordBackend: Send + Sync {
    /// Opens a new session (one database transaction).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be reached.
    fn begin(&self) -> StorageResult<Box<dyn RecordSession>>;

    /// Makes sure `table` exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    fn ensure_table(&self, table: &str) -> StorageResult<()>;

    /// Returns the next value of a named sequence.
    ///
    /// Sequences are monotonic but not transactional: a rolled back session
    /// leaves a gap.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be reached.
    fn next_sequence(&self, name: &str) -> StorageResult<u64>;
}

/// One open transaction against a [`RecordBackend`].
///
/// Dropping a session without committing discards its writes.
pub trait RecordSession: Send {
    /// Loads a row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get(&mut self, table: &str, id: &str) -> StorageResult<Option<Row>>;

    /// Runs a select, returning rows in the requested order and window.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn select(&mut self, select: &Select) -> StorageResult<Vec<Row>>;

    /// Counts rows matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn count(&mut self, table: &str, predicate: &Predicate) -> StorageResult<u64>;

    /// Inserts or replaces a row keyed by its `id` column.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRow` if the row has no textual id.
    fn upsert(&mut self, table: &str, row: Row) -> StorageResult<()>;

    /// Deletes a row. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&mut self, table: &str, id: &str) -> StorageResult<bool>;

    /// Makes every write of this session durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards every write of this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails while rolling back.
    fn rollback(self: Box<Self>) -> StorageResult<()>;
}
