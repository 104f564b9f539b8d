//! In-memory record backend.

use crate::backend::{RecordBackend, RecordSession};
use crate::error::{StorageError, StorageResult};
use crate::predicate::{ChildRows, Predicate};
use crate::row::{column, row_id, Row};
use crate::select::Select;
use dualstore_codec::Value;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

type Tables = HashMap<String, BTreeMap<String, Row>>;

/// An in-memory record backend.
///
/// Each session keeps its writes in a private overlay and publishes them in
/// one step on commit, so readers never observe half of a transaction.
/// Concurrent commits touching the same row are applied in commit order.
///
/// The backend can be switched off with [`InMemoryBackend::set_available`]
/// to exercise transient-failure paths.
///
/// # Example
///
/// ```rust
/// use dualstore_codec::Value;
/// use dualstore_storage::{InMemoryBackend, RecordBackend, Row};
///
/// let backend = InMemoryBackend::new();
/// let mut session = backend.begin().unwrap();
/// let mut row = Row::new();
/// row.insert("id".into(), Value::from("a"));
/// session.upsert("note", row).unwrap();
/// session.commit().unwrap();
/// assert_eq!(backend.row_count("note"), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<Tables>>,
    sequences: Mutex<HashMap<String, u64>>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            tables: Arc::default(),
            sequences: Mutex::default(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of committed rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// Committed rows of `table`, ordered by id.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(available: &AtomicBool) -> StorageResult<()> {
        if available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory backend switched off".into()))
        }
    }
}

impl RecordBackend for InMemoryBackend {
    fn begin(&self) -> StorageResult<Box<dyn RecordSession>> {
        Self::check_available(&self.available)?;
        Ok(Box::new(InMemorySession {
            tables: Arc::clone(&self.tables),
            available: Arc::clone(&self.available),
            overlay: HashMap::new(),
        }))
    }

    fn ensure_table(&self, table: &str) -> StorageResult<()> {
        Self::check_available(&self.available)?;
        self.tables.write().entry(table.to_string()).or_default();
        Ok(())
    }

    fn next_sequence(&self, name: &str) -> StorageResult<u64> {
        Self::check_available(&self.available)?;
        let mut sequences = self.sequences.lock();
        let next = sequences.entry(name.to_string()).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}

/// Pending writes of one session: `None` marks a deletion.
type Overlay = HashMap<String, BTreeMap<String, Option<Row>>>;

struct InMemorySession {
    tables: Arc<RwLock<Tables>>,
    available: Arc<AtomicBool>,
    overlay: Overlay,
}

impl InMemorySession {
    /// Committed rows of `table` with this session's writes applied.
    fn merged(&self, table: &str) -> BTreeMap<String, Row> {
        let mut rows = self.tables.read().get(table).cloned().unwrap_or_default();
        if let Some(pending) = self.overlay.get(table) {
            for (id, change) in pending {
                match change {
                    Some(row) => {
                        rows.insert(id.clone(), row.clone());
                    }
                    None => {
                        rows.remove(id);
                    }
                }
            }
        }
        rows
    }

    fn check(&self) -> StorageResult<()> {
        InMemoryBackend::check_available(&self.available)
    }
}

impl ChildRows for InMemorySession {
    fn child_rows(&self, table: &str, foreign_key: &str, parent_id: &Value) -> Vec<Row> {
        self.merged(table)
            .into_values()
            .filter(|row| column(row, foreign_key) == parent_id)
            .collect()
    }
}

impl RecordSession for InMemorySession {
    fn get(&mut self, table: &str, id: &str) -> StorageResult<Option<Row>> {
        self.check()?;
        if let Some(change) = self.overlay.get(table).and_then(|t| t.get(id)) {
            return Ok(change.clone());
        }
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|t| t.get(id))
            .cloned())
    }

    fn select(&mut self, select: &Select) -> StorageResult<Vec<Row>> {
        self.check()?;
        let view: &dyn ChildRows = &*self;
        let mut rows: Vec<Row> = self
            .merged(&select.table)
            .into_values()
            .filter(|row| select.predicate.evaluate(row, view))
            .collect();
        // Stable sort over id-ordered input.
        rows.sort_by(|a, b| select.compare_rows(a, b));
        let rows = match select.window {
            Some(window) => window.apply(rows),
            None => rows,
        };
        trace!(table = %select.table, rows = rows.len(), "select");
        Ok(rows)
    }

    fn count(&mut self, table: &str, predicate: &Predicate) -> StorageResult<u64> {
        self.check()?;
        let view: &dyn ChildRows = &*self;
        let count = self
            .merged(table)
            .values()
            .filter(|row| predicate.evaluate(row, view))
            .count();
        Ok(count as u64)
    }

    fn upsert(&mut self, table: &str, row: Row) -> StorageResult<()> {
        self.check()?;
        let id = row_id(&row)
            .ok_or_else(|| StorageError::invalid_row(table, "missing textual id column"))?
            .to_string();
        self.overlay
            .entry(table.to_string())
            .or_default()
            .insert(id, Some(row));
        Ok(())
    }

    fn delete(&mut self, table: &str, id: &str) -> StorageResult<bool> {
        let existed = self.get(table, id)?.is_some();
        self.overlay
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), None);
        Ok(existed)
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        self.check()?;
        let session = *self;
        let mut tables = session.tables.write();
        for (table, pending) in session.overlay {
            let rows = tables.entry(table).or_default();
            for (id, change) in pending {
                match change {
                    Some(row) => {
                        rows.insert(id, row);
                    }
                    None => {
                        rows.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
