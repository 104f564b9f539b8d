//! Relational CRUD for one entity type.

use crate::database::Database;
use crate::entity::{ChildRecords, ChildSet, EntityId, RecordCodec};
use crate::error::{CoreError, CoreResult};
use crate::query::{compile_select, FieldTable, Filter, Params, QueryResult};
use crate::revision::RevisionOp;
use crate::store::{Reader, RecordSource, Writer};
use crate::transaction::Transaction;
use dualstore_codec::Value;
use dualstore_storage::{row_id, CompareOp, OrderBy, Predicate, Row, Select, Window, ID_COLUMN};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// What a write did to the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// A write resolved against the stored state but not applied yet.
struct Prepared {
    row: Row,
    children: Vec<ChildSet>,
    outcome: WriteOutcome,
}

/// Store doing plain relational CRUD for `T`.
///
/// Rows loaded through the store are tracked by the transaction, so loading
/// the same id twice returns the same state without another round trip.
/// Delete is a hard delete that also removes the entity's child rows.
pub struct BasicStore<T: RecordCodec> {
    db: Arc<Database>,
    fields: FieldTable,
    ready: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RecordCodec> fmt::Debug for BasicStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicStore")
            .field("entity_type", &T::entity_type())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<T: RecordCodec> BasicStore<T> {
    /// Creates a store. The field table is validated on first use.
    pub fn new(db: Arc<Database>, fields: FieldTable) -> Self {
        Self {
            db,
            fields,
            ready: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// The database the store works against.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Table holding the entity's main rows.
    pub fn table(&self) -> &'static str {
        T::entity_type()
    }

    /// Validates the field table and creates the tables on first use.
    fn ensure_ready(&self) -> CoreResult<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.fields.validate()?;
        let records = self.db.records();
        records.ensure_table(T::entity_type())?;
        for child in T::child_tables() {
            records.ensure_table(child.table)?;
        }
        self.ready.store(true, Ordering::Release);
        debug!(entity_type = T::entity_type(), "store ready");
        Ok(())
    }

    /// Loads a main row, going through the transaction's identity map.
    pub(crate) fn load_row(&self, tx: &mut Transaction, id: &str) -> CoreResult<Option<Row>> {
        self.ensure_ready()?;
        let table = T::entity_type();
        if let Some(row) = tx.tracked(table, id) {
            return Ok(Some(row.clone()));
        }
        let row = tx.session()?.get(table, id)?;
        if let Some(row) = &row {
            tx.track(table, id, row.clone());
        }
        Ok(row)
    }

    fn child_rows(&self, tx: &mut Transaction, parent: &str) -> CoreResult<ChildRecords> {
        let mut records = ChildRecords::new();
        for child in T::child_tables() {
            let select = Select::from(child.table)
                .filter(Predicate::eq(child.foreign_key, parent))
                .order_by(OrderBy::asc(ID_COLUMN));
            let rows = tx.session()?.select(&select)?;
            records.insert(child.table.to_string(), rows);
        }
        Ok(records)
    }

    /// Decodes a main row together with its child rows.
    pub(crate) fn decode(&self, tx: &mut Transaction, row: &Row) -> CoreResult<T> {
        let id = row_id(row).ok_or_else(|| {
            CoreError::configuration(format!("{} row without textual id", T::entity_type()))
        })?;
        let children = self.child_rows(tx, id)?;
        T::decode(row, &children)
    }

    /// Loads an entity by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the row cannot be decoded.
    pub fn load(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<Option<T>> {
        match self.load_row(tx, id.as_str())? {
            Some(row) => self.decode(tx, &row).map(Some),
            None => Ok(None),
        }
    }

    /// Encodes the entity and normalizes its child rows.
    fn encode(entity: &T) -> CoreResult<(Row, Vec<ChildSet>)> {
        let row = entity.encode();
        if row_id(&row) != Some(entity.id().as_str()) {
            return Err(CoreError::configuration(format!(
                "{} encodes a row whose id differs from {}",
                T::entity_type(),
                entity.id()
            )));
        }
        let declared = T::child_tables();
        let mut children = entity.child_sets();
        for set in &mut children {
            if !declared.contains(&set.table) {
                return Err(CoreError::configuration(format!(
                    "{} writes undeclared child table {:?}",
                    T::entity_type(),
                    set.table.table
                )));
            }
            for child in &mut set.rows {
                if row_id(child).is_none() {
                    return Err(CoreError::configuration(format!(
                        "{} row without textual id",
                        set.table.table
                    )));
                }
                child.insert(set.table.foreign_key.to_string(), Value::from(entity.id()));
            }
            set.rows.sort_by(|a, b| row_id(a).cmp(&row_id(b)));
        }
        Ok((row, children))
    }

    fn prepare(&self, tx: &mut Transaction, entity: &T) -> CoreResult<Prepared> {
        let (row, children) = Self::encode(entity)?;
        let outcome = match self.load_row(tx, entity.id().as_str())? {
            None => WriteOutcome::Inserted,
            Some(stored) => {
                let stored_children = self.child_rows(tx, entity.id().as_str())?;
                let same_children = children.iter().all(|set| {
                    stored_children
                        .get(set.table.table)
                        .map_or(set.rows.is_empty(), |rows| *rows == set.rows)
                });
                if stored == row && same_children {
                    WriteOutcome::Unchanged
                } else {
                    WriteOutcome::Updated
                }
            }
        };
        Ok(Prepared {
            row,
            children,
            outcome,
        })
    }

    /// Returns true if saving `entity` would change the stored state.
    pub(crate) fn differs(&self, tx: &mut Transaction, entity: &T) -> CoreResult<bool> {
        Ok(self.prepare(tx, entity)?.outcome != WriteOutcome::Unchanged)
    }

    /// Upserts the entity's main row and child rows and records the change.
    pub(crate) fn write(&self, tx: &mut Transaction, entity: &T) -> CoreResult<WriteOutcome> {
        self.ensure_ready()?;
        let Prepared {
            row,
            children,
            outcome,
        } = self.prepare(tx, entity)?;
        if outcome == WriteOutcome::Unchanged {
            return Ok(outcome);
        }
        let table = T::entity_type();
        let id = entity.id();
        let session = tx.session()?;
        session.upsert(table, row.clone())?;
        for set in &children {
            let stale = Select::from(set.table.table).filter(Predicate::eq(set.table.foreign_key, id));
            for old in session.select(&stale)? {
                let Some(old_id) = row_id(&old) else { continue };
                if !set.rows.iter().any(|r| row_id(r) == Some(old_id)) {
                    session.delete(set.table.table, old_id)?;
                }
            }
            for child in &set.rows {
                session.upsert(set.table.table, child.clone())?;
            }
        }
        tx.track(table, id.as_str(), row);
        let op = if outcome == WriteOutcome::Inserted {
            RevisionOp::Add
        } else {
            RevisionOp::Modify
        };
        tx.record_change(table, id, op);
        Ok(outcome)
    }

    /// Removes the main row and its child rows. Returns false if there was
    /// nothing to remove.
    pub(crate) fn remove(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<bool> {
        self.ensure_ready()?;
        let table = T::entity_type();
        let session = tx.session()?;
        for child in T::child_tables() {
            let owned = Select::from(child.table).filter(Predicate::eq(child.foreign_key, id));
            for row in session.select(&owned)? {
                if let Some(child_id) = row_id(&row) {
                    session.delete(child.table, child_id)?;
                }
            }
        }
        let existed = session.delete(table, id.as_str())?;
        tx.untrack(table, id.as_str());
        if existed {
            tx.record_change(table, id, RevisionOp::Delete);
        }
        Ok(existed)
    }

    /// Runs a relational query with extra filters AND-ed in front.
    pub(crate) fn find_all_with(
        &self,
        tx: &mut Transaction,
        params: &Params,
        implicit: &[Filter],
    ) -> CoreResult<QueryResult<T>> {
        self.ensure_ready()?;
        let select = compile_select(T::entity_type(), &self.fields, params, implicit, self.db.config())?;
        let session = tx.session()?;
        let rows = session.select(&select)?;
        let count = session.count(&select.table, &select.predicate)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.adopt(tx, row)?);
        }
        Ok(QueryResult::new(items, count))
    }

    /// Counts the matches of a relational query.
    pub(crate) fn count_with(
        &self,
        tx: &mut Transaction,
        params: &Params,
        implicit: &[Filter],
    ) -> CoreResult<u64> {
        self.ensure_ready()?;
        let select = compile_select(T::entity_type(), &self.fields, params, implicit, self.db.config())?;
        Ok(tx.session()?.count(&select.table, &select.predicate)?)
    }

    /// Tracks a freshly selected row, preferring an already tracked version,
    /// and decodes it.
    fn adopt(&self, tx: &mut Transaction, row: Row) -> CoreResult<T> {
        let table = T::entity_type();
        let tracked = row_id(&row).and_then(|id| tx.tracked(table, id)).cloned();
        let row = match tracked {
            Some(tracked) => tracked,
            None => {
                if let Some(id) = row_id(&row) {
                    let id = id.to_string();
                    tx.track(table, &id, row.clone());
                }
                row
            }
        };
        self.decode(tx, &row)
    }

    /// Loads entities in the given order, skipping ids without a row.
    pub(crate) fn find_all_in_list(&self, tx: &mut Transaction, ids: &[EntityId]) -> CoreResult<Vec<T>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.load(tx, id)? {
                items.push(entity);
            }
        }
        Ok(items)
    }

    /// Next batch of main rows in id order, strictly after `after`.
    ///
    /// Soft-deleted rows are included. Rows are not tracked.
    pub(crate) fn scan_after(
        &self,
        tx: &mut Transaction,
        after: Option<&str>,
        limit: u32,
    ) -> CoreResult<Vec<Row>> {
        self.ensure_ready()?;
        let predicate = match after {
            Some(id) => Predicate::compare(ID_COLUMN, CompareOp::Gt, id),
            None => Predicate::True,
        };
        let select = Select::from(T::entity_type())
            .filter(predicate)
            .order_by(OrderBy::asc(ID_COLUMN))
            .window(Some(Window {
                offset: 0,
                limit: u64::from(limit),
            }));
        Ok(tx.session()?.select(&select)?)
    }
}

impl<T: RecordCodec> RecordSource<T> for BasicStore<T> {
    fn basic(&self) -> &BasicStore<T> {
        self
    }

    fn fields(&self) -> &FieldTable {
        &self.fields
    }
}

impl<T: RecordCodec> Reader<T> for BasicStore<T> {}

impl<T: RecordCodec> Writer<T> for BasicStore<T> {
    fn save_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<T> {
        self.write(tx, entity)?;
        Ok(entity.clone())
    }

    fn delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.remove(tx, entity.id())?;
        Ok(())
    }
}
