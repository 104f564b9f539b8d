//! Per-transaction audit trail.
//!
//! Each write transaction that changes something produces one [`Revision`]
//! listing the touched entities. The revision rows are written through the
//! transaction's own session right before it commits, so a rolled back
//! transaction leaves no revision behind.

use crate::entity::{EntityId, RevisionId, RowView, UserId};
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use dualstore_codec::Value;
use dualstore_storage::{OrderBy, Predicate, RecordBackend, RecordSession, Row, Select, ID_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Table holding one row per revision.
pub const REVISION_TABLE: &str = "revision";
/// Table holding one row per revision item.
pub const REVISION_ITEM_TABLE: &str = "revision_item";

const NUMBER_COLUMN: &str = "number";
const TIMESTAMP_COLUMN: &str = "timestamp";
const AUTHOR_COLUMN: &str = "author";
const REVISION_COLUMN: &str = "revision";
const ENTITY_TYPE_COLUMN: &str = "entity_type";
const ENTITY_ID_COLUMN: &str = "entity_id";
const OP_COLUMN: &str = "op";

/// What happened to an entity in a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionOp {
    /// First persisted.
    Add,
    /// Persisted state changed.
    Modify,
    /// Soft or hard deleted.
    Delete,
}

impl RevisionOp {
    fn as_str(self) -> &'static str {
        match self {
            RevisionOp::Add => "ADD",
            RevisionOp::Modify => "MODIFY",
            RevisionOp::Delete => "DELETE",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ADD" => Some(RevisionOp::Add),
            "MODIFY" => Some(RevisionOp::Modify),
            "DELETE" => Some(RevisionOp::Delete),
            _ => None,
        }
    }

    /// Operation recorded when `next` follows `self` on the same entity in
    /// one transaction: the later one wins, except that a modification of a
    /// freshly added entity is still an addition.
    #[must_use]
    pub fn then(self, next: RevisionOp) -> RevisionOp {
        match (self, next) {
            (RevisionOp::Add, RevisionOp::Modify) => RevisionOp::Add,
            (_, next) => next,
        }
    }
}

impl fmt::Display for RevisionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity touched by a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionItem {
    /// Entity type name.
    pub entity_type: String,
    /// Entity id.
    pub entity_id: EntityId,
    /// Collapsed operation.
    pub op: RevisionOp,
}

/// Audit record of one write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Monotonic id.
    pub id: RevisionId,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Acting user, if known.
    pub author: Option<UserId>,
    /// Touched entities, ordered by type and id.
    pub items: Vec<RevisionItem>,
}

/// Changes accumulated by a transaction, one entry per entity.
#[derive(Debug, Default)]
pub(crate) struct ChangeLog {
    entries: BTreeMap<(String, EntityId), RevisionOp>,
}

impl ChangeLog {
    pub(crate) fn record(&mut self, entity_type: &str, id: &EntityId, op: RevisionOp) {
        self.entries
            .entry((entity_type.to_string(), id.clone()))
            .and_modify(|prev| *prev = prev.then(op))
            .or_insert(op);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn items(&self) -> Vec<RevisionItem> {
        self.entries
            .iter()
            .map(|((entity_type, entity_id), op)| RevisionItem {
                entity_type: entity_type.clone(),
                entity_id: entity_id.clone(),
                op: *op,
            })
            .collect()
    }
}

/// Writes and reads revisions.
pub struct RevisionTracker {
    records: Arc<dyn RecordBackend>,
    tables_ready: AtomicBool,
}

impl fmt::Debug for RevisionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionTracker").finish_non_exhaustive()
    }
}

impl RevisionTracker {
    /// Creates a tracker over `records`.
    pub fn new(records: Arc<dyn RecordBackend>) -> Self {
        Self {
            records,
            tables_ready: AtomicBool::new(false),
        }
    }

    fn ensure_tables(&self) -> CoreResult<()> {
        if !self.tables_ready.load(Ordering::Acquire) {
            self.records.ensure_table(REVISION_TABLE)?;
            self.records.ensure_table(REVISION_ITEM_TABLE)?;
            self.tables_ready.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Writes a revision for `changes` into `session`.
    pub(crate) fn persist(
        &self,
        session: &mut dyn RecordSession,
        author: Option<UserId>,
        changes: &ChangeLog,
    ) -> CoreResult<RevisionId> {
        self.ensure_tables()?;
        let id = RevisionId::new(self.records.next_sequence(REVISION_TABLE)?);
        let key = id.row_key();

        let mut row = Row::new();
        row.insert(ID_COLUMN.into(), Value::from(key.as_str()));
        row.insert(NUMBER_COLUMN.into(), Value::Integer(sequence_to_i64(id)?));
        row.insert(TIMESTAMP_COLUMN.into(), Value::Timestamp(Utc::now()));
        row.insert(
            AUTHOR_COLUMN.into(),
            Value::from(author.as_ref().map(UserId::as_str)),
        );
        session.upsert(REVISION_TABLE, row)?;

        for (n, item) in changes.items().into_iter().enumerate() {
            let mut row = Row::new();
            row.insert(ID_COLUMN.into(), Value::Text(format!("{key}-{n:06}")));
            row.insert(REVISION_COLUMN.into(), Value::from(key.as_str()));
            row.insert(ENTITY_TYPE_COLUMN.into(), Value::Text(item.entity_type));
            row.insert(ENTITY_ID_COLUMN.into(), Value::from(item.entity_id));
            row.insert(OP_COLUMN.into(), Value::from(item.op.as_str()));
            session.upsert(REVISION_ITEM_TABLE, row)?;
        }
        debug!(revision = %id, items = changes.len(), "revision recorded");
        Ok(id)
    }

    /// Loads a revision by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a stored row is malformed.
    pub fn find_revision(&self, tx: &mut Transaction, id: RevisionId) -> CoreResult<Option<Revision>> {
        let key = id.row_key();
        let session = tx.session()?;
        let Some(row) = session.get(REVISION_TABLE, &key)? else {
            return Ok(None);
        };
        let items = session.select(
            &Select::from(REVISION_ITEM_TABLE)
                .filter(Predicate::eq(REVISION_COLUMN, key.as_str()))
                .order_by(OrderBy::asc(ID_COLUMN)),
        )?;
        let view = RowView::new(REVISION_TABLE, &row);
        let timestamp = view
            .opt_timestamp(TIMESTAMP_COLUMN)?
            .ok_or_else(|| CoreError::configuration(format!("revision {id} has no timestamp")))?;
        let items = items
            .iter()
            .map(|row| decode_item(&RowView::new(REVISION_ITEM_TABLE, row)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Some(Revision {
            id,
            timestamp,
            author: view.opt_text(AUTHOR_COLUMN).map(UserId::new),
            items,
        }))
    }

    /// Revisions that touched `entity_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a stored row is malformed.
    pub fn revisions_for(
        &self,
        tx: &mut Transaction,
        entity_id: &EntityId,
    ) -> CoreResult<Vec<Revision>> {
        let rows = tx.session()?.select(
            &Select::from(REVISION_ITEM_TABLE)
                .filter(Predicate::eq(ENTITY_ID_COLUMN, entity_id))
                .order_by(OrderBy::asc(ID_COLUMN)),
        )?;
        let mut ids: Vec<RevisionId> = Vec::new();
        for row in &rows {
            let key = RowView::new(REVISION_ITEM_TABLE, row).text(REVISION_COLUMN)?;
            let number = key
                .parse::<u64>()
                .map_err(|_| CoreError::configuration(format!("malformed revision key {key:?}")))?;
            let id = RevisionId::new(number);
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        let mut revisions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(revision) = self.find_revision(tx, id)? {
                revisions.push(revision);
            }
        }
        Ok(revisions)
    }
}

fn sequence_to_i64(id: RevisionId) -> CoreResult<i64> {
    i64::try_from(id.as_u64())
        .map_err(|_| CoreError::configuration(format!("revision sequence overflow at {id}")))
}

fn decode_item(view: &RowView<'_>) -> CoreResult<RevisionItem> {
    let raw = view.text(OP_COLUMN)?;
    let op = RevisionOp::parse(&raw)
        .ok_or_else(|| CoreError::configuration(format!("unknown revision operation {raw:?}")))?;
    Ok(RevisionItem {
        entity_type: view.text(ENTITY_TYPE_COLUMN)?,
        entity_id: EntityId::from(view.text(ENTITY_ID_COLUMN)?),
        op,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_rule() {
        use RevisionOp::{Add, Delete, Modify};
        assert_eq!(Add.then(Modify), Add);
        assert_eq!(Add.then(Delete), Delete);
        assert_eq!(Modify.then(Delete), Delete);
        assert_eq!(Delete.then(Modify), Modify);
        assert_eq!(Modify.then(Modify), Modify);
    }

    #[test]
    fn change_log_keeps_one_entry_per_entity() {
        let mut log = ChangeLog::default();
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        log.record("tag", &a, RevisionOp::Add);
        log.record("tag", &a, RevisionOp::Modify);
        log.record("tag", &b, RevisionOp::Modify);
        log.record("tag", &b, RevisionOp::Delete);
        let items = log.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].op, RevisionOp::Add);
        assert_eq!(items[1].op, RevisionOp::Delete);
    }

    #[test]
    fn op_names_round_trip() {
        for op in [RevisionOp::Add, RevisionOp::Modify, RevisionOp::Delete] {
            assert_eq!(RevisionOp::parse(&op.to_string()), Some(op));
        }
    }
}
