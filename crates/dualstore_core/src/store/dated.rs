//! Soft delete and timestamps on top of [`BasicStore`].

use crate::database::Database;
use crate::entity::{stamp_after, Dated, DatedFields, EntityId, RowView, DELETED_COLUMN};
use crate::error::{CoreError, CoreResult};
use crate::query::{FieldTable, Filter, Params};
use crate::revision::RevisionOp;
use crate::store::{BasicStore, Reader, RecordSource, SoftDeleter, Writer};
use crate::transaction::Transaction;
use chrono::Utc;
use std::sync::Arc;

/// Store for temporal records.
///
/// - `created` is stamped on first persistence and never changes.
/// - `updated` advances only when a save changes the stored row.
/// - `delete` stamps `deleted` instead of removing the row. Soft-deleted
///   records stay reachable by id but are hidden from collection queries
///   unless a filter names `deleted`.
///
/// The timestamps are owned by the store: values the caller sets on
/// `created`, `updated` or `deleted` of an already stored record are ignored.
#[derive(Debug)]
pub struct DatedStore<T: Dated> {
    basic: BasicStore<T>,
}

impl<T: Dated> DatedStore<T> {
    /// Creates a store. The field table needs the `deleted` column.
    pub fn new(db: Arc<Database>, fields: FieldTable) -> Self {
        Self {
            basic: BasicStore::new(db, fields),
        }
    }

    fn stored_dates(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<Option<DatedFields>> {
        match self.basic.load_row(tx, id.as_str())? {
            Some(row) => DatedFields::read(&RowView::new(T::entity_type(), &row)).map(Some),
            None => Ok(None),
        }
    }

    fn soft_delete(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<()> {
        let Some(mut entity) = self.basic.load(tx, id)? else {
            return Ok(());
        };
        if entity.dated().is_deleted() {
            return Ok(());
        }
        let dates = entity.dated_mut();
        let now = stamp_after(dates.updated.max(dates.created));
        dates.deleted = Some(now);
        dates.updated = Some(now);
        self.basic.write(tx, &entity)?;
        tx.record_change(T::entity_type(), id, RevisionOp::Delete);
        Ok(())
    }
}

impl<T: Dated> RecordSource<T> for DatedStore<T> {
    fn basic(&self) -> &BasicStore<T> {
        &self.basic
    }
}

impl<T: Dated> Reader<T> for DatedStore<T> {
    fn implicit_filters(&self, params: &Params) -> Vec<Filter> {
        if params.targets(DELETED_COLUMN) {
            Vec::new()
        } else {
            vec![Filter::is_null(DELETED_COLUMN)]
        }
    }
}

impl<T: Dated> Writer<T> for DatedStore<T> {
    fn save_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<T> {
        let mut next = entity.clone();
        match self.stored_dates(tx, entity.id())? {
            None => {
                let dates = next.dated_mut();
                let created = dates.created.unwrap_or_else(Utc::now);
                dates.created = Some(created);
                dates.updated = Some(created);
            }
            Some(stored) => {
                *next.dated_mut() = stored;
                if self.basic.differs(tx, &next)? {
                    next.dated_mut().updated = Some(stamp_after(stored.updated.max(stored.created)));
                }
            }
        }
        self.basic.write(tx, &next)?;
        Ok(next)
    }

    fn delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.soft_delete(tx, entity.id())
    }
}

impl<T: Dated> SoftDeleter<T> for DatedStore<T> {
    fn hard_delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.basic.remove(tx, entity.id())?;
        Ok(())
    }

    fn restore_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<T> {
        let mut entity = self
            .basic
            .load(tx, id)?
            .ok_or_else(|| CoreError::missing(T::entity_type(), id))?;
        if !entity.dated().is_deleted() {
            return Ok(entity);
        }
        let dates = entity.dated_mut();
        dates.updated = Some(stamp_after(dates.deleted.max(dates.updated)));
        dates.deleted = None;
        self.basic.write(tx, &entity)?;
        Ok(entity)
    }
}
