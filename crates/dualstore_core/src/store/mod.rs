//! Stores.
//!
//! Stores are assembled from capability traits rather than a class chain:
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`Reader`] | lookup by id, filtered listing, counting |
//! | [`Writer`] | save and delete with the store's delete semantics |
//! | [`SoftDeleter`] | hard delete and restore for soft-deleting stores |
//! | [`Indexer`] | rebuilding the store's search index documents |
//!
//! [`BasicStore`] does relational CRUD. [`DatedStore`] wraps it with
//! timestamps and soft delete, [`DictionaryStore`] wraps that with the active
//! flag and unique names, and [`IndexedStore`] wraps any of them with a
//! search index projection.
//!
//! Every operation has an `_in_txn` form taking an explicit [`Transaction`]
//! and a convenience form that runs in its own transaction.

mod basic;
mod dated;
mod dictionary;
mod indexed;

pub use basic::BasicStore;
pub use dated::DatedStore;
pub use dictionary::DictionaryStore;
pub use indexed::{IndexMapping, IndexedStore, TableMapping};

use crate::entity::{Dated, EntityId, RecordCodec};
use crate::error::{CoreError, CoreResult};
use crate::query::{FieldTable, Filter, Params, QueryResult};
use crate::reindex::ReindexStats;
use crate::transaction::Transaction;

/// Access to the relational layer underneath a store.
pub trait RecordSource<T: RecordCodec> {
    /// The basic store doing the relational work.
    fn basic(&self) -> &BasicStore<T>;

    /// Field table of the entity type.
    fn fields(&self) -> &FieldTable {
        self.basic().fields()
    }
}

/// Read access.
pub trait Reader<T: RecordCodec>: RecordSource<T> {
    /// Filters the store adds to every collection query, given the caller's
    /// parameters.
    fn implicit_filters(&self, _params: &Params) -> Vec<Filter> {
        Vec::new()
    }

    /// Loads an entity by id. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the row cannot be decoded.
    fn find_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<Option<T>> {
        self.basic().load(tx, id)
    }

    /// Runs a filtered, sorted, paged query.
    ///
    /// # Errors
    ///
    /// Returns `BadArgument` or `UnsupportedParameter` for invalid queries and
    /// backend errors otherwise.
    fn find_all_in_txn(&self, tx: &mut Transaction, params: &Params) -> CoreResult<QueryResult<T>> {
        let implicit = self.implicit_filters(params);
        self.basic().find_all_with(tx, params, &implicit)
    }

    /// Counts matches of a query, ignoring paging.
    ///
    /// # Errors
    ///
    /// See [`Reader::find_all_in_txn`].
    fn count_in_txn(&self, tx: &mut Transaction, params: &Params) -> CoreResult<u64> {
        let implicit = self.implicit_filters(params);
        self.basic().count_with(tx, params, &implicit)
    }

    /// Loads entities by id in the given order, skipping missing ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn find_all_in_list_in_txn(&self, tx: &mut Transaction, ids: &[EntityId]) -> CoreResult<Vec<T>> {
        self.basic().find_all_in_list(tx, ids)
    }

    /// Releases the transaction's tracked rows of this entity type.
    fn detach_all(&self, tx: &mut Transaction) {
        tx.detach_table(T::entity_type());
    }

    /// [`Reader::find_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Reader::find_in_txn`].
    fn find(&self, id: &EntityId) -> CoreResult<Option<T>> {
        self.basic().database().read(|tx| self.find_in_txn(tx, id))
    }

    /// Loads an entity that must exist.
    ///
    /// # Errors
    ///
    /// Returns `MissingObject` if there is no entity with this id.
    fn get(&self, id: &EntityId) -> CoreResult<T> {
        self.find(id)?
            .ok_or_else(|| CoreError::missing(T::entity_type(), id))
    }

    /// [`Reader::find_all_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Reader::find_all_in_txn`].
    fn find_all(&self, params: &Params) -> CoreResult<QueryResult<T>> {
        self.basic().database().read(|tx| self.find_all_in_txn(tx, params))
    }

    /// [`Reader::count_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Reader::count_in_txn`].
    fn count(&self, params: &Params) -> CoreResult<u64> {
        self.basic().database().read(|tx| self.count_in_txn(tx, params))
    }

    /// [`Reader::find_all_in_list_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Reader::find_all_in_list_in_txn`].
    fn find_all_in_list(&self, ids: &[EntityId]) -> CoreResult<Vec<T>> {
        self.basic()
            .database()
            .read(|tx| self.find_all_in_list_in_txn(tx, ids))
    }
}

/// Write access.
pub trait Writer<T: RecordCodec>: RecordSource<T> {
    /// Upserts an entity and returns it as persisted. Saving identical input
    /// twice changes nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` for invariant violations, `Configuration` for
    /// mapping mistakes and backend errors otherwise.
    fn save_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<T>;

    /// Saves several entities.
    ///
    /// # Errors
    ///
    /// Stops at the first failing entity. See [`Writer::save_in_txn`].
    fn save_all_in_txn(&self, tx: &mut Transaction, entities: &[T]) -> CoreResult<Vec<T>> {
        entities
            .iter()
            .map(|entity| self.save_in_txn(tx, entity))
            .collect()
    }

    /// Deletes an entity with the store's delete semantics. Deleting an
    /// entity that does not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    fn delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()>;

    /// [`Writer::save_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Writer::save_in_txn`].
    fn save(&self, entity: &T) -> CoreResult<T> {
        self.basic()
            .database()
            .transaction(|tx| self.save_in_txn(tx, entity))
    }

    /// [`Writer::save_all_in_txn`] in one transaction.
    ///
    /// # Errors
    ///
    /// See [`Writer::save_all_in_txn`]. Nothing is saved on error.
    fn save_all(&self, entities: &[T]) -> CoreResult<Vec<T>> {
        self.basic()
            .database()
            .transaction(|tx| self.save_all_in_txn(tx, entities))
    }

    /// [`Writer::delete_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Writer::delete_in_txn`].
    fn delete(&self, entity: &T) -> CoreResult<()> {
        self.basic()
            .database()
            .transaction(|tx| self.delete_in_txn(tx, entity))
    }
}

/// Extra operations of stores whose `delete` is a soft delete.
pub trait SoftDeleter<T: Dated>: Writer<T> {
    /// Removes the row for good.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    fn hard_delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()>;

    /// Clears the soft-delete mark and returns the restored entity.
    ///
    /// # Errors
    ///
    /// Returns `MissingObject` for unknown ids.
    fn restore_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<T>;

    /// [`SoftDeleter::hard_delete_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SoftDeleter::hard_delete_in_txn`].
    fn hard_delete(&self, entity: &T) -> CoreResult<()> {
        self.basic()
            .database()
            .transaction(|tx| self.hard_delete_in_txn(tx, entity))
    }

    /// [`SoftDeleter::restore_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SoftDeleter::restore_in_txn`].
    fn restore(&self, id: &EntityId) -> CoreResult<T> {
        self.basic()
            .database()
            .transaction(|tx| self.restore_in_txn(tx, id))
    }
}

/// Maintenance of a store's search index documents.
pub trait Indexer<T: RecordCodec> {
    /// Index document type of the store.
    fn index_type(&self) -> &str;

    /// Rewrites the index document of every record, soft-deleted ones
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for projection errors and backend errors
    /// otherwise.
    fn reindex(&self) -> CoreResult<ReindexStats>;

    /// Rewrites the index document of one record.
    ///
    /// # Errors
    ///
    /// Returns `MissingObject` for unknown ids.
    fn reindex_one(&self, id: &EntityId) -> CoreResult<()>;

    /// Removes the index document of one record.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    fn remove_index(&self, id: &EntityId) -> CoreResult<()>;

    /// Drops the index collection.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the index cannot manage schemas.
    fn drop_index(&self) -> CoreResult<()>;

    /// Drops the collection, recreates its schema and reindexes.
    ///
    /// # Errors
    ///
    /// See [`Indexer::drop_index`] and [`Indexer::reindex`].
    fn drop_reindex(&self) -> CoreResult<ReindexStats> {
        self.drop_index()?;
        self.reindex()
    }
}
