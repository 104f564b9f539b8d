//! Dictionary entries: dated records with an active flag and unique names.

use crate::database::Database;
use crate::entity::{Dictionary, EntityId, ACTIVE_COLUMN, DELETED_COLUMN, NAME_COLUMN};
use crate::error::{CoreError, CoreResult};
use crate::query::{FieldTable, Filter, Params};
use crate::store::{BasicStore, DatedStore, Reader, RecordSource, SoftDeleter, Writer};
use crate::transaction::Transaction;
use dualstore_storage::{Predicate, ID_COLUMN};
use std::sync::Arc;

/// Store for dictionary entries.
///
/// Inactive entries are hidden from collection queries unless a filter names
/// `active`; they are still returned by id. Names are unique among live
/// entries: saving or restoring an entry whose name another live entry
/// already uses is a `Conflict`.
#[derive(Debug)]
pub struct DictionaryStore<T: Dictionary> {
    dated: DatedStore<T>,
}

impl<T: Dictionary> DictionaryStore<T> {
    /// Creates a store. The field table needs the `deleted` and `active`
    /// columns, as [`FieldTable::dictionary`] declares them.
    pub fn new(db: Arc<Database>, fields: FieldTable) -> Self {
        Self {
            dated: DatedStore::new(db, fields),
        }
    }

    fn ensure_unique(&self, tx: &mut Transaction, id: &EntityId, name: &str) -> CoreResult<()> {
        let clash = Predicate::and(vec![
            Predicate::eq(NAME_COLUMN, name),
            Predicate::IsNull(DELETED_COLUMN.to_string()),
            Predicate::eq(ID_COLUMN, id).negate(),
        ]);
        if tx.session()?.count(T::entity_type(), &clash)? > 0 {
            return Err(CoreError::conflict(
                T::entity_type(),
                id,
                format!("name {name:?} is already in use"),
            ));
        }
        Ok(())
    }

    /// Finds the live entry with the given name, active or not.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    pub fn find_by_name_in_txn(&self, tx: &mut Transaction, name: &str) -> CoreResult<Option<T>> {
        let params = Params::new()
            .filter(Filter::eq(NAME_COLUMN, name))
            .filter(Filter::is_null(DELETED_COLUMN))
            .page(0, 1);
        let found = self.basic().find_all_with(tx, &params, &[])?;
        Ok(found.items.into_iter().next())
    }

    /// [`DictionaryStore::find_by_name_in_txn`] in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    pub fn find_by_name(&self, name: &str) -> CoreResult<Option<T>> {
        self.basic()
            .database()
            .read(|tx| self.find_by_name_in_txn(tx, name))
    }
}

impl<T: Dictionary> RecordSource<T> for DictionaryStore<T> {
    fn basic(&self) -> &BasicStore<T> {
        self.dated.basic()
    }
}

impl<T: Dictionary> Reader<T> for DictionaryStore<T> {
    fn implicit_filters(&self, params: &Params) -> Vec<Filter> {
        let mut filters = self.dated.implicit_filters(params);
        if !params.targets(ACTIVE_COLUMN) {
            filters.push(Filter::eq(ACTIVE_COLUMN, "true"));
        }
        filters
    }
}

impl<T: Dictionary> Writer<T> for DictionaryStore<T> {
    fn save_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<T> {
        let live = match self.basic().load(tx, entity.id())? {
            Some(stored) => !stored.dated().is_deleted(),
            None => true,
        };
        if live {
            self.ensure_unique(tx, entity.id(), &entity.dictionary().name)?;
        }
        self.dated.save_in_txn(tx, entity)
    }

    fn delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.dated.delete_in_txn(tx, entity)
    }
}

impl<T: Dictionary> SoftDeleter<T> for DictionaryStore<T> {
    fn hard_delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.dated.hard_delete_in_txn(tx, entity)
    }

    fn restore_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<T> {
        if let Some(stored) = self.basic().load(tx, id)? {
            if stored.dated().is_deleted() {
                self.ensure_unique(tx, id, &stored.dictionary().name)?;
            }
        }
        self.dated.restore_in_txn(tx, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{new_row, ChildRecords, Dated, DatedFields, DictionaryFields, RecordCodec, RowView};
    use crate::error::ErrorKind;
    use dualstore_storage::Row;

    #[derive(Debug, Clone)]
    struct Colour {
        id: EntityId,
        entry: DictionaryFields,
        dates: DatedFields,
    }

    crate::identity_eq!(Colour);

    impl crate::entity::Entity for Colour {
        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    impl RecordCodec for Colour {
        fn entity_type() -> &'static str {
            "colour"
        }

        fn encode(&self) -> Row {
            let mut row = new_row(&self.id);
            self.entry.write(&mut row);
            self.dates.write(&mut row);
            row
        }

        fn decode(row: &Row, _children: &ChildRecords) -> CoreResult<Self> {
            let view = RowView::new("colour", row);
            Ok(Self {
                id: view.id()?,
                entry: DictionaryFields::read(&view)?,
                dates: DatedFields::read(&view)?,
            })
        }
    }

    impl Dated for Colour {
        fn dated(&self) -> &DatedFields {
            &self.dates
        }

        fn dated_mut(&mut self) -> &mut DatedFields {
            &mut self.dates
        }
    }

    impl Dictionary for Colour {
        fn dictionary(&self) -> &DictionaryFields {
            &self.entry
        }
    }

    fn colour(id: &str, name: &str) -> Colour {
        Colour {
            id: EntityId::from(id),
            entry: DictionaryFields::new(name),
            dates: DatedFields::default(),
        }
    }

    fn store() -> DictionaryStore<Colour> {
        DictionaryStore::new(Arc::new(Database::in_memory()), FieldTable::dictionary())
    }

    #[test]
    fn inactive_hidden_from_default_listing() {
        let store = store();
        let mut grey = colour("c1", "grey");
        grey.entry.active = false;
        store.save(&grey).unwrap();
        store.save(&colour("c2", "red")).unwrap();

        assert_eq!(store.count(&Params::new()).unwrap(), 1);
        assert!(store.find(&grey.id).unwrap().is_some());
        let inactive = Params::new().filter(Filter::eq(ACTIVE_COLUMN, "false"));
        assert_eq!(store.count(&inactive).unwrap(), 1);
    }

    #[test]
    fn duplicate_live_name_conflicts() {
        let store = store();
        store.save(&colour("c1", "red")).unwrap();
        let err = store.save(&colour("c2", "red")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        store.save(&colour("c1", "red")).unwrap();
    }

    #[test]
    fn deleted_name_can_be_reused_but_not_restored_over() {
        let store = store();
        let first = store.save(&colour("c1", "red")).unwrap();
        store.delete(&first).unwrap();
        store.save(&colour("c2", "red")).unwrap();
        let err = store.restore(&first.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn find_by_name_ignores_deleted() {
        let store = store();
        let first = store.save(&colour("c1", "red")).unwrap();
        assert!(store.find_by_name("red").unwrap().is_some());
        store.delete(&first).unwrap();
        assert!(store.find_by_name("red").unwrap().is_none());
    }
}
