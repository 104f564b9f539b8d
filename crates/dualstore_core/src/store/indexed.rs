//! Dual writes to the relational store and the search index.

use crate::entity::{Dated, EntityId, RecordCodec};
use crate::error::{CoreError, CoreResult};
use crate::query::{compile_search, FieldTable, Filter, Params, QueryResult};
use crate::reindex::{ReindexStats, Reindexable};
use crate::store::{BasicStore, Indexer, Reader, RecordSource, SoftDeleter, Writer};
use crate::transaction::{IndexOp, Transaction};
use dualstore_codec::FieldKind;
use dualstore_index::{IndexBackend, IndexDocument, IndexSchema, ID_FIELD, TYPE_FIELD};
use dualstore_storage::{column, row_id, Row};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-entity projection into index documents.
///
/// The store fills every field of the entity's [`FieldTable`] before calling
/// [`IndexMapping::to_index_document`], so a mapping only adds what the table
/// does not cover. Fields a mapping adds must be declared in
/// [`IndexMapping::extra_fields`]; anything else fails the schema check as a
/// configuration error.
pub trait IndexMapping<T>: Send + Sync {
    /// Document type of the projected documents.
    fn index_type(&self) -> &str;

    /// Collection the documents live in. Defaults to the document type.
    fn collection(&self) -> &str {
        self.index_type()
    }

    /// Index fields the mapping fills beyond the field table.
    fn extra_fields(&self) -> Vec<(String, FieldKind)> {
        Vec::new()
    }

    /// Adds entity-specific fields to a document already holding the
    /// field-table projection. Must be deterministic.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the entity cannot be projected.
    fn to_index_document(&self, entity: &T, document: &mut IndexDocument) -> CoreResult<()>;
}

/// Mapping that indexes exactly the field table.
#[derive(Debug, Clone)]
pub struct TableMapping {
    index_type: String,
}

impl TableMapping {
    /// Creates a mapping producing documents of `index_type`.
    pub fn new(index_type: impl Into<String>) -> Self {
        Self {
            index_type: index_type.into(),
        }
    }
}

impl<T> IndexMapping<T> for TableMapping {
    fn index_type(&self) -> &str {
        &self.index_type
    }

    fn to_index_document(&self, _entity: &T, _document: &mut IndexDocument) -> CoreResult<()> {
        Ok(())
    }
}

/// Copies every mapped column of `row` into its index fields.
fn copy_columns(fields: &FieldTable, row: &Row, document: &mut IndexDocument) {
    for mapping in fields.fields.values() {
        if mapping.index_field == ID_FIELD {
            continue;
        }
        let value = column(row, &mapping.column);
        for (target, _) in mapping.index_targets() {
            document.set(target, value.clone());
        }
    }
}

/// A store whose records are also projected into a search index.
///
/// Wraps any store `S` and adds the projection `M`:
///
/// - saves and deletes go to `S` first; the matching index write is queued on
///   the transaction and applied after the relational commit
/// - soft deletes re-project the document, so it carries `deleted`
/// - collection queries run against the index; entities are then loaded from
///   the relational store in index order
///
/// A failed index write never undoes the relational commit. It is reported
/// on the [`crate::CommitReceipt`] and repaired by a reindex.
pub struct IndexedStore<T, S, M> {
    inner: S,
    mapping: M,
    schema: IndexSchema,
    schema_ready: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, M: IndexMapping<T>> fmt::Debug for IndexedStore<T, S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStore")
            .field("index_type", &self.mapping.index_type())
            .field("collection", &self.mapping.collection())
            .finish_non_exhaustive()
    }
}

impl<T, S, M> IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T>,
    M: IndexMapping<T>,
{
    /// Wraps `inner` with the projection `mapping`. The index schema is
    /// created on first use.
    pub fn new(inner: S, mapping: M) -> Self {
        let mut schema = inner.fields().index_schema(mapping.collection());
        schema.fields.extend(mapping.extra_fields());
        Self {
            inner,
            mapping,
            schema,
            schema_ready: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The projection.
    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    /// Schema of the index collection.
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    fn index(&self) -> &Arc<dyn IndexBackend> {
        self.inner.basic().database().index()
    }

    fn collection(&self) -> String {
        self.mapping.collection().to_string()
    }

    fn ensure_schema(&self) -> CoreResult<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.inner.fields().validate()?;
        for reserved in [ID_FIELD, TYPE_FIELD] {
            if self.schema.fields.contains_key(reserved) {
                return Err(CoreError::configuration(format!(
                    "{} declares reserved index field {reserved:?}",
                    self.mapping.index_type()
                )));
            }
        }
        self.index().ensure_schema(&self.schema)?;
        self.schema_ready.store(true, Ordering::Release);
        debug!(index_type = self.mapping.index_type(), fields = self.schema.fields.len(), "index schema ready");
        Ok(())
    }

    /// Projects an entity into its index document.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the mapping fails, changes the document's
    /// id or type, or produces a document the schema rejects.
    pub fn project(&self, entity: &T) -> CoreResult<IndexDocument> {
        let index_type = self.mapping.index_type();
        let id = entity.id().as_str();
        let fields = self.inner.fields();
        let mut document = IndexDocument::new(id, index_type);
        copy_columns(fields, &entity.encode(), &mut document);

        let child_sets = entity.child_sets();
        for nested in fields.nested.values() {
            let Some(set) = child_sets.iter().find(|s| nested.child_table == s.table.table) else {
                continue;
            };
            for row in &set.rows {
                let child_id = row_id(row).ok_or_else(|| {
                    CoreError::configuration(format!("{} row without textual id", nested.child_table))
                })?;
                let mut child = IndexDocument::new(child_id, nested.child_type.as_str());
                copy_columns(&nested.fields, row, &mut child);
                document.push_child(child);
            }
        }

        self.mapping.to_index_document(entity, &mut document)?;
        if document.id != id || document.doc_type != index_type {
            return Err(CoreError::configuration(format!(
                "{index_type} mapping changed the identity of document {id}"
            )));
        }
        self.schema
            .check(&document)
            .map_err(|e| CoreError::configuration(format!("{index_type} document {id}: {e}")))?;
        Ok(document)
    }

    fn queue_upsert(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        let document = self.project(entity)?;
        tx.queue_index(IndexOp::Upsert {
            collection: self.collection(),
            document,
        });
        Ok(())
    }

    fn queue_remove(&self, tx: &mut Transaction, id: &EntityId) {
        tx.queue_index(IndexOp::Remove {
            collection: self.collection(),
            id: id.as_str().to_string(),
        });
    }

    /// Brings the index document in line with whatever the delete left.
    fn sync_after_delete(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<()> {
        match self.inner.find_in_txn(tx, id)? {
            Some(remaining) => self.queue_upsert(tx, &remaining),
            None => {
                self.queue_remove(tx, id);
                Ok(())
            }
        }
    }
}

impl<T, S, M> RecordSource<T> for IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T>,
    M: IndexMapping<T>,
{
    fn basic(&self) -> &BasicStore<T> {
        self.inner.basic()
    }

    fn fields(&self) -> &FieldTable {
        self.inner.fields()
    }
}

impl<T, S, M> Reader<T> for IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T>,
    M: IndexMapping<T>,
{
    fn implicit_filters(&self, params: &Params) -> Vec<Filter> {
        self.inner.implicit_filters(params)
    }

    fn find_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<Option<T>> {
        self.inner.find_in_txn(tx, id)
    }

    fn find_all_in_txn(&self, tx: &mut Transaction, params: &Params) -> CoreResult<QueryResult<T>> {
        self.ensure_schema()?;
        let implicit = self.implicit_filters(params);
        let db = self.inner.basic().database();
        let request = compile_search(
            self.mapping.collection(),
            self.mapping.index_type(),
            self.inner.fields(),
            params,
            &implicit,
            db.config(),
        )?;
        let hits = self.index().search(&request)?;
        let ids: Vec<EntityId> = hits.ids.into_iter().map(EntityId::from).collect();
        let items = self.inner.find_all_in_list_in_txn(tx, &ids)?;
        if items.len() < ids.len() {
            debug!(
                index_type = self.mapping.index_type(),
                missing = ids.len() - items.len(),
                "index refers to records the store does not have"
            );
        }
        Ok(QueryResult::new(items, hits.total))
    }

    fn count_in_txn(&self, _tx: &mut Transaction, params: &Params) -> CoreResult<u64> {
        self.ensure_schema()?;
        let implicit = self.implicit_filters(params);
        let request = compile_search(
            self.mapping.collection(),
            self.mapping.index_type(),
            self.inner.fields(),
            params,
            &implicit,
            self.inner.basic().database().config(),
        )?;
        Ok(self.index().search(&request.page(None))?.total)
    }

    fn find_all_in_list_in_txn(&self, tx: &mut Transaction, ids: &[EntityId]) -> CoreResult<Vec<T>> {
        self.inner.find_all_in_list_in_txn(tx, ids)
    }
}

impl<T, S, M> Writer<T> for IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T>,
    M: IndexMapping<T>,
{
    fn save_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<T> {
        self.ensure_schema()?;
        let saved = self.inner.save_in_txn(tx, entity)?;
        self.queue_upsert(tx, &saved)?;
        Ok(saved)
    }

    fn delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.ensure_schema()?;
        self.inner.delete_in_txn(tx, entity)?;
        self.sync_after_delete(tx, entity.id())
    }
}

impl<T, S, M> SoftDeleter<T> for IndexedStore<T, S, M>
where
    T: Dated,
    S: SoftDeleter<T> + Reader<T>,
    M: IndexMapping<T>,
{
    fn hard_delete_in_txn(&self, tx: &mut Transaction, entity: &T) -> CoreResult<()> {
        self.ensure_schema()?;
        self.inner.hard_delete_in_txn(tx, entity)?;
        self.queue_remove(tx, entity.id());
        Ok(())
    }

    fn restore_in_txn(&self, tx: &mut Transaction, id: &EntityId) -> CoreResult<T> {
        self.ensure_schema()?;
        let restored = self.inner.restore_in_txn(tx, id)?;
        self.queue_upsert(tx, &restored)?;
        Ok(restored)
    }
}

impl<T, S, M> Indexer<T> for IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T>,
    M: IndexMapping<T>,
{
    fn index_type(&self) -> &str {
        self.mapping.index_type()
    }

    fn reindex(&self) -> CoreResult<ReindexStats> {
        self.ensure_schema()?;
        let index_type = self.mapping.index_type();
        let basic = self.inner.basic();
        let db = basic.database();
        let batch_size = db.config().reindex_batch_size.max(1);
        let interval = db.config().reindex_progress_interval.max(1);
        let collection = self.collection();
        info!(index_type, "reindex started");

        let stats = db.read(|tx| {
            let mut stats = ReindexStats::default();
            let mut after: Option<String> = None;
            loop {
                let rows = basic.scan_after(tx, after.as_deref(), batch_size)?;
                let Some(last) = rows.last().and_then(row_id) else {
                    break;
                };
                after = Some(last.to_string());
                let mut documents = Vec::with_capacity(rows.len());
                for row in &rows {
                    let entity = basic.decode(tx, row)?;
                    documents.push(self.project(&entity)?);
                }
                self.inner.detach_all(tx);

                let written = documents.len() as u64;
                self.index().upsert(&collection, documents)?;
                let before = stats.indexed;
                stats.indexed += written;
                stats.batches += 1;
                if stats.indexed / interval > before / interval {
                    info!(index_type, indexed = stats.indexed, "reindex progress");
                }
                if rows.len() < batch_size as usize {
                    break;
                }
            }
            Ok(stats)
        })?;

        info!(index_type, indexed = stats.indexed, batches = stats.batches, "reindex finished");
        Ok(stats)
    }

    fn reindex_one(&self, id: &EntityId) -> CoreResult<()> {
        self.ensure_schema()?;
        let entity = self
            .inner
            .find(id)?
            .ok_or_else(|| CoreError::missing(T::entity_type(), id))?;
        let document = self.project(&entity)?;
        self.index().upsert(self.mapping.collection(), vec![document])?;
        Ok(())
    }

    fn remove_index(&self, id: &EntityId) -> CoreResult<()> {
        self.ensure_schema()?;
        self.index()
            .delete(self.mapping.collection(), &[id.as_str().to_string()])?;
        Ok(())
    }

    fn drop_index(&self) -> CoreResult<()> {
        if !self.index().supports_schema_management() {
            return Err(CoreError::configuration(format!(
                "index backend cannot drop collection {:?}",
                self.mapping.collection()
            )));
        }
        self.index().drop_schema(self.mapping.collection())?;
        self.schema_ready.store(false, Ordering::Release);
        info!(index_type = self.mapping.index_type(), "index dropped");
        Ok(())
    }
}

impl<T, S, M> Reindexable for IndexedStore<T, S, M>
where
    T: RecordCodec,
    S: Reader<T> + Writer<T> + Send + Sync,
    M: IndexMapping<T>,
{
    fn can_drop(&self) -> bool {
        self.index().supports_schema_management()
    }

    fn rebuild(&self, drop: bool) -> CoreResult<ReindexStats> {
        if drop {
            self.drop_reindex()
        } else {
            Indexer::reindex(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::entity::{new_row, ChildRecords, DatedFields, RowView};
    use crate::error::ErrorKind;
    use crate::query::FieldMapping;
    use crate::store::DatedStore;
    use dualstore_codec::Value;
    use dualstore_index::InMemoryIndex;
    use dualstore_storage::InMemoryBackend;

    #[derive(Debug, Clone)]
    struct Article {
        id: EntityId,
        title: String,
        dates: DatedFields,
    }

    crate::identity_eq!(Article);

    impl crate::entity::Entity for Article {
        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    impl RecordCodec for Article {
        fn entity_type() -> &'static str {
            "article"
        }

        fn encode(&self) -> Row {
            let mut row = new_row(&self.id);
            row.insert("title".into(), Value::from(self.title.as_str()));
            self.dates.write(&mut row);
            row
        }

        fn decode(row: &Row, _children: &ChildRecords) -> CoreResult<Self> {
            let view = RowView::new("article", row);
            Ok(Self {
                id: view.id()?,
                title: view.text("title")?,
                dates: DatedFields::read(&view)?,
            })
        }
    }

    impl Dated for Article {
        fn dated(&self) -> &DatedFields {
            &self.dates
        }

        fn dated_mut(&mut self) -> &mut DatedFields {
            &mut self.dates
        }
    }

    struct WordCount;

    impl IndexMapping<Article> for WordCount {
        fn index_type(&self) -> &str {
            "article"
        }

        fn extra_fields(&self) -> Vec<(String, FieldKind)> {
            vec![("words".into(), FieldKind::Integer)]
        }

        fn to_index_document(&self, entity: &Article, document: &mut IndexDocument) -> CoreResult<()> {
            document.set("words", entity.title.split_whitespace().count() as i64);
            Ok(())
        }
    }

    type Articles = IndexedStore<Article, DatedStore<Article>, WordCount>;

    fn setup() -> (Arc<InMemoryIndex>, Articles) {
        let index = Arc::new(InMemoryIndex::new());
        let db = Arc::new(Database::new(Arc::new(InMemoryBackend::new()), index.clone()));
        let fields = FieldTable::dated().mapping("title", FieldMapping::text_with_copies("title"));
        (index, IndexedStore::new(DatedStore::new(db, fields), WordCount))
    }

    fn article(id: &str, title: &str) -> Article {
        Article {
            id: EntityId::from(id),
            title: title.into(),
            dates: DatedFields::default(),
        }
    }

    #[test]
    fn projection_fills_table_copies_and_mapping_fields() {
        let (_, store) = setup();
        let doc = store.project(&article("a1", "Hello big World")).unwrap();
        assert_eq!(doc.get("title"), Some(Value::from("Hello big World")));
        assert_eq!(doc.get("title_kw"), Some(Value::from("Hello big World")));
        assert_eq!(doc.get("title_sort"), Some(Value::from("Hello big World")));
        assert_eq!(doc.get("words"), Some(Value::Integer(3)));
        assert_eq!(doc.get("deleted"), None);
    }

    #[test]
    fn index_written_after_commit_only() {
        let (index, store) = setup();
        let db = store.basic().database().clone();
        let mut tx = db.begin().unwrap();
        store.save_in_txn(&mut tx, &article("a1", "first")).unwrap();
        assert_eq!(index.document_count("article"), 0);
        tx.rollback().unwrap();
        assert_eq!(index.document_count("article"), 0);

        store.save(&article("a1", "first")).unwrap();
        assert_eq!(index.document_count("article"), 1);
    }

    #[test]
    fn find_all_reads_from_index() {
        let (_, store) = setup();
        store
            .save_all(&[article("a1", "rust in action"), article("a2", "go in action"), article("a3", "cooking")])
            .unwrap();
        let params = Params::new()
            .filter(Filter::contains("title", "in action"))
            .sort_by("title", crate::query::Order::Asc);
        let found = store.find_all(&params).unwrap();
        assert_eq!(found.count, 2);
        let ids: Vec<_> = found.items.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[test]
    fn soft_delete_reprojects_and_hides() {
        let (index, store) = setup();
        let saved = store.save(&article("a1", "gone soon")).unwrap();
        store.delete(&saved).unwrap();
        let doc = index.get("article", "a1").unwrap().unwrap();
        assert!(doc.get("deleted").is_some());
        assert_eq!(store.count(&Params::new()).unwrap(), 0);

        store.hard_delete(&saved).unwrap();
        assert!(index.get("article", "a1").unwrap().is_none());
    }

    #[test]
    fn failed_index_write_keeps_relational_commit() {
        let (index, store) = setup();
        store.save(&article("a1", "one")).unwrap();
        index.set_available(false);
        let db = store.basic().database().clone();
        let (_, receipt) = db
            .transaction_with_receipt(|tx| store.save_in_txn(tx, &article("a1", "one two")))
            .unwrap();
        assert!(!receipt.index_in_sync());
        index.set_available(true);
        assert_eq!(store.get(&EntityId::from("a1")).unwrap().title, "one two");

        Indexer::reindex(&store).unwrap();
        let doc = index.get("article", "a1").unwrap().unwrap();
        assert_eq!(doc.get("words"), Some(Value::Integer(2)));
    }

    #[test]
    fn reindex_batches_and_reindex_one() {
        let index = Arc::new(InMemoryIndex::new());
        let db = Database::new(Arc::new(InMemoryBackend::new()), index.clone())
            .with_config(crate::config::StoreConfig::new().reindex_batch_size(3));
        let fields = FieldTable::dated().mapping("title", FieldMapping::text_with_copies("title"));
        let store: Articles = IndexedStore::new(DatedStore::new(Arc::new(db), fields), WordCount);
        let articles: Vec<_> = (0..7).map(|i| article(&format!("a{i}"), "x")).collect();
        store.save_all(&articles).unwrap();

        let stats = store.drop_reindex().unwrap();
        assert_eq!(stats.indexed, 7);
        assert_eq!(stats.batches, 3);
        assert_eq!(index.document_count("article"), 7);

        let err = store.reindex_one(&EntityId::from("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingObject);
    }

    #[test]
    fn unsupported_index_filter_is_reported() {
        let (_, store) = setup();
        let params = Params::new().filter(Filter::eq("missing", "x"));
        let err = store.find_all(&params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameter);
    }
}
