//! In-memory search index.

use crate::analysis::Analyzer;
use crate::backend::IndexBackend;
use crate::document::{IndexDocument, IndexSchema};
use crate::error::{IndexError, IndexResult};
use crate::query::{SearchHits, SearchRequest, SortField};
use dualstore_codec::Value;
use parking_lot::RwLock;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug)]
struct Collection {
    schema: IndexSchema,
    documents: BTreeMap<String, IndexDocument>,
}

/// A search index held in memory.
///
/// Documents are validated against the collection schema on write, the way a
/// schema-full search service rejects undeclared fields. Queries are
/// evaluated by [`crate::IndexQuery::matches`].
///
/// # Example
///
/// ```rust
/// use dualstore_codec::FieldKind;
/// use dualstore_index::{IndexBackend, IndexDocument, IndexSchema, InMemoryIndex, SearchRequest};
///
/// let index = InMemoryIndex::new();
/// index
///     .ensure_schema(&IndexSchema::new("producer").field("name", FieldKind::Keyword))
///     .unwrap();
/// index
///     .upsert("producer", vec![IndexDocument::new("1", "producer").with("name", "acme")])
///     .unwrap();
/// let hits = index.search(&SearchRequest::new("producer", "producer")).unwrap();
/// assert_eq!(hits.total, 1);
/// ```
#[derive(Debug)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
    analyzer: Analyzer,
    available: AtomicBool,
    schema_management: bool,
    writes: AtomicU64,
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self {
            collections: RwLock::default(),
            analyzer: Analyzer::default(),
            available: AtomicBool::new(true),
            schema_management: true,
            writes: AtomicU64::new(0),
        }
    }
}

impl InMemoryIndex {
    /// Creates an empty index with the default analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index using a custom analyzer for text fields.
    #[must_use]
    pub fn with_analyzer(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            ..Self::default()
        }
    }

    /// Creates an index that cannot drop collections, like a managed service
    /// with a fixed schema.
    #[must_use]
    pub fn without_schema_management() -> Self {
        Self {
            schema_management: false,
            ..Self::default()
        }
    }

    /// Simulates the service going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of documents written since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of top-level documents in a collection.
    #[must_use]
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }

    fn check(&self) -> IndexResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(IndexError::Unavailable(
                "in-memory index switched off".into(),
            ))
        }
    }
}

fn sort_key(doc: &IndexDocument, field: &str) -> Value {
    doc.get(field)
        .and_then(|v| v.elements().next().cloned())
        .unwrap_or(Value::Null)
}

fn compare_docs(sort: &[SortField], a: &IndexDocument, b: &IndexDocument) -> CmpOrdering {
    for key in sort {
        let ord = sort_key(a, &key.field).cmp(&sort_key(b, &key.field));
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

impl IndexBackend for InMemoryIndex {
    fn ensure_schema(&self, schema: &IndexSchema) -> IndexResult<()> {
        self.check()?;
        let mut collections = self.collections.write();
        let collection = collections
            .entry(schema.collection.clone())
            .or_insert_with(|| Collection {
                schema: IndexSchema::new(schema.collection.clone()),
                documents: BTreeMap::new(),
            });
        // Check every field before merging any.
        for (field, kind) in &schema.fields {
            if let Some(existing) = collection.schema.fields.get(field) {
                if existing != kind {
                    return Err(IndexError::SchemaConflict {
                        field: field.clone(),
                        existing: existing.to_string(),
                        requested: kind.to_string(),
                    });
                }
            }
        }
        collection
            .schema
            .fields
            .extend(schema.fields.iter().map(|(f, k)| (f.clone(), *k)));
        debug!(collection = %schema.collection, fields = collection.schema.fields.len(), "schema ensured");
        Ok(())
    }

    fn supports_schema_management(&self) -> bool {
        self.schema_management
    }

    fn drop_schema(&self, collection: &str) -> IndexResult<()> {
        if !self.schema_management {
            return Err(IndexError::Unsupported(format!(
                "dropping collection {collection:?}"
            )));
        }
        self.check()?;
        self.collections.write().remove(collection);
        debug!(collection, "schema dropped");
        Ok(())
    }

    fn upsert(&self, collection: &str, documents: Vec<IndexDocument>) -> IndexResult<()> {
        self.check()?;
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        // Validate the whole batch before touching anything.
        for doc in &documents {
            target.schema.check(doc)?;
        }
        let written = documents.len() as u64;
        for doc in documents {
            target.documents.insert(doc.id.clone(), doc);
        }
        self.writes.fetch_add(written, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, collection: &str, ids: &[String]) -> IndexResult<()> {
        self.check()?;
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        for id in ids {
            target.documents.remove(id);
        }
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> IndexResult<Option<IndexDocument>> {
        self.check()?;
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        Ok(target.documents.get(id).cloned())
    }

    fn search(&self, request: &SearchRequest) -> IndexResult<SearchHits> {
        self.check()?;
        let collections = self.collections.read();
        let target = collections
            .get(&request.collection)
            .ok_or_else(|| IndexError::UnknownCollection(request.collection.clone()))?;
        let mut hits: Vec<&IndexDocument> = target
            .documents
            .values()
            .filter(|doc| doc.doc_type == request.doc_type)
            .filter(|doc| request.query.matches(doc, &self.analyzer))
            .collect();
        hits.sort_by(|a, b| compare_docs(&request.sort, a, b));
        let total = hits.len() as u64;
        let ids: Vec<String> = hits.into_iter().map(|d| d.id.clone()).collect();
        let ids = match request.page {
            Some(page) => {
                let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
                let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
                ids.into_iter().skip(offset).take(limit).collect()
            }
            None => ids,
        };
        Ok(SearchHits { ids, total })
    }

    fn export(&self, collection: &str) -> IndexResult<Vec<IndexDocument>> {
        self.check()?;
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| IndexError::UnknownCollection(collection.to_string()))?;
        Ok(target.documents.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{IndexQuery, Page};
    use dualstore_codec::FieldKind;

    fn index_with_producers(names: &[&str]) -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .ensure_schema(
                &IndexSchema::new("producer")
                    .field("name", FieldKind::Keyword)
                    .field("order", FieldKind::Integer),
            )
            .unwrap();
        let docs = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                IndexDocument::new(format!("p{i}"), "producer")
                    .with("name", *n)
                    .with("order", i as i64)
            })
            .collect();
        index.upsert("producer", docs).unwrap();
        index
    }

    #[test]
    fn unknown_collection_is_configuration_error() {
        let index = InMemoryIndex::new();
        let err = index
            .upsert("nope", vec![IndexDocument::new("1", "nope")])
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn undeclared_field_rejected_without_partial_write() {
        let index = index_with_producers(&[]);
        let err = index
            .upsert(
                "producer",
                vec![
                    IndexDocument::new("ok", "producer").with("name", "fine"),
                    IndexDocument::new("bad", "producer").with("colour", "red"),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::UnknownField { .. }));
        assert_eq!(index.document_count("producer"), 0);
    }

    #[test]
    fn wrong_kind_rejected() {
        let index = index_with_producers(&[]);
        let err = index
            .upsert(
                "producer",
                vec![IndexDocument::new("x", "producer").with("order", "high")],
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidDocument { .. }));
    }

    #[test]
    fn schema_conflict() {
        let index = index_with_producers(&[]);
        let err = index
            .ensure_schema(&IndexSchema::new("producer").field("name", FieldKind::Text))
            .unwrap_err();
        assert!(matches!(err, IndexError::SchemaConflict { .. }));
    }

    #[test]
    fn search_sorts_pages_and_counts() {
        let index = index_with_producers(&["delta", "alpha", "charlie", "bravo"]);
        let request = SearchRequest::new("producer", "producer")
            .sort_by("name", false)
            .page(Some(Page { offset: 1, limit: 2 }));
        let hits = index.search(&request).unwrap();
        assert_eq!(hits.total, 4);
        assert_eq!(hits.ids, vec!["p3", "p2"]);
    }

    #[test]
    fn search_restricts_to_doc_type() {
        let index = index_with_producers(&["alpha"]);
        let hits = index
            .search(&SearchRequest::new("producer", "other").query(IndexQuery::MatchAll))
            .unwrap();
        assert_eq!(hits.total, 0);
    }

    #[test]
    fn drop_schema_requires_support() {
        let index = InMemoryIndex::without_schema_management();
        assert!(!index.supports_schema_management());
        assert!(index.drop_schema("producer").is_err());

        let index = index_with_producers(&["alpha"]);
        index.drop_schema("producer").unwrap();
        assert!(index.export("producer").is_err());
    }

    #[test]
    fn unavailable_is_transient() {
        let index = index_with_producers(&["alpha"]);
        index.set_available(false);
        let err = index.get("producer", "p0").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn export_is_ordered_by_id() {
        let index = index_with_producers(&["b", "a", "c"]);
        let ids: Vec<_> = index
            .export("producer")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["p0", "p1", "p2"]);
    }
}
