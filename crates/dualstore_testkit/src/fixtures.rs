//! Test fixtures and database helpers.
//!
//! Provides an in-memory database whose backends stay reachable for fault
//! injection, the fixture stores, and JSON fixture files.

use crate::entities::{Package, PackageMapping, Producer, ProducerMapping, Tag};
use dualstore_core::{
    BasicStore, Database, DatedStore, DictionaryStore, IndexMapping, IndexedStore, StoreConfig,
    TableMapping,
};
use dualstore_index::InMemoryIndex;
use dualstore_storage::InMemoryBackend;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Indexed dictionary store of producers.
pub type ProducerStore = IndexedStore<Producer, DictionaryStore<Producer>, ProducerMapping>;
/// Indexed dated store of packages.
pub type PackageStore = IndexedStore<Package, DatedStore<Package>, PackageMapping>;
/// Indexed basic store of tags.
pub type TagStore = IndexedStore<Tag, BasicStore<Tag>, TableMapping>;

/// A test database over in-memory backends.
pub struct TestDatabase {
    /// The database instance.
    pub db: Arc<Database>,
    /// The relational backend, for row counts and availability switching.
    pub records: Arc<InMemoryBackend>,
    /// The index backend, for document access and availability switching.
    pub index: Arc<InMemoryIndex>,
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDatabase {
    /// Creates a database with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a database with `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_index(InMemoryIndex::new(), config)
    }

    /// Creates a database over a preconfigured index.
    pub fn with_index(index: InMemoryIndex, config: StoreConfig) -> Self {
        let records = Arc::new(InMemoryBackend::new());
        let index = Arc::new(index);
        let db = Database::new(records.clone(), index.clone()).with_config(config);
        Self {
            db: Arc::new(db),
            records,
            index,
        }
    }

    /// An indexed producer store.
    pub fn producers(&self) -> ProducerStore {
        IndexedStore::new(
            DictionaryStore::new(self.db.clone(), Producer::fields()),
            ProducerMapping,
        )
    }

    /// An indexed package store.
    pub fn packages(&self) -> PackageStore {
        self.packages_with(PackageMapping)
    }

    /// An indexed package store with a custom projection.
    pub fn packages_with<M: IndexMapping<Package>>(
        &self,
        mapping: M,
    ) -> IndexedStore<Package, DatedStore<Package>, M> {
        IndexedStore::new(DatedStore::new(self.db.clone(), Package::fields()), mapping)
    }

    /// An indexed tag store.
    pub fn tags(&self) -> TagStore {
        IndexedStore::new(self.tag_records(), TableMapping::new("tag"))
    }

    /// A relational-only tag store.
    pub fn tag_records(&self) -> BasicStore<Tag> {
        BasicStore::new(self.db.clone(), Tag::fields())
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a fresh in-memory database.
///
/// # Example
///
/// ```rust
/// use dualstore_core::{Reader, Writer};
/// use dualstore_testkit::{with_test_db, Tag};
///
/// with_test_db(|db| {
///     let tags = db.tag_records();
///     tags.save(&Tag::new("t1", "red", 3)).unwrap();
///     assert!(tags.find(&"t1".into()).unwrap().is_some());
/// });
/// ```
pub fn with_test_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase) -> R,
{
    let test_db = TestDatabase::new();
    f(&test_db)
}

/// Writes `value` as pretty JSON into a temporary file.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn json_file<T: Serialize>(value: &T) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    serde_json::to_writer_pretty(&mut file, value).expect("Failed to write JSON fixture");
    file.flush().expect("Failed to flush JSON fixture");
    file
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use dualstore_core::Writer;

    /// Saves `count` packages `pkg-000`, `pkg-001`, ... with titles
    /// `package <n>` and priority `n`.
    pub fn populated_packages(db: &TestDatabase, count: usize) -> Vec<Package> {
        let packages: Vec<_> = (0..count)
            .map(|i| Package::new(&format!("pkg-{i:03}"), &format!("package {i}")).priority(i as i64))
            .collect();
        db.packages()
            .save_all(&packages)
            .expect("Failed to save packages")
    }

    /// Saves the tags given as `(label, weight)` pairs with ids `tag-000`, ...
    pub fn populated_tags(db: &TestDatabase, tags: &[(&str, i64)]) -> Vec<Tag> {
        let tags: Vec<_> = tags
            .iter()
            .enumerate()
            .map(|(i, (label, weight))| Tag::new(&format!("tag-{i:03}"), label, *weight))
            .collect();
        db.tags().save_all(&tags).expect("Failed to save tags")
    }
}
