//! Index rebuilds across several stores.

use dualstore_codec::to_canonical_bytes;
use dualstore_core::{
    ErrorKind, Indexer, Params, Reader, Reindexer, StoreConfig, StoreRegistry, Writer,
};
use dualstore_index::{IndexBackend, InMemoryIndex};
use dualstore_testkit::prelude::*;
use std::sync::Arc;

fn package_snapshot(db: &TestDatabase) -> Vec<u8> {
    to_canonical_bytes(&db.index.export("package").unwrap()).unwrap()
}

#[test]
fn rebuild_is_idempotent() {
    let db = TestDatabase::with_config(StoreConfig::new().reindex_batch_size(4));
    let packages = db.packages();
    for i in 0..10 {
        packages
            .save(&Package::new(&format!("pkg-{i:02}"), "bundle").task("open", "check"))
            .unwrap();
    }
    packages.delete(&Package::new("pkg-03", "bundle")).unwrap();

    let before = package_snapshot(&db);
    let first = packages.drop_reindex().unwrap();
    let after_first = package_snapshot(&db);
    let second = packages.drop_reindex().unwrap();
    let after_second = package_snapshot(&db);

    assert_eq!(first.indexed, 10);
    assert_eq!(first.batches, 3);
    assert_eq!(first, second);
    assert_eq!(before, after_first);
    assert_eq!(after_first, after_second);
}

#[test]
fn rebuild_repairs_lost_documents() {
    let db = TestDatabase::new();
    scenarios::populated_tags(&db, &[("red", 1), ("green", 2), ("blue", 3)]);
    db.index.drop_schema("tag").unwrap();

    let tags = db.tags();
    assert_eq!(tags.reindex().unwrap().indexed, 3);
    assert_eq!(tags.count(&Params::new()).unwrap(), 3);
}

#[test]
fn one_failing_store_does_not_stop_the_others() {
    let db = TestDatabase::new();
    db.producers()
        .save(&Producer::new("p1", "Acme", "ACM"))
        .unwrap();
    scenarios::populated_packages(&db, 3);
    scenarios::populated_tags(&db, &[("red", 1), ("green", 2)]);

    let mut registry = StoreRegistry::new();
    registry.register("1-producers", Arc::new(db.producers())).unwrap();
    registry
        .register(
            "2-packages",
            Arc::new(db.packages_with(PoisonedMapping::new(PackageMapping, &["pkg-001"]))),
        )
        .unwrap();
    registry.register("3-tags", Arc::new(db.tags())).unwrap();

    let report = Reindexer::new(registry).reindex_all().unwrap();
    assert!(!report.is_success());
    assert_eq!(report.succeeded(), vec!["1-producers", "3-tags"]);
    assert_eq!(report.failed(), vec!["2-packages"]);
    let failure = report.outcome("2-packages").unwrap().result.as_ref().unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Configuration);

    assert_eq!(db.index.document_count("producer"), 1);
    assert_eq!(db.index.document_count("tag"), 2);
}

#[test]
fn drop_rejected_when_index_cannot_drop() {
    let db = TestDatabase::with_index(InMemoryIndex::without_schema_management(), StoreConfig::new());
    scenarios::populated_tags(&db, &[("red", 1)]);
    let mut registry = StoreRegistry::new();
    registry.register("tags", Arc::new(db.tags())).unwrap();
    let reindexer = Reindexer::new(registry);

    let err = reindexer.reindex_all().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let report = reindexer.reindex_subset(false, Some(&["tags"][..])).unwrap();
    assert!(report.is_success());
}

#[test]
fn unknown_store_name_is_rejected_before_work() {
    let db = TestDatabase::new();
    scenarios::populated_tags(&db, &[("red", 1)]);
    let writes_before = db.index.write_count();
    let mut registry = StoreRegistry::new();
    registry.register("tags", Arc::new(db.tags())).unwrap();

    let err = Reindexer::new(registry)
        .reindex_subset(false, Some(&["tags", "nope"][..]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadArgument);
    assert_eq!(db.index.write_count(), writes_before);
}
