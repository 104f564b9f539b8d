//! Store behaviour over the in-memory backends, checked on both the
//! relational and the index read paths.

use dualstore_core::{
    DictionaryFields, EntityId, ErrorKind, Filter, Order, Params, Reader, SoftDeleter, Writer,
    DELETED_COLUMN,
};
use dualstore_index::IndexBackend;
use dualstore_testkit::prelude::*;
use std::collections::HashSet;

fn names(producers: &[Producer]) -> Vec<&str> {
    let mut names: Vec<_> = producers.iter().map(|p| p.entry.name.as_str()).collect();
    names.sort_unstable();
    names
}

#[test]
fn identity_equality() {
    let a = Tag::new("t1", "red", 1);
    let b = Tag::new("t1", "blue", 9);
    let c = Tag::new("t2", "red", 1);
    assert_eq!(a, b);
    assert_ne!(a, c);
    let set: HashSet<_> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn soft_deleted_record_hidden_but_found() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let kept = packages.save(&Package::new("p1", "kept")).unwrap();
    let gone = packages.save(&Package::new("p2", "gone")).unwrap();
    packages.delete(&gone).unwrap();

    for result in [
        packages.find_all(&Params::new()).unwrap(),
        packages.inner().find_all(&Params::new()).unwrap(),
    ] {
        assert_eq!(result.count, 1);
        assert_eq!(result.items, vec![kept.clone()]);
    }
    let found = packages.get(&gone.id).unwrap();
    assert!(found.dates.deleted.is_some());
    assert_eq!(db.records.row_count("package"), 2);
}

#[test]
fn updated_moves_only_on_change() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let first = packages.save(&Package::new("p1", "draft").task("open", "a")).unwrap();
    let same = packages.save(&Package::new("p1", "draft").task("open", "a")).unwrap();
    assert_eq!(same.dates.updated, first.dates.updated);

    let child_changed = packages
        .save(&Package::new("p1", "draft").task("done", "a"))
        .unwrap();
    assert!(child_changed.dates.updated > first.dates.created);
    assert_eq!(child_changed.dates.created, first.dates.created);
}

#[test]
fn contains_and_negate_on_both_paths() {
    let db = TestDatabase::new();
    let producers = db.producers();
    for (i, name) in ["alpha", "beta", "gamma", "xyz"].iter().enumerate() {
        producers
            .save(&Producer::new(&format!("p{i}"), name, "C"))
            .unwrap();
    }
    let contains = Params::new().filter(Filter::contains("name", "a"));
    let negated = Params::new().filter(Filter::negate(Filter::contains("name", "a")));

    let indexed = producers.find_all(&contains).unwrap();
    let relational = producers.inner().find_all(&contains).unwrap();
    assert_eq!(names(&indexed.items), vec!["alpha", "beta", "gamma"]);
    assert_eq!(names(&relational.items), vec!["alpha", "beta", "gamma"]);

    let indexed = producers.find_all(&negated).unwrap();
    let relational = producers.inner().find_all(&negated).unwrap();
    assert_eq!(names(&indexed.items), vec!["xyz"]);
    assert_eq!(names(&relational.items), vec!["xyz"]);
}

#[test]
fn paging_is_stable() {
    let db = TestDatabase::new();
    scenarios::populated_packages(&db, 25);
    let packages = db.packages();

    for paged in [true, false] {
        let mut seen = HashSet::new();
        let mut sizes = Vec::new();
        for page in 0..3 {
            let params = Params::new().sort_by("created", Order::Asc).page(page, 10);
            let result = if paged {
                packages.find_all(&params).unwrap()
            } else {
                packages.inner().find_all(&params).unwrap()
            };
            assert_eq!(result.count, 25);
            sizes.push(result.items.len());
            for item in result.items {
                assert!(seen.insert(item.id.clone()), "duplicate {}", item.id);
            }
        }
        assert_eq!(sizes, vec![10, 10, 5]);
    }
}

#[test]
fn nested_filter_matches_parent_once() {
    let db = TestDatabase::new();
    let packages = db.packages();
    packages
        .save(&Package::new("p1", "mixed").task("done", "x").task("pending", "y"))
        .unwrap();
    packages
        .save(&Package::new("p2", "open").task("pending", "z"))
        .unwrap();
    let params = Params::new().filter(Filter::nested("tasks", vec![Filter::eq("state", "done")]));

    for result in [
        packages.find_all(&params).unwrap(),
        packages.inner().find_all(&params).unwrap(),
    ] {
        assert_eq!(result.count, 1);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id.as_str(), "p1");
        assert_eq!(result.items[0].tasks.len(), 2);
    }
}

#[test]
fn deleted_records_on_request() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let gone = packages.save(&Package::new("p1", "gone")).unwrap();
    packages.save(&Package::new("p2", "kept")).unwrap();
    packages.delete(&gone).unwrap();

    let params = Params::new().filter(Filter::not_null(DELETED_COLUMN));
    assert_eq!(packages.count(&params).unwrap(), 1);
    assert_eq!(packages.inner().count(&params).unwrap(), 1);

    packages.restore(&gone.id).unwrap();
    assert_eq!(packages.count(&Params::new()).unwrap(), 2);
}

#[test]
fn dictionary_hides_inactive_and_rejects_duplicates() {
    let db = TestDatabase::new();
    let producers = db.producers();
    let mut retired = Producer::new("p1", "Old Co", "OLD");
    retired.entry = DictionaryFields::new("Old Co").order(5);
    retired.entry.active = false;
    producers.save(&retired).unwrap();
    producers.save(&Producer::new("p2", "New Co", "NEW")).unwrap();

    assert_eq!(producers.count(&Params::new()).unwrap(), 1);
    let inactive = Params::new().filter(Filter::eq("active", "false"));
    assert_eq!(producers.find_all(&inactive).unwrap().items[0].id.as_str(), "p1");
    assert!(producers.find(&EntityId::from("p1")).unwrap().is_some());

    let err = producers
        .save(&Producer::new("p3", "New Co", "DUP"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(db.index.document_count("producer"), 2);
}

#[test]
fn find_all_in_list_keeps_order() {
    let db = TestDatabase::new();
    scenarios::populated_tags(&db, &[("a", 1), ("b", 2), ("c", 3)]);
    let ids = [
        EntityId::from("tag-002"),
        EntityId::from("missing"),
        EntityId::from("tag-000"),
    ];
    let found = db.tags().find_all_in_list(&ids).unwrap();
    let labels: Vec<_> = found.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["c", "a"]);
}

#[test]
fn index_projection_carries_children_and_mapping_fields() {
    let db = TestDatabase::new();
    db.packages()
        .save(&Package::new("p1", "Quarterly Report").task("done", "x"))
        .unwrap();
    let doc = db.index.export("package").unwrap().remove(0);
    assert_eq!(doc.get("task_count"), Some(1i64.into()));
    assert_eq!(doc.get("title_kw"), Some("Quarterly Report".into()));
    assert_eq!(doc.children.len(), 1);
    assert_eq!(doc.children[0].doc_type, "task");
    assert_eq!(doc.children[0].get("state"), Some("done".into()));
}

#[test]
fn text_search_uses_phrases_on_index_and_substrings_in_sql() {
    let db = TestDatabase::new();
    let packages = db.packages();
    packages.save(&Package::new("p1", "Quarterly Report")).unwrap();
    packages.save(&Package::new("p2", "Reporting tools")).unwrap();
    let params = Params::new().filter(Filter::contains("title", "report"));

    assert_eq!(packages.count(&params).unwrap(), 1);
    assert_eq!(packages.inner().count(&params).unwrap(), 2);
}
