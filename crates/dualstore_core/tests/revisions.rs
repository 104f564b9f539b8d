//! Revision records written alongside store operations.

use dualstore_core::{
    CoreError, EntityId, RevisionOp, SoftDeleter, UserId, Writer, REVISION_ITEM_TABLE,
    REVISION_TABLE,
};
use dualstore_testkit::prelude::*;

#[test]
fn rolled_back_transaction_leaves_no_revision() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let result: Result<(), CoreError> = db.transaction(|tx| {
        packages.save_in_txn(tx, &Package::new("p1", "draft"))?;
        Err(CoreError::bad_argument("abandon"))
    });
    assert!(result.is_err());
    assert_eq!(db.records.row_count("package"), 0);
    assert_eq!(db.records.row_count(REVISION_TABLE), 0);
    assert_eq!(db.records.row_count(REVISION_ITEM_TABLE), 0);
    assert_eq!(db.index.document_count("package"), 0);
}

#[test]
fn add_then_modify_in_one_transaction_is_an_add() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let (_, receipt) = db
        .transaction_with_receipt(|tx| {
            packages.save_in_txn(tx, &Package::new("p1", "draft"))?;
            packages.save_in_txn(tx, &Package::new("p1", "final"))
        })
        .unwrap();

    let revisions = db.revisions_for(&EntityId::from("p1")).unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(Some(revisions[0].id), receipt.revision);
    assert_eq!(revisions[0].items.len(), 1);
    assert_eq!(revisions[0].items[0].op, RevisionOp::Add);
    assert_eq!(revisions[0].items[0].entity_type, "package");
}

#[test]
fn save_then_hard_delete_is_a_delete() {
    let db = TestDatabase::new();
    let packages = db.packages();
    let saved = packages.save(&Package::new("p1", "draft")).unwrap();
    db.transaction(|tx| {
        packages.save_in_txn(tx, &Package::new("p1", "changed"))?;
        packages.hard_delete_in_txn(tx, &saved)
    })
    .unwrap();

    let ops: Vec<_> = db
        .revisions_for(&saved.id)
        .unwrap()
        .into_iter()
        .map(|r| r.items[0].op)
        .collect();
    assert_eq!(ops, vec![RevisionOp::Add, RevisionOp::Delete]);
}

#[test]
fn one_revision_per_transaction_with_author() {
    let db = TestDatabase::new();
    let packages = db.packages();
    db.transaction(|tx| {
        tx.act_as(UserId::new("archivist"));
        packages.save_all_in_txn(
            tx,
            &[Package::new("p1", "one"), Package::new("p2", "two")],
        )
    })
    .unwrap();

    assert_eq!(db.records.row_count(REVISION_TABLE), 1);
    let revision = db.revisions_for(&EntityId::from("p2")).unwrap().remove(0);
    assert_eq!(revision.author, Some(UserId::new("archivist")));
    let ids: Vec<_> = revision.items.iter().map(|i| i.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[test]
fn unchanged_save_writes_no_revision() {
    let db = TestDatabase::new();
    let packages = db.packages();
    packages.save(&Package::new("p1", "same")).unwrap();
    packages.save(&Package::new("p1", "same")).unwrap();
    assert_eq!(db.records.row_count(REVISION_TABLE), 1);
}
