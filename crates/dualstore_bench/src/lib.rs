//! Benchmark utilities.

#![warn(missing_docs)]

use dualstore_core::{Filter, FilterOperation, Order, Params};
use dualstore_testkit::{Tag, TestDatabase, LABELS};

/// A balanced filter tree over tag fields, `depth` levels of alternating
/// AND / OR with a NEGATE on every right branch.
pub fn filter_tree(depth: usize) -> Filter {
    if depth == 0 {
        return Filter::leaf("weight", FilterOperation::Gte, "3");
    }
    let left = if depth % 2 == 0 {
        Filter::contains("label", "al")
    } else {
        Filter::leaf("weight", FilterOperation::In, "1,2,3,5,8")
    };
    let right = Filter::negate(filter_tree(depth - 1));
    if depth % 2 == 0 {
        Filter::and(vec![left, right])
    } else {
        Filter::or(vec![left, right])
    }
}

/// Paged query with `filter`, sorted by weight then label.
pub fn paged_params(filter: Filter) -> Params {
    Params::new()
        .filter(filter)
        .sort_by("weight", Order::Desc)
        .then_by("label", Order::Asc)
        .page(0, 50)
}

/// `count` tags with labels cycling through [`LABELS`] and weights 0..20.
pub fn generate_tags(count: usize) -> Vec<Tag> {
    (0..count)
        .map(|i| {
            Tag::new(
                &format!("tag-{i:06}"),
                LABELS[i % LABELS.len()],
                (i % 20) as i64,
            )
        })
        .collect()
}

/// A database holding `count` indexed tags.
pub fn populated_tags(count: usize) -> TestDatabase {
    use dualstore_core::Writer;

    let db = TestDatabase::new();
    let tags = generate_tags(count);
    let store = db.tags();
    for chunk in tags.chunks(1_000) {
        store.save_all(chunk).expect("Failed to populate tags");
    }
    db
}
