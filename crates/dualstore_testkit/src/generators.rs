//! Property-based test generators using proptest.
//!
//! The tag filter strategies stay within operations whose relational and
//! index semantics agree, so both compilations of one filter must select
//! the same records.

use crate::entities::Tag;
use dualstore_core::{Filter, FilterOperation, Order, Params, RootFilterOperation};
use proptest::prelude::*;

/// Labels drawn from a small alphabet so filters hit and miss.
pub const LABELS: &[&str] = &["alpha", "beta", "gamma", "delta", "alps", "bet"];

/// Strategy for dictionary-style names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]([a-z0-9 ]{0,14}[a-z0-9])?").expect("Invalid regex")
}

/// Strategy for one tag label.
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(LABELS).prop_map(str::to_string)
}

/// Strategy for a set of tags with distinct ids `tag-000`, `tag-001`, ...
pub fn tags_strategy(max: usize) -> impl Strategy<Value = Vec<Tag>> {
    prop::collection::vec((label_strategy(), -5i64..20), 0..max).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (label, weight))| Tag::new(&format!("tag-{i:03}"), &label, weight))
            .collect()
    })
}

fn label_leaf() -> impl Strategy<Value = Filter> {
    let ops = prop::sample::select(vec![
        FilterOperation::Eq,
        FilterOperation::Neq,
        FilterOperation::Contains,
        FilterOperation::StartWith,
        FilterOperation::EndWith,
    ]);
    let fragment = prop_oneof![
        label_strategy(),
        prop::sample::select(vec!["al", "ta", "ph", "e", "LP"]).prop_map(str::to_string),
    ];
    (ops, fragment).prop_map(|(op, value)| Filter::leaf("label", op, value))
}

fn weight_leaf() -> impl Strategy<Value = Filter> {
    let ops = prop::sample::select(vec![
        FilterOperation::Eq,
        FilterOperation::Neq,
        FilterOperation::Gt,
        FilterOperation::Gte,
        FilterOperation::Lt,
        FilterOperation::Lte,
    ]);
    prop_oneof![
        (ops, -5i64..20).prop_map(|(op, w)| Filter::leaf("weight", op, w.to_string())),
        prop::collection::vec(-5i64..20, 1..4).prop_map(|ws| {
            let list: Vec<String> = ws.iter().map(i64::to_string).collect();
            Filter::leaf("weight", FilterOperation::In, list.join(","))
        }),
    ]
}

/// Strategy for filter trees over [`Tag`] fields, up to `depth` levels of
/// AND / OR / NEGATE.
pub fn tag_filter_strategy(depth: u32) -> impl Strategy<Value = Filter> {
    let leaf = prop_oneof![label_leaf(), weight_leaf()];
    leaf.prop_recursive(depth, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(Filter::and),
            prop::collection::vec(inner.clone(), 1..3).prop_map(Filter::or),
            inner.prop_map(Filter::negate),
        ]
    })
}

/// Strategy for unpaged tag queries sorted on weight or label.
pub fn tag_params_strategy() -> impl Strategy<Value = Params> {
    let sort = prop::sample::select(vec!["weight", "label"]);
    let order = prop::sample::select(vec![Order::Asc, Order::Desc]);
    let root = prop::sample::select(vec![RootFilterOperation::And, RootFilterOperation::Or]);
    (
        prop::collection::vec(tag_filter_strategy(3), 0..3),
        root,
        sort,
        order,
    )
        .prop_map(|(filters, root, sort, order)| {
            filters
                .into_iter()
                .fold(Params::new().operation(root), Params::filter)
                .sort_by(sort, order)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn tag_filters_respect_depth() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let filter = tag_filter_strategy(2)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(filter.depth() <= 3);
        }
    }

    #[test]
    fn tags_have_distinct_ids() {
        let mut runner = TestRunner::default();
        let tags = tags_strategy(20).new_tree(&mut runner).unwrap().current();
        let mut ids: Vec<_> = tags.iter().map(|t| t.id.as_str().to_string()).collect();
        ids.dedup();
        assert_eq!(ids.len(), tags.len());
    }
}
