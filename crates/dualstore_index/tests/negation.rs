//! Negated queries partition the document set.

use dualstore_codec::Value;
use dualstore_index::{Analyzer, IndexDocument, IndexQuery, RangeOp, WildcardMode};
use proptest::prelude::*;

fn document_strategy() -> impl Strategy<Value = IndexDocument> {
    (
        proptest::option::of("[a-c]{1,4}"),
        proptest::option::of(0i64..10),
    )
        .prop_map(|(name, order)| {
            IndexDocument::new("d", "producer")
                .with("name", name)
                .with("order", order)
        })
}

fn query_strategy() -> impl Strategy<Value = IndexQuery> {
    let leaf = prop_oneof![
        "[a-c]{1,2}".prop_map(|t| IndexQuery::Wildcard {
            field: "name".into(),
            mode: WildcardMode::Contains,
            text: t,
        }),
        (0i64..10).prop_map(|n| IndexQuery::Range {
            field: "order".into(),
            op: RangeOp::Gte,
            value: Value::Integer(n),
        }),
        Just(IndexQuery::Exists {
            field: "name".into()
        }),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(IndexQuery::and),
            prop::collection::vec(inner.clone(), 0..3).prop_map(IndexQuery::or),
            inner.prop_map(IndexQuery::negate),
        ]
    })
}

proptest! {
    #[test]
    fn negation_is_complement(doc in document_strategy(), query in query_strategy()) {
        let analyzer = Analyzer::default();
        let direct = query.matches(&doc, &analyzer);
        let negated = query.clone().negate().matches(&doc, &analyzer);
        prop_assert_ne!(direct, negated);
    }
}
