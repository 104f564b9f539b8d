//! The relational and index compilations of one query select the same
//! records in the same order.

use dualstore_core::{
    Filter, FilterOperation, Order, Params, Reader, RootFilterOperation, Writer,
};
use dualstore_testkit::prelude::*;
use proptest::prelude::*;

fn ids(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.id.as_str().to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn both_paths_agree(tags in tags_strategy(24), params in tag_params_strategy()) {
        let db = TestDatabase::new();
        db.tags().save_all(&tags).unwrap();

        let relational = db.tag_records().find_all(&params).unwrap();
        let indexed = db.tags().find_all(&params).unwrap();
        prop_assert_eq!(relational.count, indexed.count);
        prop_assert_eq!(ids(&relational.items), ids(&indexed.items));
    }

    #[test]
    fn dictionary_names_found_on_both_paths(names in prop::collection::hash_set(name_strategy(), 1..8)) {
        let db = TestDatabase::new();
        let producers = db.producers();
        let names: Vec<String> = names.into_iter().collect();
        for (i, name) in names.iter().enumerate() {
            producers.save(&Producer::new(&format!("p{i}"), name, "C")).unwrap();
        }

        for (i, name) in names.iter().enumerate() {
            let found = producers.inner().find_by_name(name).unwrap().unwrap();
            prop_assert_eq!(found.id.as_str(), format!("p{i}"));

            let by_name = Params::new().filter(Filter::eq("name", name.as_str()));
            prop_assert_eq!(producers.count(&by_name).unwrap(), 1);
            prop_assert_eq!(producers.inner().count(&by_name).unwrap(), 1);
        }
    }

    #[test]
    fn negation_partitions_both_paths(tags in tags_strategy(24), filter in tag_filter_strategy(2)) {
        let db = TestDatabase::new();
        db.tags().save_all(&tags).unwrap();
        let total = tags.len() as u64;

        let plain = Params::new().filter(filter.clone());
        let negated = Params::new().filter(Filter::negate(filter));
        let relational = db.tag_records();
        prop_assert_eq!(
            relational.count(&plain).unwrap() + relational.count(&negated).unwrap(),
            total
        );
        let indexed = db.tags();
        prop_assert_eq!(
            indexed.count(&plain).unwrap() + indexed.count(&negated).unwrap(),
            total
        );
    }
}

#[test]
fn or_root_and_multi_key_sort() {
    let db = TestDatabase::new();
    scenarios::populated_tags(
        &db,
        &[("alpha", 3), ("beta", 1), ("alpha", 1), ("gamma", 7), ("delta", 3)],
    );
    let params = Params::new()
        .operation(RootFilterOperation::Or)
        .filter(Filter::eq("label", "alpha"))
        .filter(Filter::leaf("weight", FilterOperation::Gte, "3"))
        .sort_by("weight", Order::Desc)
        .then_by("label", Order::Asc);

    let expected = vec!["tag-003", "tag-000", "tag-004", "tag-002"];
    assert_eq!(ids(&db.tags().find_all(&params).unwrap().items), expected);
    assert_eq!(ids(&db.tag_records().find_all(&params).unwrap().items), expected);
}

#[test]
fn params_from_json() {
    let json = r#"{
        "filter": [
            {"field": "weight", "operation": "IN", "value": "1,3"},
            {"operation": "NEGATE", "filter": [
                {"field": "label", "operation": "STARTWITH", "value": "al"}
            ]}
        ],
        "sorting": [{"sort": "weight", "order": "ASC"}],
        "page": 0,
        "pageSize": 10
    }"#;
    let params: Params = serde_json::from_str(json).unwrap();
    assert_eq!(params.page_size, Some(10));
    assert_eq!(params.filter[1].children.len(), 1);

    let db = TestDatabase::new();
    scenarios::populated_tags(&db, &[("alpha", 1), ("beta", 1), ("gamma", 3), ("delta", 2)]);
    let expected = vec!["tag-001", "tag-002"];
    assert_eq!(ids(&db.tags().find_all(&params).unwrap().items), expected);
    assert_eq!(ids(&db.tag_records().find_all(&params).unwrap().items), expected);

    let round_trip: Params =
        serde_json::from_str(&serde_json::to_string(&params).unwrap()).unwrap();
    assert_eq!(round_trip, params);
}

#[test]
fn numeric_filter_values_accepted_from_json() {
    let filter: Filter =
        serde_json::from_str(r#"{"field": "weight", "operation": "GT", "value": 2}"#).unwrap();
    assert_eq!(filter.value.as_deref(), Some("2"));
}
