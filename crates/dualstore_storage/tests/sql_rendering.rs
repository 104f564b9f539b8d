//! SQL rendering of compiled selects.

use dualstore_codec::Value;
use dualstore_storage::{CompareOp, LikeMode, OrderBy, Predicate, Select, Window};
use proptest::prelude::*;

#[test]
fn nested_exists_uses_fresh_aliases() {
    let inner = Predicate::Exists {
        table: "subtask".into(),
        foreign_key: "task_id".into(),
        predicate: Box::new(Predicate::eq("flag", true)),
    };
    let outer = Predicate::Exists {
        table: "task".into(),
        foreign_key: "package_id".into(),
        predicate: Box::new(inner),
    };
    let sql = Select::from("package").filter(outer).to_sql();
    assert_eq!(
        sql.text,
        "SELECT t0.* FROM \"package\" t0 WHERE EXISTS (SELECT 1 FROM \"task\" t1 \
         WHERE t1.\"package_id\" = t0.\"id\" AND EXISTS (SELECT 1 FROM \"subtask\" t2 \
         WHERE t2.\"task_id\" = t1.\"id\" AND t2.\"flag\" = $1))"
    );
    assert_eq!(sql.params, vec![Value::Bool(true)]);
}

#[test]
fn full_statement_with_all_parts() {
    let select = Select::from("producer")
        .filter(Predicate::and(vec![
            Predicate::IsNull("deleted".into()),
            Predicate::Like {
                column: "name".into(),
                mode: LikeMode::Suffix,
                needle: "Corp".into(),
            },
            Predicate::compare("order", CompareOp::Lt, 7),
        ]))
        .order_by(OrderBy::asc("name"))
        .order_by(OrderBy::asc("id"))
        .window(Some(Window::page(0, 5)));
    let sql = select.to_sql();
    assert_eq!(
        sql.text,
        "SELECT t0.* FROM \"producer\" t0 WHERE (t0.\"deleted\" IS NULL AND \
         LOWER(t0.\"name\") LIKE $1 ESCAPE '\\' AND t0.\"order\" < $2) \
         ORDER BY t0.\"name\" ASC NULLS FIRST, t0.\"id\" ASC NULLS FIRST LIMIT 5 OFFSET 0"
    );
    assert_eq!(sql.params, vec![Value::from("%corp"), Value::Integer(7)]);
}

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z\"]{1,6}"
}

proptest! {
    #[test]
    fn bind_count_matches_placeholders(cols in prop::collection::vec(ident_strategy(), 0..6)) {
        let parts = cols
            .iter()
            .enumerate()
            .map(|(i, c)| Predicate::eq(c.clone(), i as i64))
            .collect();
        let sql = Select::from("t").filter(Predicate::or(parts)).to_sql();
        prop_assert_eq!(sql.text.matches('$').count(), sql.params.len());
        prop_assert_eq!(sql.params.len(), cols.len());
    }
}
