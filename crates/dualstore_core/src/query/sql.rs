//! Relational dialect.

use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::query::compiler::{Comparison, Dialect, FilterCompiler, TextMatch};
use crate::query::fields::{FieldMapping, FieldTable, NestedMapping};
use crate::query::params::{Filter, Order, Params};
use dualstore_codec::Value;
use dualstore_storage::{CompareOp, LikeMode, OrderBy, Predicate, Select, Window};

/// Compiles filters to [`Predicate`] trees over relational columns.
///
/// Every construct is expressible: full-text fields are matched with
/// case-insensitive `LIKE`, nested collections with a correlated `EXISTS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalDialect;

impl Dialect for RelationalDialect {
    type Node = Predicate;
    type SortKey = OrderBy;

    fn match_all(&self) -> Predicate {
        Predicate::True
    }

    fn compare(
        &self,
        _path: &str,
        field: &FieldMapping,
        op: Comparison,
        value: Value,
    ) -> CoreResult<Predicate> {
        let op = match op {
            Comparison::Eq => CompareOp::Eq,
            Comparison::Gt => CompareOp::Gt,
            Comparison::Gte => CompareOp::Gte,
            Comparison::Lt => CompareOp::Lt,
            Comparison::Lte => CompareOp::Lte,
        };
        Ok(Predicate::compare(field.column.clone(), op, value))
    }

    fn any_of(&self, _path: &str, field: &FieldMapping, values: Vec<Value>) -> CoreResult<Predicate> {
        Ok(Predicate::InList {
            column: field.column.clone(),
            values,
        })
    }

    fn text_match(
        &self,
        _path: &str,
        field: &FieldMapping,
        mode: TextMatch,
        text: &str,
    ) -> CoreResult<Predicate> {
        let mode = match mode {
            TextMatch::Contains => LikeMode::Contains,
            TextMatch::Prefix => LikeMode::Prefix,
            TextMatch::Suffix => LikeMode::Suffix,
        };
        Ok(Predicate::Like {
            column: field.column.clone(),
            mode,
            needle: text.to_string(),
        })
    }

    fn null_check(&self, _path: &str, field: &FieldMapping, is_null: bool) -> CoreResult<Predicate> {
        Ok(if is_null {
            Predicate::IsNull(field.column.clone())
        } else {
            Predicate::IsNotNull(field.column.clone())
        })
    }

    fn negate(&self, node: Predicate) -> Predicate {
        node.negate()
    }

    fn all(&self, nodes: Vec<Predicate>) -> Predicate {
        Predicate::and(nodes)
    }

    fn any(&self, nodes: Vec<Predicate>) -> Predicate {
        Predicate::or(nodes)
    }

    fn nested(&self, _path: &str, nested: &NestedMapping, node: Predicate) -> Predicate {
        Predicate::Exists {
            table: nested.child_table.clone(),
            foreign_key: nested.foreign_key.clone(),
            predicate: Box::new(node),
        }
    }

    fn child(&self, _nested: &NestedMapping) -> Self {
        RelationalDialect
    }

    fn sort_key(&self, _path: &str, field: &FieldMapping, order: Order) -> CoreResult<OrderBy> {
        Ok(match order {
            Order::Asc => OrderBy::asc(field.column.clone()),
            Order::Desc => OrderBy::desc(field.column.clone()),
        })
    }
}

/// Compiles `params` into a select over `table`.
///
/// # Errors
///
/// See [`FilterCompiler::compile`] and [`FilterCompiler::sort`].
pub fn compile_select(
    table: &str,
    fields: &FieldTable,
    params: &Params,
    implicit: &[Filter],
    config: &StoreConfig,
) -> CoreResult<Select> {
    let compiler = FilterCompiler::new(fields, config);
    let predicate = compiler.compile(&RelationalDialect, params, implicit)?;
    let mut select = Select::from(table).filter(predicate);
    for key in compiler.sort(&RelationalDialect, params)? {
        select = select.order_by(key);
    }
    Ok(select.window(params.page_size.map(|size| Window::page(params.page, size))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::params::FilterOperation;
    use dualstore_codec::FieldKind;

    fn fields() -> FieldTable {
        FieldTable::dated()
            .field("name", FieldKind::Keyword)
            .field("body", FieldKind::Text)
            .nested(
                "tasks",
                NestedMapping::new(
                    "task",
                    "package_id",
                    "task",
                    FieldTable::identity().field("state", FieldKind::Keyword),
                ),
            )
    }

    fn select(params: &Params, implicit: &[Filter]) -> Select {
        compile_select("package", &fields(), params, implicit, &StoreConfig::default()).unwrap()
    }

    #[test]
    fn full_statement() {
        let params = Params::new()
            .filter(Filter::contains("name", "50%"))
            .filter(Filter::negate(Filter::eq("name", "beta")))
            .page(2, 10);
        let sql = select(&params, &[Filter::is_null("deleted")]).to_sql();
        assert_eq!(
            sql.text,
            "SELECT t0.* FROM \"package\" t0 WHERE (t0.\"deleted\" IS NULL AND \
             (LOWER(t0.\"name\") LIKE $1 ESCAPE '\\' AND NOT COALESCE(t0.\"name\" = $2, FALSE))) \
             ORDER BY t0.\"created\" DESC NULLS LAST, t0.\"id\" ASC NULLS FIRST \
             LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            sql.params,
            vec![Value::from("%50\\%%"), Value::from("beta")]
        );
    }

    #[test]
    fn nested_is_exists() {
        let params = Params::new().filter(Filter::nested("tasks", vec![Filter::eq("state", "done")]));
        let sql = select(&params, &[]).to_count_sql();
        assert_eq!(
            sql.text,
            "SELECT COUNT(*) FROM \"package\" t0 WHERE EXISTS (SELECT 1 FROM \"task\" t1 \
             WHERE t1.\"package_id\" = t0.\"id\" AND t1.\"state\" = $1)"
        );
    }

    #[test]
    fn text_field_equality_is_native() {
        let params = Params::new()
            .filter(Filter::leaf("body", FilterOperation::StartWith, "Intro"))
            .then_by("body", Order::Asc);
        let select = select(&params, &[]);
        assert_eq!(select.order[0], OrderBy::asc("body"));
        assert!(matches!(
            select.predicate,
            Predicate::Like { mode: LikeMode::Prefix, .. }
        ));
    }

    #[test]
    fn unpaged_has_no_window() {
        assert_eq!(select(&Params::new(), &[]).window, None);
    }
}
