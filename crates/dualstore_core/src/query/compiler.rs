//! Filter tree compilation.
//!
//! [`FilterCompiler`] walks a [`Params`] once and emits nodes through a
//! [`Dialect`]. The walker owns validation and the semantics shared by every
//! backend; a dialect only says how one construct is spelled. That keeps the
//! relational predicate and the index query equivalent by construction:
//!
//! - `NEQ` is the negation of `EQ`, so it also matches records without a value
//! - `AND`/`OR` with no children, and an empty root filter list, match everything
//! - `NEGATE` takes exactly one child
//! - `NESTED` compiles its children against the child collection's field table
//! - sort keys always end with `id` so pagination is stable

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::query::fields::{FieldMapping, FieldTable, NestedMapping};
use crate::query::params::{
    Filter, FilterOperation, Order, Params, RootFilterOperation, DEFAULT_SORT,
};
use dualstore_codec::{FieldKind, Value};
use dualstore_storage::ID_COLUMN;

/// Comparison of a field against one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Greater or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less or equal.
    Lte,
}

/// Placement of a text match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Anywhere.
    Contains,
    /// At the start.
    Prefix,
    /// At the end.
    Suffix,
}

/// Target query language of the compiler.
///
/// Methods returning `CoreResult` may reject constructs the backend cannot
/// express with `UnsupportedParameter`.
pub trait Dialect: Sized {
    /// Compiled condition.
    type Node;
    /// Compiled sort key.
    type SortKey;

    /// Matches everything.
    fn match_all(&self) -> Self::Node;

    /// `field <op> value`.
    fn compare(
        &self,
        path: &str,
        field: &FieldMapping,
        op: Comparison,
        value: Value,
    ) -> CoreResult<Self::Node>;

    /// `field` equals any of `values`.
    fn any_of(&self, path: &str, field: &FieldMapping, values: Vec<Value>)
        -> CoreResult<Self::Node>;

    /// Text match on a keyword or text field.
    fn text_match(
        &self,
        path: &str,
        field: &FieldMapping,
        mode: TextMatch,
        text: &str,
    ) -> CoreResult<Self::Node>;

    /// `field` has (`is_null == false`) or lacks a value.
    fn null_check(&self, path: &str, field: &FieldMapping, is_null: bool)
        -> CoreResult<Self::Node>;

    /// Logical complement.
    fn negate(&self, node: Self::Node) -> Self::Node;

    /// Conjunction.
    fn all(&self, nodes: Vec<Self::Node>) -> Self::Node;

    /// Disjunction.
    fn any(&self, nodes: Vec<Self::Node>) -> Self::Node;

    /// Parents with at least one child matching `node`.
    fn nested(&self, path: &str, nested: &NestedMapping, node: Self::Node) -> Self::Node;

    /// Dialect for compiling the children of a nested collection.
    fn child(&self, nested: &NestedMapping) -> Self;

    /// Sort key on `field`.
    fn sort_key(&self, path: &str, field: &FieldMapping, order: Order)
        -> CoreResult<Self::SortKey>;
}

/// Compiles [`Params`] against one entity's [`FieldTable`].
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'a> {
    fields: &'a FieldTable,
    config: &'a StoreConfig,
}

impl<'a> FilterCompiler<'a> {
    /// Creates a compiler.
    pub fn new(fields: &'a FieldTable, config: &'a StoreConfig) -> Self {
        Self { fields, config }
    }

    /// Checks paging and tree depth.
    ///
    /// # Errors
    ///
    /// Returns `BadArgument` for a zero or oversized page size and for trees
    /// deeper than the configured maximum.
    pub fn check(&self, params: &Params) -> CoreResult<()> {
        if let Some(size) = params.page_size {
            if size == 0 {
                return Err(CoreError::bad_argument("pageSize must be positive"));
            }
            if size > self.config.max_page_size {
                return Err(CoreError::bad_argument(format!(
                    "pageSize {size} exceeds the maximum of {}",
                    self.config.max_page_size
                )));
            }
        }
        let depth = params.depth();
        if depth > self.config.max_filter_depth {
            return Err(CoreError::bad_argument(format!(
                "filter depth {depth} exceeds the maximum of {}",
                self.config.max_filter_depth
            )));
        }
        Ok(())
    }

    /// Compiles the filters of `params`, AND-ed with `implicit` filters the
    /// store adds on its own (soft-delete and active-flag exclusion).
    ///
    /// # Errors
    ///
    /// Returns `BadArgument` for malformed filters, `UnsupportedParameter` for
    /// unmapped fields or constructs the dialect cannot express, and
    /// `Configuration` when an implicit filter does not fit the field table.
    pub fn compile<D: Dialect>(
        &self,
        dialect: &D,
        params: &Params,
        implicit: &[Filter],
    ) -> CoreResult<D::Node> {
        self.check(params)?;
        let explicit = if params.filter.is_empty() {
            dialect.match_all()
        } else {
            let nodes = params
                .filter
                .iter()
                .map(|f| compile_node(dialect, self.fields, f))
                .collect::<CoreResult<Vec<_>>>()?;
            match params.root_operation {
                RootFilterOperation::And => dialect.all(nodes),
                RootFilterOperation::Or => dialect.any(nodes),
            }
        };
        if implicit.is_empty() {
            return Ok(explicit);
        }
        let mut nodes = Vec::with_capacity(implicit.len() + 1);
        for filter in implicit {
            let node = compile_node(dialect, self.fields, filter).map_err(|e| match e {
                CoreError::UnsupportedParameter { message } => {
                    CoreError::configuration(format!("implicit filter: {message}"))
                }
                other => other,
            })?;
            nodes.push(node);
        }
        nodes.push(explicit);
        Ok(dialect.all(nodes))
    }

    /// Compiles the sort keys of `params`, ending with an `id` tie-break.
    ///
    /// The default `created` sort is dropped for entities that have no such
    /// field, leaving `id` order.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedParameter` for unmapped sort fields or fields the
    /// dialect cannot sort on.
    pub fn sort<D: Dialect>(&self, dialect: &D, params: &Params) -> CoreResult<Vec<D::SortKey>> {
        let implicit_default = params.sorting.is_empty() && params.sort.trim() == DEFAULT_SORT;
        let mut keys = Vec::new();
        let mut has_id = false;
        for spec in params.sort_keys() {
            let mapping = match self.fields.get(&spec.sort) {
                Some(mapping) => mapping,
                None if implicit_default => continue,
                None => {
                    return Err(CoreError::unsupported(format!(
                        "cannot sort on unknown field {:?}",
                        spec.sort
                    )))
                }
            };
            has_id |= spec.sort == ID_COLUMN;
            keys.push(dialect.sort_key(&spec.sort, mapping, spec.order)?);
        }
        if !has_id {
            let id = self
                .fields
                .get(ID_COLUMN)
                .cloned()
                .unwrap_or_else(|| FieldMapping::new(ID_COLUMN, FieldKind::Keyword));
            keys.push(dialect.sort_key(ID_COLUMN, &id, Order::Asc)?);
        }
        Ok(keys)
    }
}

fn compile_node<D: Dialect>(dialect: &D, fields: &FieldTable, filter: &Filter) -> CoreResult<D::Node> {
    let op = filter.operation;
    match op {
        FilterOperation::And | FilterOperation::Or => {
            if filter.children.is_empty() {
                return Ok(dialect.match_all());
            }
            let nodes = compile_all(dialect, fields, &filter.children)?;
            Ok(if op == FilterOperation::And {
                dialect.all(nodes)
            } else {
                dialect.any(nodes)
            })
        }
        FilterOperation::Negate => match filter.children.as_slice() {
            [child] => Ok(dialect.negate(compile_node(dialect, fields, child)?)),
            children => Err(CoreError::bad_argument(format!(
                "NEGATE takes exactly one child, got {}",
                children.len()
            ))),
        },
        FilterOperation::Nested => {
            let path = field_path(filter)?;
            let nested = fields.require_nested(path)?;
            let child = dialect.child(nested);
            let nodes = compile_all(&child, &nested.fields, &filter.children)?;
            let inner = child.all(nodes);
            Ok(dialect.nested(path, nested, inner))
        }
        FilterOperation::IsNull | FilterOperation::NotNull => {
            let path = field_path(filter)?;
            let mapping = fields.require(path)?;
            dialect.null_check(path, mapping, op == FilterOperation::IsNull)
        }
        FilterOperation::Eq
        | FilterOperation::Neq
        | FilterOperation::Gt
        | FilterOperation::Gte
        | FilterOperation::Lt
        | FilterOperation::Lte
        | FilterOperation::In
        | FilterOperation::Contains
        | FilterOperation::StartWith
        | FilterOperation::EndWith => compile_leaf(dialect, fields, filter),
    }
}

fn compile_all<D: Dialect>(
    dialect: &D,
    fields: &FieldTable,
    filters: &[Filter],
) -> CoreResult<Vec<D::Node>> {
    filters
        .iter()
        .map(|f| compile_node(dialect, fields, f))
        .collect()
}

fn field_path(filter: &Filter) -> CoreResult<&str> {
    filter
        .field
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            CoreError::bad_argument(format!("{} filter needs a field", filter.operation.name()))
        })
}

fn parse(path: &str, mapping: &FieldMapping, raw: &str) -> CoreResult<Value> {
    mapping
        .kind
        .parse(raw)
        .map_err(|e| CoreError::bad_argument(format!("invalid value for {path:?}: {e}")))
}

fn compile_leaf<D: Dialect>(dialect: &D, fields: &FieldTable, filter: &Filter) -> CoreResult<D::Node> {
    let op = filter.operation;
    let path = field_path(filter)?;
    let mapping = fields.require(path)?;
    let raw = filter.value.as_deref().map(str::trim).unwrap_or("");
    if raw.is_empty() {
        if op == FilterOperation::Neq {
            return Ok(dialect.match_all());
        }
        return Err(CoreError::bad_argument(format!(
            "{} filter on {path:?} needs a value",
            op.name()
        )));
    }
    let comparison = match op {
        FilterOperation::Eq | FilterOperation::Neq => Some(Comparison::Eq),
        FilterOperation::Gt => Some(Comparison::Gt),
        FilterOperation::Gte => Some(Comparison::Gte),
        FilterOperation::Lt => Some(Comparison::Lt),
        FilterOperation::Lte => Some(Comparison::Lte),
        _ => None,
    };
    if let Some(comparison) = comparison {
        let node = dialect.compare(path, mapping, comparison, parse(path, mapping, raw)?)?;
        return Ok(if op == FilterOperation::Neq {
            dialect.negate(node)
        } else {
            node
        });
    }
    if op == FilterOperation::In {
        let values = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| parse(path, mapping, v))
            .collect::<CoreResult<Vec<_>>>()?;
        if values.is_empty() {
            return Err(CoreError::bad_argument(format!(
                "IN filter on {path:?} needs at least one value"
            )));
        }
        return dialect.any_of(path, mapping, values);
    }
    let mode = match op {
        FilterOperation::StartWith => TextMatch::Prefix,
        FilterOperation::EndWith => TextMatch::Suffix,
        _ => TextMatch::Contains,
    };
    if !mapping.kind.is_textual() {
        return Err(CoreError::unsupported(format!(
            "{} needs a text field but {path:?} is {}",
            op.name(),
            mapping.kind
        )));
    }
    dialect.text_match(path, mapping, mode, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Renders nodes as a compact prefix notation.
    struct Sketch;

    impl Dialect for Sketch {
        type Node = String;
        type SortKey = String;

        fn match_all(&self) -> String {
            "*".into()
        }
        fn compare(&self, _: &str, f: &FieldMapping, op: Comparison, v: Value) -> CoreResult<String> {
            Ok(format!("{}{op:?}{v}", f.column))
        }
        fn any_of(&self, _: &str, f: &FieldMapping, values: Vec<Value>) -> CoreResult<String> {
            Ok(format!("{}In{}", f.column, values.len()))
        }
        fn text_match(&self, _: &str, f: &FieldMapping, mode: TextMatch, t: &str) -> CoreResult<String> {
            Ok(format!("{}{mode:?}{t}", f.column))
        }
        fn null_check(&self, _: &str, f: &FieldMapping, is_null: bool) -> CoreResult<String> {
            Ok(format!("{}Null{is_null}", f.column))
        }
        fn negate(&self, node: String) -> String {
            format!("!{node}")
        }
        fn all(&self, nodes: Vec<String>) -> String {
            format!("&({})", nodes.join(","))
        }
        fn any(&self, nodes: Vec<String>) -> String {
            format!("|({})", nodes.join(","))
        }
        fn nested(&self, path: &str, _: &NestedMapping, node: String) -> String {
            format!("{path}{{{node}}}")
        }
        fn child(&self, _: &NestedMapping) -> Self {
            Sketch
        }
        fn sort_key(&self, path: &str, _: &FieldMapping, order: Order) -> CoreResult<String> {
            Ok(format!("{path}:{order:?}"))
        }
    }

    fn fields() -> FieldTable {
        FieldTable::dated()
            .field("name", FieldKind::Keyword)
            .field("weight", FieldKind::Integer)
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

    fn compile(params: &Params) -> CoreResult<String> {
        let fields = fields();
        let config = StoreConfig::default();
        FilterCompiler::new(&fields, &config).compile(&Sketch, params, &[])
    }

    fn kind_of(params: &Params) -> ErrorKind {
        compile(params).unwrap_err().kind()
    }

    #[test]
    fn empty_filter_matches_all() {
        assert_eq!(compile(&Params::new()).unwrap(), "*");
        let empty_or = Params::new().filter(Filter::or(vec![]));
        assert_eq!(compile(&empty_or).unwrap(), "&(*)");
    }

    #[test]
    fn neq_is_negated_eq() {
        let params = Params::new().filter(Filter::neq("name", "x"));
        assert_eq!(compile(&params).unwrap(), "&(!nameEqx)");
    }

    #[test]
    fn neq_blank_is_noop() {
        let params = Params::new().filter(Filter::neq("name", "  "));
        assert_eq!(compile(&params).unwrap(), "&(*)");
    }

    #[test]
    fn values_are_typed_and_trimmed() {
        let params = Params::new().filter(Filter::leaf("weight", FilterOperation::Gte, " 4 "));
        assert_eq!(compile(&params).unwrap(), "&(weightGte4)");
        let params = Params::new().filter(Filter::leaf("weight", FilterOperation::In, "1, 2,,3"));
        assert_eq!(compile(&params).unwrap(), "&(weightIn3)");
    }

    #[test]
    fn nested_compiles_against_child_fields() {
        let params = Params::new().filter(Filter::nested("tasks", vec![Filter::eq("state", "done")]));
        assert_eq!(compile(&params).unwrap(), "&(tasks{&(stateEqdone)})");
        let unknown = Params::new().filter(Filter::nested("tasks", vec![Filter::eq("name", "x")]));
        assert_eq!(kind_of(&unknown), ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn malformed_filters_are_bad_arguments() {
        let no_value = Params::new().filter(Filter {
            value: None,
            ..Filter::eq("name", "")
        });
        assert_eq!(kind_of(&no_value), ErrorKind::BadArgument);

        let two_children = Params::new().filter(Filter {
            children: vec![Filter::eq("name", "a"), Filter::eq("name", "b")],
            ..Filter::negate(Filter::eq("name", "a"))
        });
        assert_eq!(kind_of(&two_children), ErrorKind::BadArgument);

        let not_a_number = Params::new().filter(Filter::leaf("weight", FilterOperation::Gt, "heavy"));
        assert_eq!(kind_of(&not_a_number), ErrorKind::BadArgument);

        let zero_page = Params::new().page(0, 0);
        assert_eq!(kind_of(&zero_page), ErrorKind::BadArgument);
    }

    #[test]
    fn depth_limit() {
        let mut filter = Filter::eq("name", "a");
        for _ in 0..40 {
            filter = Filter::negate(filter);
        }
        assert_eq!(kind_of(&Params::new().filter(filter)), ErrorKind::BadArgument);
    }

    #[test]
    fn text_operations_need_text_fields() {
        let params = Params::new().filter(Filter::contains("weight", "1"));
        assert_eq!(kind_of(&params), ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn implicit_filters_are_anded_first() {
        let fields = fields();
        let config = StoreConfig::default();
        let compiler = FilterCompiler::new(&fields, &config);
        let node = compiler
            .compile(&Sketch, &Params::new(), &[Filter::is_null("deleted")])
            .unwrap();
        assert_eq!(node, "&(deletedNulltrue,*)");

        let bad = compiler
            .compile(&Sketch, &Params::new(), &[Filter::eq("active", "true")])
            .unwrap_err();
        assert_eq!(bad.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn sort_appends_id_tie_break() {
        let fields = fields();
        let config = StoreConfig::default();
        let compiler = FilterCompiler::new(&fields, &config);
        let keys = compiler.sort(&Sketch, &Params::new()).unwrap();
        assert_eq!(keys, vec!["created:Desc", "id:Asc"]);

        let keys = compiler
            .sort(&Sketch, &Params::new().then_by("id", Order::Desc))
            .unwrap();
        assert_eq!(keys, vec!["id:Desc"]);

        let err = compiler
            .sort(&Sketch, &Params::new().then_by("colour", Order::Asc))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn default_sort_falls_back_to_id_without_created() {
        let fields = FieldTable::identity();
        let config = StoreConfig::default();
        let keys = FilterCompiler::new(&fields, &config)
            .sort(&Sketch, &Params::new())
            .unwrap();
        assert_eq!(keys, vec!["id:Asc"]);
    }
}
