//! Structural query model: filters, sorting and paging.
//!
//! The JSON shape is the one REST layers send:
//!
//! ```json
//! { "filter": [ { "field": "name", "operation": "CONTAINS", "value": "abc" } ],
//!   "operation": "AND",
//!   "sort": "created", "order": "DESC",
//!   "sorting": [ { "sort": "name", "order": "ASC" } ],
//!   "page": 0, "pageSize": 10 }
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Sort field used when a query names none.
pub const DEFAULT_SORT: &str = "created";

/// Operation of a [`Filter`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperation {
    /// Equal.
    Eq,
    /// Not equal. Also matches records without a value.
    Neq,
    /// Substring (keyword) or phrase (full text) match.
    Contains,
    /// Greater than.
    Gt,
    /// Greater or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less or equal.
    Lte,
    /// Any of a comma-separated list of values.
    In,
    /// Prefix match.
    #[serde(rename = "STARTWITH")]
    StartWith,
    /// Suffix match.
    #[serde(rename = "ENDWITH")]
    EndWith,
    /// Field has no value.
    IsNull,
    /// Field has a value.
    NotNull,
    /// Children apply to a nested child collection named by `field`.
    Nested,
    /// Negation of the single child.
    Negate,
    /// Disjunction of the children.
    Or,
    /// Conjunction of the children.
    And,
}

impl FilterOperation {
    /// Returns true for operations combining child filters.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            FilterOperation::Nested
                | FilterOperation::Negate
                | FilterOperation::Or
                | FilterOperation::And
        )
    }

    /// Wire name of the operation.
    pub fn name(self) -> &'static str {
        match self {
            FilterOperation::Eq => "EQ",
            FilterOperation::Neq => "NEQ",
            FilterOperation::Contains => "CONTAINS",
            FilterOperation::Gt => "GT",
            FilterOperation::Gte => "GTE",
            FilterOperation::Lt => "LT",
            FilterOperation::Lte => "LTE",
            FilterOperation::In => "IN",
            FilterOperation::StartWith => "STARTWITH",
            FilterOperation::EndWith => "ENDWITH",
            FilterOperation::IsNull => "IS_NULL",
            FilterOperation::NotNull => "NOT_NULL",
            FilterOperation::Nested => "NESTED",
            FilterOperation::Negate => "NEGATE",
            FilterOperation::Or => "OR",
            FilterOperation::And => "AND",
        }
    }

    /// Returns true for leaf operations that need a value.
    pub fn needs_value(self) -> bool {
        !self.is_composite() && !matches!(self, FilterOperation::IsNull | FilterOperation::NotNull)
    }
}

/// One node of a filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Dot-separated path of the filtered field. For `NESTED`, the path of
    /// the child collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Operation.
    pub operation: FilterOperation,
    /// Leaf value as text; parsed according to the field's kind.
    #[serde(
        default,
        deserialize_with = "scalar_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Children of composite operations.
    #[serde(
        default,
        rename = "filter",
        alias = "children",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Filter>,
}

/// Accepts JSON strings, numbers and booleans as filter values.
fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(x) => x.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

impl Filter {
    /// A leaf filter.
    pub fn leaf(
        field: impl Into<String>,
        operation: FilterOperation,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            operation,
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, FilterOperation::Eq, value)
    }

    /// `field <> value`.
    pub fn neq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, FilterOperation::Neq, value)
    }

    /// `field` contains `value`.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, FilterOperation::Contains, value)
    }

    /// `field` has no value.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            operation: FilterOperation::IsNull,
            value: None,
            children: Vec::new(),
        }
    }

    /// `field` has a value.
    pub fn not_null(field: impl Into<String>) -> Self {
        Self {
            operation: FilterOperation::NotNull,
            ..Self::is_null(field)
        }
    }

    fn composite(operation: FilterOperation, children: Vec<Filter>) -> Self {
        Self {
            field: None,
            operation,
            value: None,
            children,
        }
    }

    /// Conjunction of `children`.
    pub fn and(children: Vec<Filter>) -> Self {
        Self::composite(FilterOperation::And, children)
    }

    /// Disjunction of `children`.
    pub fn or(children: Vec<Filter>) -> Self {
        Self::composite(FilterOperation::Or, children)
    }

    /// Negation of `child`.
    pub fn negate(child: Filter) -> Self {
        Self::composite(FilterOperation::Negate, vec![child])
    }

    /// Parents having at least one child in collection `field` matching all
    /// of `children`.
    pub fn nested(field: impl Into<String>, children: Vec<Filter>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::composite(FilterOperation::Nested, children)
        }
    }

    /// Height of the tree rooted at this node. A leaf has depth one.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Filter::depth).max().unwrap_or(0)
    }

    /// Returns true if this node or any descendant filters on `field` of the
    /// outer entity. Children of `NESTED` filter a child collection and are
    /// not inspected.
    pub fn mentions(&self, field: &str) -> bool {
        if self.field.as_deref() == Some(field) {
            return true;
        }
        self.operation != FilterOperation::Nested
            && self.children.iter().any(|c| c.mentions(field))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

/// How root-level filters are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RootFilterOperation {
    /// All must match.
    #[default]
    And,
    /// Any must match.
    Or,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpecification {
    /// Field path.
    pub sort: String,
    /// Direction.
    #[serde(default)]
    pub order: Order,
}

impl SortSpecification {
    /// Creates a sort key.
    pub fn new(sort: impl Into<String>, order: Order) -> Self {
        Self {
            sort: sort.into(),
            order,
        }
    }
}

/// Filter, sort and paging parameters of a collection query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Params {
    /// Root-level filters.
    pub filter: Vec<Filter>,
    /// How root-level filters are combined.
    #[serde(rename = "operation")]
    pub root_operation: RootFilterOperation,
    /// Single sort field, used when `sorting` is empty.
    pub sort: String,
    /// Direction of `sort`.
    pub order: Order,
    /// Sort keys, most significant first. Takes precedence over `sort`.
    pub sorting: Vec<SortSpecification>,
    /// Zero-based page number.
    pub page: u32,
    /// Page size. `None` returns every match.
    pub page_size: Option<u32>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            root_operation: RootFilterOperation::And,
            sort: DEFAULT_SORT.to_string(),
            order: Order::Desc,
            sorting: Vec::new(),
            page: 0,
            page_size: None,
        }
    }
}

impl Params {
    /// Unfiltered, unpaged, newest first.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root-level filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter.push(filter);
        self
    }

    /// Sets how root-level filters combine.
    #[must_use]
    pub fn operation(mut self, operation: RootFilterOperation) -> Self {
        self.root_operation = operation;
        self
    }

    /// Sets the single sort field.
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.sort = field.into();
        self.order = order;
        self
    }

    /// Appends a key to `sorting`.
    #[must_use]
    pub fn then_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.sorting.push(SortSpecification::new(field, order));
        self
    }

    /// Requests one page.
    #[must_use]
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    /// Effective sort keys: `sorting` when non-empty, otherwise `sort`/`order`.
    pub fn sort_keys(&self) -> Vec<SortSpecification> {
        if !self.sorting.is_empty() {
            return self.sorting.clone();
        }
        if self.sort.trim().is_empty() {
            return Vec::new();
        }
        vec![SortSpecification::new(self.sort.trim(), self.order)]
    }

    /// Returns true if any filter names `field` of the outer entity.
    pub fn targets(&self, field: &str) -> bool {
        self.filter.iter().any(|f| f.mentions(field))
    }

    /// Depth of the deepest root-level filter.
    pub fn depth(&self) -> usize {
        self.filter.iter().map(Filter::depth).max().unwrap_or(0)
    }
}

/// One page of results and the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    /// Items within the page window.
    pub items: Vec<T>,
    /// Total matches ignoring paging.
    pub count: u64,
}

impl<T> QueryResult<T> {
    /// Creates a result.
    pub fn new(items: Vec<T>, count: u64) -> Self {
        Self { items, count }
    }

    /// Maps the items, keeping the count.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryResult<U> {
        QueryResult {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
        }
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = Params::default();
        assert_eq!(params.sort, "created");
        assert_eq!(params.order, Order::Desc);
        assert_eq!(params.page_size, None);
        assert_eq!(
            params.sort_keys(),
            vec![SortSpecification::new("created", Order::Desc)]
        );
    }

    #[test]
    fn sorting_overrides_sort() {
        let params = Params::new()
            .sort_by("updated", Order::Asc)
            .then_by("name", Order::Asc)
            .then_by("order", Order::Desc);
        let keys: Vec<_> = params.sort_keys().into_iter().map(|k| k.sort).collect();
        assert_eq!(keys, vec!["name", "order"]);
    }

    #[test]
    fn depth_counts_levels() {
        let leaf = Filter::eq("name", "a");
        assert_eq!(leaf.depth(), 1);
        let tree = Filter::and(vec![Filter::negate(leaf), Filter::eq("x", "1")]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn targets_ignores_nested_children() {
        let params = Params::new().filter(Filter::nested(
            "tasks",
            vec![Filter::is_null("deleted")],
        ));
        assert!(!params.targets("deleted"));
        assert!(params.targets("tasks"));

        let params = Params::new().filter(Filter::or(vec![Filter::not_null("deleted")]));
        assert!(params.targets("deleted"));
    }

    #[test]
    fn operation_names() {
        assert!(FilterOperation::Negate.is_composite());
        assert!(!FilterOperation::IsNull.needs_value());
        assert!(FilterOperation::In.needs_value());
    }
}
