//! Search index dialect.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::query::compiler::{Comparison, Dialect, FilterCompiler, TextMatch};
use crate::query::fields::{FieldMapping, FieldTable, NestedMapping};
use crate::query::params::{Filter, Order, Params};
use dualstore_codec::{FieldKind, Value};
use dualstore_index::{IndexQuery, Page, RangeOp, SearchRequest, SortField, WildcardMode};

/// Compiles filters to [`IndexQuery`] trees over index fields.
///
/// Full-text fields are analyzed, so exact, range, prefix and suffix matches
/// need the field's keyword copy and sorting needs its sort copy. Without
/// them the query is rejected with `UnsupportedParameter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDialect {
    doc_type: String,
}

impl IndexDialect {
    /// Dialect for documents of `doc_type`.
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
        }
    }

    fn term_field<'f>(&self, path: &str, field: &'f FieldMapping, what: &str) -> CoreResult<&'f str> {
        field.term_field().ok_or_else(|| {
            CoreError::unsupported(format!(
                "{what} on full-text field {path:?} needs a keyword copy in the index"
            ))
        })
    }
}

impl Dialect for IndexDialect {
    type Node = IndexQuery;
    type SortKey = SortField;

    fn match_all(&self) -> IndexQuery {
        IndexQuery::MatchAll
    }

    fn compare(
        &self,
        path: &str,
        field: &FieldMapping,
        op: Comparison,
        value: Value,
    ) -> CoreResult<IndexQuery> {
        let target = self.term_field(path, field, "comparison")?.to_string();
        let op = match op {
            Comparison::Eq => return Ok(IndexQuery::Term { field: target, value }),
            Comparison::Gt => RangeOp::Gt,
            Comparison::Gte => RangeOp::Gte,
            Comparison::Lt => RangeOp::Lt,
            Comparison::Lte => RangeOp::Lte,
        };
        Ok(IndexQuery::Range {
            field: target,
            op,
            value,
        })
    }

    fn any_of(&self, path: &str, field: &FieldMapping, values: Vec<Value>) -> CoreResult<IndexQuery> {
        Ok(IndexQuery::Terms {
            field: self.term_field(path, field, "IN")?.to_string(),
            values,
        })
    }

    fn text_match(
        &self,
        path: &str,
        field: &FieldMapping,
        mode: TextMatch,
        text: &str,
    ) -> CoreResult<IndexQuery> {
        if mode == TextMatch::Contains && field.kind == FieldKind::Text {
            return Ok(IndexQuery::Phrase {
                field: field.index_field.clone(),
                text: text.to_string(),
            });
        }
        let mode = match mode {
            TextMatch::Contains => WildcardMode::Contains,
            TextMatch::Prefix => WildcardMode::Prefix,
            TextMatch::Suffix => WildcardMode::Suffix,
        };
        Ok(IndexQuery::Wildcard {
            field: self.term_field(path, field, "prefix or suffix match")?.to_string(),
            mode,
            text: text.to_string(),
        })
    }

    fn null_check(&self, _path: &str, field: &FieldMapping, is_null: bool) -> CoreResult<IndexQuery> {
        let exists = IndexQuery::Exists {
            field: field.index_field.clone(),
        };
        Ok(if is_null { exists.negate() } else { exists })
    }

    fn negate(&self, node: IndexQuery) -> IndexQuery {
        node.negate()
    }

    fn all(&self, nodes: Vec<IndexQuery>) -> IndexQuery {
        IndexQuery::and(nodes)
    }

    fn any(&self, nodes: Vec<IndexQuery>) -> IndexQuery {
        IndexQuery::or(nodes)
    }

    fn nested(&self, _path: &str, nested: &NestedMapping, node: IndexQuery) -> IndexQuery {
        IndexQuery::BlockJoin {
            parent_type: self.doc_type.clone(),
            child_type: nested.child_type.clone(),
            query: Box::new(node),
        }
    }

    fn child(&self, nested: &NestedMapping) -> Self {
        Self::new(nested.child_type.clone())
    }

    fn sort_key(&self, path: &str, field: &FieldMapping, order: Order) -> CoreResult<SortField> {
        let sortable = field.sortable_field().ok_or_else(|| {
            CoreError::unsupported(format!(
                "cannot sort on full-text field {path:?} without a sort copy in the index"
            ))
        })?;
        Ok(SortField {
            field: sortable.to_string(),
            descending: order == Order::Desc,
        })
    }
}

/// Compiles `params` into a search over `doc_type` documents in `collection`.
///
/// # Errors
///
/// See [`FilterCompiler::compile`] and [`FilterCompiler::sort`].
pub fn compile_search(
    collection: &str,
    doc_type: &str,
    fields: &FieldTable,
    params: &Params,
    implicit: &[Filter],
    config: &StoreConfig,
) -> CoreResult<SearchRequest> {
    let dialect = IndexDialect::new(doc_type);
    let compiler = FilterCompiler::new(fields, config);
    let query = compiler.compile(&dialect, params, implicit)?;
    let mut request = SearchRequest::new(collection, doc_type).query(query);
    for key in compiler.sort(&dialect, params)? {
        request = request.sort_by(key.field, key.descending);
    }
    let page = params.page_size.map(|size| Page {
        offset: u64::from(params.page) * u64::from(size),
        limit: u64::from(size),
    });
    Ok(request.page(page))
}
