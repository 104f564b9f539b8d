//! Index query tree and search requests.
//!
//! [`IndexQuery`] renders to Lucene/Solr query syntax through `Display` and is
//! evaluated directly by the in-memory index. Negation is pure set
//! complement (`*:* -q`), so documents missing a field match a negated
//! comparison on that field.

use crate::analysis::Analyzer;
use crate::document::{IndexDocument, TYPE_FIELD};
use dualstore_codec::Value;
use std::cmp::Ordering;
use std::fmt;

/// Range bound direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Gte,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Lte,
}

impl RangeOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            RangeOp::Gt => ordering == Ordering::Greater,
            RangeOp::Gte => ordering != Ordering::Less,
            RangeOp::Lt => ordering == Ordering::Less,
            RangeOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Placement of a wildcard match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardMode {
    /// `*text*`
    Contains,
    /// `text*`
    Prefix,
    /// `*text`
    Suffix,
}

/// A query against one index collection.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    /// `*:*`
    MatchAll,
    /// Matches nothing.
    MatchNone,
    /// Exact value match on a non-analyzed field.
    Term {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Any of several exact values.
    Terms {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Case-insensitive wildcard match on a non-analyzed field.
    Wildcard {
        /// Field name.
        field: String,
        /// Placement of the text.
        mode: WildcardMode,
        /// Literal text.
        text: String,
    },
    /// Phrase match on an analyzed field.
    Phrase {
        /// Field name.
        field: String,
        /// Phrase text, analyzed at query time.
        text: String,
    },
    /// Open-ended range.
    Range {
        /// Field name.
        field: String,
        /// Direction.
        op: RangeOp,
        /// Bound.
        value: Value,
    },
    /// Field has a value.
    Exists {
        /// Field name.
        field: String,
    },
    /// Complement.
    Not(Box<IndexQuery>),
    /// Conjunction. Empty matches everything.
    And(Vec<IndexQuery>),
    /// Disjunction. Empty matches nothing.
    Or(Vec<IndexQuery>),
    /// Parent documents of `parent_type` having at least one child of
    /// `child_type` matching `query`.
    BlockJoin {
        /// Type of the returned parents.
        parent_type: String,
        /// Type of the children tested.
        child_type: String,
        /// Child condition.
        query: Box<IndexQuery>,
    },
}

impl IndexQuery {
    /// Conjunction that flattens trivial cases.
    pub fn and(mut parts: Vec<IndexQuery>) -> Self {
        parts.retain(|q| *q != IndexQuery::MatchAll);
        if parts.contains(&IndexQuery::MatchNone) {
            return IndexQuery::MatchNone;
        }
        match parts.len() {
            0 => IndexQuery::MatchAll,
            1 => parts.remove(0),
            _ => IndexQuery::And(parts),
        }
    }

    /// Disjunction that flattens trivial cases.
    pub fn or(mut parts: Vec<IndexQuery>) -> Self {
        parts.retain(|q| *q != IndexQuery::MatchNone);
        if parts.contains(&IndexQuery::MatchAll) {
            return IndexQuery::MatchAll;
        }
        match parts.len() {
            0 => IndexQuery::MatchNone,
            1 => parts.remove(0),
            _ => IndexQuery::Or(parts),
        }
    }

    /// Complement that folds constants and double negation.
    pub fn negate(self) -> Self {
        match self {
            IndexQuery::MatchAll => IndexQuery::MatchNone,
            IndexQuery::MatchNone => IndexQuery::MatchAll,
            IndexQuery::Not(inner) => *inner,
            other => IndexQuery::Not(Box::new(other)),
        }
    }

    /// Evaluates the query against one document.
    pub fn matches(&self, doc: &IndexDocument, analyzer: &Analyzer) -> bool {
        match self {
            IndexQuery::MatchAll => true,
            IndexQuery::MatchNone => false,
            IndexQuery::Term { field, value } => any_element(doc, field, |v| {
                v.compare(value) == Some(Ordering::Equal)
            }),
            IndexQuery::Terms { field, values } => any_element(doc, field, |v| {
                values
                    .iter()
                    .any(|c| v.compare(c) == Some(Ordering::Equal))
            }),
            IndexQuery::Wildcard { field, mode, text } => {
                let needle = text.to_lowercase();
                any_element(doc, field, |v| {
                    v.as_text().is_some_and(|t| {
                        let t = t.to_lowercase();
                        match mode {
                            WildcardMode::Contains => t.contains(&needle),
                            WildcardMode::Prefix => t.starts_with(&needle),
                            WildcardMode::Suffix => t.ends_with(&needle),
                        }
                    })
                })
            }
            IndexQuery::Phrase { field, text } => any_element(doc, field, |v| {
                v.as_text().is_some_and(|t| analyzer.phrase_matches(t, text))
            }),
            IndexQuery::Range { field, op, value } => any_element(doc, field, |v| {
                v.compare(value).is_some_and(|o| op.holds(o))
            }),
            IndexQuery::Exists { field } => any_element(doc, field, |_| true),
            IndexQuery::Not(inner) => !inner.matches(doc, analyzer),
            IndexQuery::And(parts) => parts.iter().all(|q| q.matches(doc, analyzer)),
            IndexQuery::Or(parts) => parts.iter().any(|q| q.matches(doc, analyzer)),
            IndexQuery::BlockJoin {
                parent_type,
                child_type,
                query,
            } => {
                doc.doc_type == *parent_type
                    && doc
                        .children
                        .iter()
                        .any(|c| c.doc_type == *child_type && query.matches(c, analyzer))
            }
        }
    }
}

fn any_element(doc: &IndexDocument, field: &str, test: impl Fn(&Value) -> bool) -> bool {
    doc.get(field)
        .is_some_and(|value| value.elements().any(|v| test(v)))
}

const SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/', ' ',
];

fn escape_term(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
        other => quoted(&other.to_string()),
    }
}

impl fmt::Display for IndexQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexQuery::MatchAll => write!(f, "*:*"),
            IndexQuery::MatchNone => write!(f, "(-*:*)"),
            IndexQuery::Term { field, value } => write!(f, "{field}:{}", literal(value)),
            IndexQuery::Terms { field, values } => {
                let items: Vec<String> = values.iter().map(literal).collect();
                write!(f, "{field}:({})", items.join(" OR "))
            }
            IndexQuery::Wildcard { field, mode, text } => {
                let text = escape_term(text);
                match mode {
                    WildcardMode::Contains => write!(f, "{field}:*{text}*"),
                    WildcardMode::Prefix => write!(f, "{field}:{text}*"),
                    WildcardMode::Suffix => write!(f, "{field}:*{text}"),
                }
            }
            IndexQuery::Phrase { field, text } => write!(f, "{field}:{}", quoted(text)),
            IndexQuery::Range { field, op, value } => {
                let v = literal(value);
                match op {
                    RangeOp::Gt => write!(f, "{field}:{{{v} TO *]"),
                    RangeOp::Gte => write!(f, "{field}:[{v} TO *]"),
                    RangeOp::Lt => write!(f, "{field}:[* TO {v}}}"),
                    RangeOp::Lte => write!(f, "{field}:[* TO {v}]"),
                }
            }
            IndexQuery::Exists { field } => write!(f, "{field}:[* TO *]"),
            IndexQuery::Not(inner) => write!(f, "(*:* -{inner})"),
            IndexQuery::And(parts) => join(f, parts, " AND ", "*:*"),
            IndexQuery::Or(parts) => join(f, parts, " OR ", "(-*:*)"),
            IndexQuery::BlockJoin {
                parent_type,
                child_type,
                query,
            } => write!(
                f,
                "{{!parent which=\"{TYPE_FIELD}:{}\"}}(+{TYPE_FIELD}:{} +{query})",
                escape_term(parent_type),
                escape_term(child_type)
            ),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, parts: &[IndexQuery], sep: &str, empty: &str) -> fmt::Result {
    if parts.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{part}")?;
    }
    write!(f, ")")
}

/// One sort key of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Sortable field name.
    pub field: String,
    /// Descending when true.
    pub descending: bool,
}

/// Offset/limit window of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Hits to skip.
    pub offset: u64,
    /// Maximum hits returned.
    pub limit: u64,
}

/// A search over the top-level documents of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Collection to search.
    pub collection: String,
    /// Type of the returned documents.
    pub doc_type: String,
    /// Main query.
    pub query: IndexQuery,
    /// Sort keys, most significant first.
    pub sort: Vec<SortField>,
    /// Optional paging window.
    pub page: Option<Page>,
}

impl SearchRequest {
    /// Searches every document of `doc_type` in `collection`.
    pub fn new(collection: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            doc_type: doc_type.into(),
            query: IndexQuery::MatchAll,
            sort: Vec::new(),
            page: None,
        }
    }

    /// Sets the query.
    #[must_use]
    pub fn query(mut self, query: IndexQuery) -> Self {
        self.query = query;
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            descending,
        });
        self
    }

    /// Sets the paging window.
    #[must_use]
    pub fn page(mut self, page: Option<Page>) -> Self {
        self.page = page;
        self
    }

    /// Request parameters as a Solr select handler would receive them.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.query.to_string()),
            ("fq", format!("{TYPE_FIELD}:{}", escape_term(&self.doc_type))),
        ];
        if !self.sort.is_empty() {
            let sort: Vec<String> = self
                .sort
                .iter()
                .map(|s| format!("{} {}", s.field, if s.descending { "desc" } else { "asc" }))
                .collect();
            params.push(("sort", sort.join(",")));
        }
        if let Some(page) = self.page {
            params.push(("start", page.offset.to_string()));
            params.push(("rows", page.limit.to_string()));
        }
        params
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .to_params()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{}", params.join("&"))
    }
}

/// Ids of matching documents in sort order, and the total ignoring paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    /// Ids within the requested window.
    pub ids: Vec<String>,
    /// Total number of matches.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> IndexDocument {
        IndexDocument::new(name, "producer").with("name", name)
    }

    #[test]
    fn wildcard_is_case_insensitive() {
        let q = IndexQuery::Wildcard {
            field: "name".into(),
            mode: WildcardMode::Contains,
            text: "LPH".into(),
        };
        assert!(q.matches(&doc("alpha"), &Analyzer::default()));
        assert!(!q.matches(&doc("beta"), &Analyzer::default()));
    }

    #[test]
    fn negation_matches_missing_fields() {
        let q = IndexQuery::Term {
            field: "code".into(),
            value: "x".into(),
        }
        .negate();
        assert!(q.matches(&doc("alpha"), &Analyzer::default()));
    }

    #[test]
    fn block_join_tests_children_of_type() {
        let mut parent = IndexDocument::new("p", "package");
        parent.push_child(IndexDocument::new("t1", "task").with("state", "done"));
        parent.push_child(IndexDocument::new("t2", "task").with("state", "pending"));
        let join = |state: &str| IndexQuery::BlockJoin {
            parent_type: "package".into(),
            child_type: "task".into(),
            query: Box::new(IndexQuery::Term {
                field: "state".into(),
                value: state.into(),
            }),
        };
        let a = Analyzer::default();
        assert!(join("done").matches(&parent, &a));
        assert!(!join("failed").matches(&parent, &a));
    }

    #[test]
    fn renders_solr_syntax() {
        let q = IndexQuery::and(vec![
            IndexQuery::Wildcard {
                field: "name".into(),
                mode: WildcardMode::Contains,
                text: "a b".into(),
            },
            IndexQuery::Range {
                field: "order".into(),
                op: RangeOp::Gt,
                value: Value::Integer(3),
            },
            IndexQuery::Exists {
                field: "deleted".into(),
            }
            .negate(),
        ]);
        assert_eq!(
            q.to_string(),
            "(name:*a\\ b* AND order:{3 TO *] AND (*:* -deleted:[* TO *]))"
        );
    }

    #[test]
    fn renders_block_join() {
        let q = IndexQuery::BlockJoin {
            parent_type: "package".into(),
            child_type: "task".into(),
            query: Box::new(IndexQuery::Term {
                field: "state".into(),
                value: "done".into(),
            }),
        };
        assert_eq!(
            q.to_string(),
            "{!parent which=\"index_type:package\"}(+index_type:task +state:\"done\")"
        );
    }

    #[test]
    fn request_params() {
        let request = SearchRequest::new("producer", "producer")
            .sort_by("name", false)
            .sort_by("id", false)
            .page(Some(Page { offset: 10, limit: 10 }));
        assert_eq!(
            request.to_string(),
            "q=*:*&fq=index_type:producer&sort=name asc,id asc&start=10&rows=10"
        );
    }
}
