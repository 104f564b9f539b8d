//! Relational predicate tree.
//!
//! A `Predicate` is what the query compiler produces for the record store. It
//! can be rendered to parameterized SQL for a real database, or evaluated
//! directly against rows by the in-memory backend. Both paths share the same
//! two-valued semantics:
//!
//! - a comparison against a missing column is false
//! - `NOT p` is true whenever `p` is not true (rendered as `NOT COALESCE(p, FALSE)`)
//! - `EXISTS` matches a parent once, however many children satisfy the subtree

use crate::row::{column, Row, ID_COLUMN};
use dualstore_codec::Value;
use std::cmp::Ordering;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Returns true if `ordering` (left compared to right) satisfies the operator.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Where a `LIKE` needle must occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeMode {
    /// Anywhere in the value.
    Contains,
    /// At the start of the value.
    Prefix,
    /// At the end of the value.
    Suffix,
}

/// A boolean condition over the rows of one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    True,
    /// Matches no row.
    False,
    /// `column <op> value`.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: Value,
    },
    /// `column IN (values...)`.
    InList {
        /// Column name.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Case-insensitive `LIKE`.
    Like {
        /// Column name.
        column: String,
        /// Placement of the needle.
        mode: LikeMode,
        /// Literal text to look for. Wildcards are escaped on rendering.
        needle: String,
    },
    /// `column IS NULL`.
    IsNull(String),
    /// `column IS NOT NULL`.
    IsNotNull(String),
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction. Empty is true.
    And(Vec<Predicate>),
    /// Disjunction. Empty is false.
    Or(Vec<Predicate>),
    /// Correlated subquery over a child table whose `foreign_key` column holds
    /// the parent's id.
    Exists {
        /// Child table.
        table: String,
        /// Column in the child table referencing the parent id.
        foreign_key: String,
        /// Condition the child rows must satisfy.
        predicate: Box<Predicate>,
    },
}

/// Lookup of child rows used when evaluating `EXISTS`.
pub trait ChildRows {
    /// Returns the rows of `table` whose `foreign_key` equals `parent_id`.
    fn child_rows(&self, table: &str, foreign_key: &str, parent_id: &Value) -> Vec<Row>;
}

/// A lookup with no child tables; every `EXISTS` is false.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChildren;

impl ChildRows for NoChildren {
    fn child_rows(&self, _table: &str, _foreign_key: &str, _parent_id: &Value) -> Vec<Row> {
        Vec::new()
    }
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column <op> value`.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction that flattens trivial cases.
    pub fn and(mut parts: Vec<Predicate>) -> Self {
        parts.retain(|p| *p != Predicate::True);
        if parts.contains(&Predicate::False) {
            return Predicate::False;
        }
        match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Disjunction that flattens trivial cases.
    pub fn or(mut parts: Vec<Predicate>) -> Self {
        parts.retain(|p| *p != Predicate::False);
        if parts.contains(&Predicate::True) {
            return Predicate::True;
        }
        match parts.len() {
            0 => Predicate::False,
            1 => parts.remove(0),
            _ => Predicate::Or(parts),
        }
    }

    /// Negation that folds constants and double negation.
    pub fn negate(self) -> Self {
        match self {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Evaluates the predicate against a row.
    pub fn evaluate(&self, row: &Row, children: &dyn ChildRows) -> bool {
        match self {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::Compare { column: col, op, value } => column(row, col)
                .elements()
                .any(|v| v.compare(value).is_some_and(|o| op.holds(o))),
            Predicate::InList { column: col, values } => column(row, col)
                .elements()
                .any(|v| values.iter().any(|c| v.compare(c) == Some(Ordering::Equal))),
            Predicate::Like {
                column: col,
                mode,
                needle,
            } => {
                let needle = needle.to_lowercase();
                column(row, col).elements().any(|v| {
                    v.as_text().is_some_and(|text| {
                        let text = text.to_lowercase();
                        match mode {
                            LikeMode::Contains => text.contains(&needle),
                            LikeMode::Prefix => text.starts_with(&needle),
                            LikeMode::Suffix => text.ends_with(&needle),
                        }
                    })
                })
            }
            Predicate::IsNull(col) => column(row, col).elements().next().is_none(),
            Predicate::IsNotNull(col) => column(row, col).elements().next().is_some(),
            Predicate::Not(inner) => !inner.evaluate(row, children),
            Predicate::And(parts) => parts.iter().all(|p| p.evaluate(row, children)),
            Predicate::Or(parts) => parts.iter().any(|p| p.evaluate(row, children)),
            Predicate::Exists {
                table,
                foreign_key,
                predicate,
            } => {
                let parent_id = column(row, ID_COLUMN);
                if parent_id.is_null() {
                    return false;
                }
                children
                    .child_rows(table, foreign_key, parent_id)
                    .iter()
                    .any(|child| predicate.evaluate(child, children))
            }
        }
    }

    /// Renders the predicate as a SQL boolean expression over `alias`.
    ///
    /// Bind parameters are appended to `writer`.
    pub fn render(&self, alias: &str, writer: &mut SqlWriter) -> String {
        match self {
            Predicate::True => "TRUE".to_string(),
            Predicate::False => "FALSE".to_string(),
            Predicate::Compare { column, op, value } => {
                let bind = writer.bind(value.clone());
                format!("{} {} {bind}", qualified(alias, column), op.sql())
            }
            Predicate::InList { column, values } => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let binds: Vec<String> = values.iter().map(|v| writer.bind(v.clone())).collect();
                format!("{} IN ({})", qualified(alias, column), binds.join(", "))
            }
            Predicate::Like {
                column,
                mode,
                needle,
            } => {
                let escaped = escape_like(&needle.to_lowercase());
                let pattern = match mode {
                    LikeMode::Contains => format!("%{escaped}%"),
                    LikeMode::Prefix => format!("{escaped}%"),
                    LikeMode::Suffix => format!("%{escaped}"),
                };
                let bind = writer.bind(Value::Text(pattern));
                format!(
                    "LOWER({}) LIKE {bind} ESCAPE '\\'",
                    qualified(alias, column)
                )
            }
            Predicate::IsNull(column) => format!("{} IS NULL", qualified(alias, column)),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", qualified(alias, column)),
            Predicate::Not(inner) => {
                format!("NOT COALESCE({}, FALSE)", inner.render(alias, writer))
            }
            Predicate::And(parts) => join(parts, " AND ", "TRUE", alias, writer),
            Predicate::Or(parts) => join(parts, " OR ", "FALSE", alias, writer),
            Predicate::Exists {
                table,
                foreign_key,
                predicate,
            } => {
                let child = writer.next_alias();
                let inner = predicate.render(&child, writer);
                format!(
                    "EXISTS (SELECT 1 FROM {} {child} WHERE {} = {} AND {inner})",
                    quote_ident(table),
                    qualified(&child, foreign_key),
                    qualified(alias, ID_COLUMN),
                )
            }
        }
    }
}

fn join(
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    alias: &str,
    writer: &mut SqlWriter,
) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts.iter().map(|p| p.render(alias, writer)).collect();
    format!("({})", rendered.join(separator))
}

/// Accumulates bind parameters and table aliases while rendering SQL.
#[derive(Debug)]
pub struct SqlWriter {
    params: Vec<Value>,
    aliases: usize,
}

impl Default for SqlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWriter {
    /// Creates a writer whose outer table alias is `t0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            aliases: 1,
        }
    }

    /// Registers a bind parameter and returns its placeholder (`$1`, `$2`, ...).
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Allocates a fresh table alias.
    pub fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.aliases);
        self.aliases += 1;
        alias
    }

    /// Consumes the writer, returning the collected parameters.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// Double-quotes an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(alias: &str, column: &str) -> String {
    format!("{alias}.{}", quote_ident(column))
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
