//! Select statements: predicate, ordering and paging window.

use crate::predicate::{quote_ident, Predicate, SqlWriter};
use crate::row::{column, Row};
use dualstore_codec::Value;
use std::cmp::Ordering;
use std::fmt;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: String,
    /// Descending when true.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending sort on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending sort on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Offset/limit paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

impl Window {
    /// Window for a zero-based page of `page_size` rows.
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            offset: u64::from(page) * u64::from(page_size),
            limit: u64::from(page_size),
        }
    }

    /// Applies the window to an already ordered sequence.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

/// A query over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Table to read.
    pub table: String,
    /// Row filter.
    pub predicate: Predicate,
    /// Sort keys, most significant first.
    pub order: Vec<OrderBy>,
    /// Optional paging window.
    pub window: Option<Window>,
}

/// Rendered SQL text with its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text with `$n` placeholders.
    pub text: String,
    /// Values for the placeholders, in order.
    pub params: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        for (i, param) in self.params.iter().enumerate() {
            write!(f, "\n  ${} = {param}", i + 1)?;
        }
        Ok(())
    }
}

impl Select {
    /// Selects every row of `table`.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicate: Predicate::True,
            order: Vec::new(),
            window: None,
        }
    }

    /// Sets the row filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Sets the paging window.
    #[must_use]
    pub fn window(mut self, window: Option<Window>) -> Self {
        self.window = window;
        self
    }

    /// Compares two rows by this statement's sort keys.
    ///
    /// Missing columns sort as `NULL`, which is lowest: first when ascending,
    /// last when descending.
    pub fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.order {
            let ord = column(a, &key.column).cmp(column(b, &key.column));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Renders `SELECT t0.* ...`.
    pub fn to_sql(&self) -> SqlStatement {
        let mut writer = SqlWriter::new();
        let mut text = format!(
            "SELECT t0.* FROM {} t0 WHERE {}",
            quote_ident(&self.table),
            self.predicate.render("t0", &mut writer)
        );
        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    if o.descending {
                        format!("t0.{} DESC NULLS LAST", quote_ident(&o.column))
                    } else {
                        format!("t0.{} ASC NULLS FIRST", quote_ident(&o.column))
                    }
                })
                .collect();
            text.push_str(" ORDER BY ");
            text.push_str(&keys.join(", "));
        }
        if let Some(window) = self.window {
            text.push_str(&format!(" LIMIT {} OFFSET {}", window.limit, window.offset));
        }
        SqlStatement {
            text,
            params: writer.into_params(),
        }
    }

    /// Renders the `SELECT COUNT(*)` counterpart, ignoring order and window.
    pub fn to_count_sql(&self) -> SqlStatement {
        let mut writer = SqlWriter::new();
        let text = format!(
            "SELECT COUNT(*) FROM {} t0 WHERE {}",
            quote_ident(&self.table),
            self.predicate.render("t0", &mut writer)
        );
        SqlStatement {
            text,
            params: writer.into_params(),
        }
    }
}
