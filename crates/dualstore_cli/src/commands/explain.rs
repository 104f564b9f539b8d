//! Explain command implementation.

use super::read_json;
use crate::error::CliResult;
use crate::OutputFormat;
use dualstore_core::query::{compile_search, compile_select};
use dualstore_core::{FieldTable, Filter, Params, StoreConfig, ACTIVE_COLUMN, DELETED_COLUMN};
use dualstore_index::SearchRequest;
use dualstore_storage::SqlStatement;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Store flavour whose implicit filters are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// No implicit filters.
    Basic,
    /// Soft-deleted records hidden.
    Dated,
    /// Soft-deleted and inactive records hidden.
    Dictionary,
}

impl StoreKind {
    /// Filters the store adds unless the query addresses the same field.
    pub fn implicit_filters(self, params: &Params) -> Vec<Filter> {
        let mut implicit = Vec::new();
        if self != StoreKind::Basic && !params.targets(DELETED_COLUMN) {
            implicit.push(Filter::is_null(DELETED_COLUMN));
        }
        if self == StoreKind::Dictionary && !params.targets(ACTIVE_COLUMN) {
            implicit.push(Filter::eq(ACTIVE_COLUMN, "true"));
        }
        implicit
    }
}

/// Inputs of the explain command.
#[derive(Debug, Clone)]
pub struct ExplainOptions {
    /// Field table JSON file.
    pub fields: PathBuf,
    /// Params JSON file.
    pub params: PathBuf,
    /// Optional store configuration JSON file.
    pub config: Option<PathBuf>,
    /// Relational table, also the index collection.
    pub table: String,
    /// Index document type.
    pub index_type: String,
    /// Store flavour.
    pub store: StoreKind,
}

/// A statement with its bind values rendered as text.
#[derive(Debug, Serialize)]
pub struct RenderedSql {
    /// SQL text with `$n` placeholders.
    pub text: String,
    /// Bind values in placeholder order.
    pub params: Vec<String>,
}

impl From<SqlStatement> for RenderedSql {
    fn from(statement: SqlStatement) -> Self {
        Self {
            text: statement.text,
            params: statement.params.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One search request parameter.
#[derive(Debug, Serialize)]
pub struct RequestParam {
    /// Parameter name.
    pub name: &'static str,
    /// Parameter value.
    pub value: String,
}

/// Both compilations of one query.
#[derive(Debug, Serialize)]
pub struct Explanation {
    /// Store flavour applied.
    pub store: StoreKind,
    /// Implicit filters added by the store.
    pub implicit: Vec<Filter>,
    /// Relational select.
    pub select: RenderedSql,
    /// Relational count.
    pub count: RenderedSql,
    /// Index collection.
    pub collection: String,
    /// Index request parameters.
    pub search: Vec<RequestParam>,
}

/// Compiles `params` against `fields` for both backends.
pub fn explain(
    fields: &FieldTable,
    params: &Params,
    config: &StoreConfig,
    table: &str,
    index_type: &str,
    store: StoreKind,
) -> CliResult<Explanation> {
    fields.validate()?;
    let implicit = store.implicit_filters(params);
    let select = compile_select(table, fields, params, &implicit, config)?;
    let request: SearchRequest =
        compile_search(table, index_type, fields, params, &implicit, config)?;
    Ok(Explanation {
        store,
        implicit,
        count: select.to_count_sql().into(),
        select: select.to_sql().into(),
        collection: request.collection.clone(),
        search: request
            .to_params()
            .into_iter()
            .map(|(name, value)| RequestParam { name, value })
            .collect(),
    })
}

/// Runs the explain command and returns its output.
pub fn run(options: &ExplainOptions, format: OutputFormat) -> CliResult<String> {
    let fields: FieldTable = read_json(&options.fields)?;
    let params: Params = read_json(&options.params)?;
    let config: StoreConfig = match &options.config {
        Some(path) => read_json(path)?,
        None => StoreConfig::default(),
    };
    info!(table = %options.table, store = ?options.store, "explaining query");

    let explanation = explain(
        &fields,
        &params,
        &config,
        &options.table,
        &options.index_type,
        options.store,
    )?;
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&explanation)? + "\n"),
        OutputFormat::Text => Ok(render_text(&explanation)),
    }
}

fn render_text(explanation: &Explanation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Relational");
    let _ = writeln!(out, "==========");
    let _ = writeln!(out, "{}", explanation.select.text);
    for (i, value) in explanation.select.params.iter().enumerate() {
        let _ = writeln!(out, "  ${} = {value}", i + 1);
    }
    let _ = writeln!(out, "{}", explanation.count.text);
    let _ = writeln!(out);
    let _ = writeln!(out, "Index ({})", explanation.collection);
    let _ = writeln!(out, "=====");
    for param in &explanation.search {
        let _ = writeln!(out, "{}={}", param.name, param.value);
    }
    out
}
