//! Check-fields command implementation.

use super::read_json;
use crate::error::CliResult;
use crate::OutputFormat;
use dualstore_codec::FieldKind;
use dualstore_core::FieldTable;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// One mapped field path.
#[derive(Debug, Serialize)]
pub struct FieldReport {
    /// Field path, prefixed by the nested path for child fields.
    pub path: String,
    /// Value kind.
    pub kind: FieldKind,
    /// Relational column.
    pub column: String,
    /// Index fields filled from the column.
    pub index_fields: Vec<String>,
    /// Whether the index can match exact values on this path.
    pub exact_match: bool,
    /// Whether the index can sort on this path.
    pub sortable: bool,
}

/// Result of checking a field table.
#[derive(Debug, Serialize)]
pub struct FieldsReport {
    /// Every mapped path, nested ones included.
    pub fields: Vec<FieldReport>,
    /// Nested collections as `path -> child table`.
    pub nested: BTreeMap<String, String>,
    /// Index schema the table implies.
    pub schema: BTreeMap<String, FieldKind>,
}

fn collect(
    table: &FieldTable,
    prefix: &str,
    out: &mut Vec<FieldReport>,
    nested: &mut BTreeMap<String, String>,
) {
    for (path, mapping) in &table.fields {
        out.push(FieldReport {
            path: format!("{prefix}{path}"),
            kind: mapping.kind,
            column: mapping.column.clone(),
            index_fields: mapping
                .index_targets()
                .into_iter()
                .map(|(field, _)| field.to_string())
                .collect(),
            exact_match: mapping.term_field().is_some(),
            sortable: mapping.sortable_field().is_some(),
        });
    }
    for (path, child) in &table.nested {
        let full = format!("{prefix}{path}");
        nested.insert(full.clone(), child.child_table.clone());
        collect(&child.fields, &format!("{full}."), out, nested);
    }
}

/// Validates `table` and describes what it maps.
pub fn check(table: &FieldTable) -> CliResult<FieldsReport> {
    table.validate()?;
    let mut fields = Vec::new();
    let mut nested = BTreeMap::new();
    collect(table, "", &mut fields, &mut nested);
    Ok(FieldsReport {
        fields,
        nested,
        schema: table.index_schema("").fields,
    })
}

/// Runs the check-fields command and returns its output.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<String> {
    let table: FieldTable = read_json(path)?;
    let report = check(&table)?;
    info!(fields = report.fields.len(), nested = report.nested.len(), "field table valid");
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&report)? + "\n"),
        OutputFormat::Text => Ok(render_text(&report)),
    }
}

fn render_text(report: &FieldsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Field table OK");
    let _ = writeln!(out);
    for field in &report.fields {
        let mut notes = Vec::new();
        if !field.exact_match {
            notes.push("no exact match in index");
        }
        if !field.sortable {
            notes.push("not sortable in index");
        }
        let _ = write!(
            out,
            "  {:<24} {:<10} column {:<16} index {}",
            field.path,
            field.kind.to_string(),
            field.column,
            field.index_fields.join(", ")
        );
        if !notes.is_empty() {
            let _ = write!(out, " ({})", notes.join("; "));
        }
        let _ = writeln!(out);
    }
    if !report.nested.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Nested:");
        for (path, table) in &report.nested {
            let _ = writeln!(out, "  {path} -> table {table}");
        }
    }
    out
}
