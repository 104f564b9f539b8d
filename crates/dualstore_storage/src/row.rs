//! Relational rows.

use dualstore_codec::Value;
use std::collections::BTreeMap;

/// Name of the primary-key column every table carries.
pub const ID_COLUMN: &str = "id";

/// One row: column name to value. Missing columns read as `NULL`.
pub type Row = BTreeMap<String, Value>;

/// Returns the id of a row, if it has a textual one.
pub fn row_id(row: &Row) -> Option<&str> {
    row.get(ID_COLUMN).and_then(Value::as_text)
}

/// Reads a column, treating absence as `NULL`.
pub fn column<'a>(row: &'a Row, name: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    row.get(name).unwrap_or(&NULL)
}
