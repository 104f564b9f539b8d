//! Declared field kinds and typed parsing of raw filter values.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a mapped field.
///
/// The kind decides how a filter's string value is parsed and, on the search
/// index side, whether the field is analyzed into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Exact-match string.
    Keyword,
    /// Analyzed full text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTC timestamp.
    Timestamp,
    /// Boolean flag.
    Boolean,
}

impl FieldKind {
    /// Returns true for kinds holding strings.
    pub fn is_textual(self) -> bool {
        matches!(self, FieldKind::Keyword | FieldKind::Text)
    }

    /// Parses a raw filter value into a typed value.
    ///
    /// Timestamps accept RFC 3339 or a bare `YYYY-MM-DD` date (midnight UTC).
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidValue` if `raw` does not fit the kind.
    pub fn parse(self, raw: &str) -> CodecResult<Value> {
        let invalid = || CodecError::invalid_value(self.to_string(), raw);
        match self {
            FieldKind::Keyword | FieldKind::Text => Ok(Value::Text(raw.to_string())),
            FieldKind::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float)
                .ok_or_else(invalid),
            FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            FieldKind::Timestamp => parse_timestamp(raw).map(Value::Timestamp).ok_or_else(invalid),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Keyword => "keyword",
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}
