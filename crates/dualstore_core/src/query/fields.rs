//! Field-path tables.
//!
//! A [`FieldTable`] maps the dot-separated field paths used in filters and
//! sort keys to a relational column and an index field, with the field's
//! kind. It is the only place the query compiler learns about an entity's
//! shape.

use crate::entity::{
    ACTIVE_COLUMN, CREATED_COLUMN, DELETED_COLUMN, NAME_COLUMN, ORDER_COLUMN, UPDATED_COLUMN,
};
use crate::error::{CoreError, CoreResult};
use dualstore_codec::FieldKind;
use dualstore_index::{IndexSchema, ID_FIELD, TYPE_FIELD};
use dualstore_storage::ID_COLUMN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where one field path lives in each backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Field kind.
    pub kind: FieldKind,
    /// Relational column. Defaults to the path with dots replaced by `_`.
    #[serde(default)]
    pub column: String,
    /// Index field. Defaults like `column`.
    #[serde(default)]
    pub index_field: String,
    /// Non-analyzed copy of a text field, for exact and wildcard matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_field: Option<String>,
    /// Sortable copy of a text field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
}

fn default_name(path: &str) -> String {
    path.replace('.', "_")
}

impl FieldMapping {
    /// Maps `path` to a column and index field of the same name.
    pub fn new(path: &str, kind: FieldKind) -> Self {
        Self {
            kind,
            column: default_name(path),
            index_field: default_name(path),
            keyword_field: None,
            sort_field: None,
        }
    }

    /// A full-text field with `<field>_kw` and `<field>_sort` keyword copies.
    pub fn text_with_copies(path: &str) -> Self {
        let base = default_name(path);
        Self {
            keyword_field: Some(format!("{base}_kw")),
            sort_field: Some(format!("{base}_sort")),
            ..Self::new(path, FieldKind::Text)
        }
    }

    /// Overrides the relational column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Overrides the index field.
    #[must_use]
    pub fn index_field(mut self, field: impl Into<String>) -> Self {
        self.index_field = field.into();
        self
    }

    /// Index field usable for exact, range and wildcard matches.
    pub fn term_field(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Text => self.keyword_field.as_deref(),
            _ => Some(self.keyword_field.as_deref().unwrap_or(&self.index_field)),
        }
    }

    /// Index field usable for sorting.
    pub fn sortable_field(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Text => self.sort_field.as_deref(),
            _ => Some(self.sort_field.as_deref().unwrap_or(&self.index_field)),
        }
    }

    /// Index fields the projection fills from this mapping's column, with
    /// their kinds. The main field comes first.
    pub fn index_targets(&self) -> Vec<(&str, FieldKind)> {
        let copy_kind = if self.kind == FieldKind::Text {
            FieldKind::Keyword
        } else {
            self.kind
        };
        let mut targets = vec![(self.index_field.as_str(), self.kind)];
        for copy in [&self.keyword_field, &self.sort_field].into_iter().flatten() {
            if copy != &self.index_field && !targets.iter().any(|(f, _)| *f == copy.as_str()) {
                targets.push((copy.as_str(), copy_kind));
            }
        }
        targets
    }
}

/// A nested child collection reachable from a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedMapping {
    /// Relational child table.
    pub child_table: String,
    /// Column of the child table holding the parent id.
    pub foreign_key: String,
    /// Index document type of the child documents.
    pub child_type: String,
    /// Field paths of the child, relative to the child.
    #[serde(default)]
    pub fields: FieldTable,
}

impl NestedMapping {
    /// Creates a nested mapping.
    pub fn new(
        child_table: impl Into<String>,
        foreign_key: impl Into<String>,
        child_type: impl Into<String>,
        fields: FieldTable,
    ) -> Self {
        Self {
            child_table: child_table.into(),
            foreign_key: foreign_key.into(),
            child_type: child_type.into(),
            fields,
        }
    }
}

/// Field paths of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldTableRepr")]
pub struct FieldTable {
    /// Scalar field paths.
    pub fields: BTreeMap<String, FieldMapping>,
    /// Nested child collections by path.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub nested: BTreeMap<String, NestedMapping>,
}

#[derive(Deserialize)]
struct FieldTableRepr {
    #[serde(default)]
    fields: BTreeMap<String, FieldMapping>,
    #[serde(default)]
    nested: BTreeMap<String, NestedMapping>,
}

impl From<FieldTableRepr> for FieldTable {
    fn from(repr: FieldTableRepr) -> Self {
        let fields = repr
            .fields
            .into_iter()
            .map(|(path, mut mapping)| {
                if mapping.column.is_empty() {
                    mapping.column = default_name(&path);
                }
                if mapping.index_field.is_empty() {
                    mapping.index_field = default_name(&path);
                }
                (path, mapping)
            })
            .collect();
        Self {
            fields,
            nested: repr.nested,
        }
    }
}

impl FieldTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the `id` field.
    #[must_use]
    pub fn identity() -> Self {
        Self::new().field(ID_COLUMN, FieldKind::Keyword)
    }

    /// Identity plus `created`, `updated` and `deleted`.
    #[must_use]
    pub fn dated() -> Self {
        Self::identity()
            .field(CREATED_COLUMN, FieldKind::Timestamp)
            .field(UPDATED_COLUMN, FieldKind::Timestamp)
            .field(DELETED_COLUMN, FieldKind::Timestamp)
    }

    /// Dated plus `name`, `order` and `active`.
    #[must_use]
    pub fn dictionary() -> Self {
        Self::dated()
            .field(NAME_COLUMN, FieldKind::Keyword)
            .field(ORDER_COLUMN, FieldKind::Integer)
            .field(ACTIVE_COLUMN, FieldKind::Boolean)
    }

    /// Adds a field whose column and index field are named after the path.
    #[must_use]
    pub fn field(self, path: &str, kind: FieldKind) -> Self {
        let mapping = FieldMapping::new(path, kind);
        self.mapping(path, mapping)
    }

    /// Adds a field with an explicit mapping.
    #[must_use]
    pub fn mapping(mut self, path: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields.insert(path.into(), mapping);
        self
    }

    /// Adds a nested child collection.
    #[must_use]
    pub fn nested(mut self, path: impl Into<String>, nested: NestedMapping) -> Self {
        self.nested.insert(path.into(), nested);
        self
    }

    /// Looks up a scalar field path.
    pub fn get(&self, path: &str) -> Option<&FieldMapping> {
        self.fields.get(path)
    }

    /// Looks up a scalar field path that a query names.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedParameter` for unmapped paths.
    pub fn require(&self, path: &str) -> CoreResult<&FieldMapping> {
        self.fields
            .get(path)
            .ok_or_else(|| CoreError::unsupported(format!("unknown field {path:?}")))
    }

    /// Looks up a nested collection path that a query names.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedParameter` for unmapped paths.
    pub fn require_nested(&self, path: &str) -> CoreResult<&NestedMapping> {
        self.nested
            .get(path)
            .ok_or_else(|| CoreError::unsupported(format!("unknown nested collection {path:?}")))
    }

    /// Index schema covering every mapped field, copy and nested child field.
    pub fn index_schema(&self, collection: &str) -> IndexSchema {
        let mut schema = IndexSchema::new(collection);
        self.collect_schema(&mut schema);
        schema
    }

    fn collect_schema(&self, schema: &mut IndexSchema) {
        for mapping in self.fields.values() {
            for (field, kind) in mapping.index_targets() {
                if field != ID_FIELD {
                    schema.fields.insert(field.to_string(), kind);
                }
            }
        }
        for nested in self.nested.values() {
            nested.fields.collect_schema(schema);
        }
    }

    /// Checks the table for mistakes that would only show at query or index
    /// time.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = BTreeMap::new();
        self.validate_into(&mut seen, "")
    }

    fn validate_into(
        &self,
        seen: &mut BTreeMap<String, (String, FieldKind)>,
        prefix: &str,
    ) -> CoreResult<()> {
        for (path, mapping) in &self.fields {
            let full_path = format!("{prefix}{path}");
            if path.is_empty() || mapping.column.is_empty() || mapping.index_field.is_empty() {
                return Err(CoreError::configuration(format!(
                    "field {full_path:?} has an empty path, column or index field"
                )));
            }
            if path == ID_COLUMN && mapping.kind != FieldKind::Keyword {
                return Err(CoreError::configuration("field \"id\" must be a keyword"));
            }
            if mapping.index_field == TYPE_FIELD {
                return Err(CoreError::configuration(format!(
                    "field {full_path:?} uses the reserved index field {TYPE_FIELD:?}"
                )));
            }
            for (field, kind) in mapping.index_targets() {
                if let Some((other, existing)) = seen.get(field) {
                    if *existing != kind {
                        return Err(CoreError::configuration(format!(
                            "index field {field:?} is {existing} for {other:?} but {kind} for {full_path:?}"
                        )));
                    }
                } else {
                    seen.insert(field.to_string(), (full_path.clone(), kind));
                }
            }
        }
        for (path, nested) in &self.nested {
            if nested.child_table.is_empty()
                || nested.foreign_key.is_empty()
                || nested.child_type.is_empty()
            {
                return Err(CoreError::configuration(format!(
                    "nested collection {prefix}{path:?} needs a child table, foreign key and child type"
                )));
            }
            nested
                .fields
                .validate_into(seen, &format!("{prefix}{path}."))?;
        }
        Ok(())
    }
}
