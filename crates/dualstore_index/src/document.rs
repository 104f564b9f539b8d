//! Index documents and schemas.

use crate::error::{IndexError, IndexResult};
use dualstore_codec::{FieldKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding a document's type. Every document carries it implicitly.
pub const TYPE_FIELD: &str = "index_type";

/// Field holding a document's id.
pub const ID_FIELD: &str = "id";

/// A denormalized, read-optimized projection of one record.
///
/// Child documents are indexed as a block with their parent and can only be
/// reached through block-join queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Id of the source record.
    pub id: String,
    /// Document type, stored in [`TYPE_FIELD`].
    pub doc_type: String,
    /// Field values keyed by index field name.
    pub fields: BTreeMap<String, Value>,
    /// Nested child documents.
    pub children: Vec<IndexDocument>,
}

impl IndexDocument {
    /// Creates an empty document.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            fields: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Sets a field. `Null` values remove the field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        match value.into() {
            Value::Null => {
                self.fields.remove(&field);
            }
            value => {
                self.fields.insert(field, value);
            }
        }
    }

    /// Builder form of [`IndexDocument::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Reads a field, including the implicit id and type fields.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => Some(Value::Text(self.id.clone())),
            TYPE_FIELD => Some(Value::Text(self.doc_type.clone())),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Appends a child document.
    pub fn push_child(&mut self, child: IndexDocument) {
        self.children.push(child);
    }
}

/// Field declarations of one index collection.
///
/// Parent and child documents share the collection's field namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Collection name.
    pub collection: String,
    /// Declared fields and their kinds.
    pub fields: BTreeMap<String, FieldKind>,
}

impl IndexSchema {
    /// Creates a schema with no fields.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Kind of a declared field. `id` and the type field are keywords.
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        match field {
            ID_FIELD | TYPE_FIELD => Some(FieldKind::Keyword),
            _ => self.fields.get(field).copied(),
        }
    }

    /// Checks a document and its children against the declared fields.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::UnknownField` for undeclared fields and
    /// `IndexError::InvalidDocument` for empty ids or values of the wrong kind.
    pub fn check(&self, doc: &IndexDocument) -> IndexResult<()> {
        if doc.id.is_empty() {
            return Err(IndexError::invalid_document(&doc.id, "empty id"));
        }
        for (name, value) in &doc.fields {
            let kind = self.fields.get(name).ok_or_else(|| IndexError::UnknownField {
                collection: self.collection.clone(),
                field: name.clone(),
            })?;
            if let Some(bad) = value.elements().find(|v| !kind_accepts(*kind, v)) {
                return Err(IndexError::invalid_document(
                    &doc.id,
                    format!("field {name:?} is {kind} but got {}", bad.kind_name()),
                ));
            }
        }
        doc.children.iter().try_for_each(|child| self.check(child))
    }
}

fn kind_accepts(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Keyword | FieldKind::Text => matches!(value, Value::Text(_)),
        FieldKind::Integer => matches!(value, Value::Integer(_)),
        FieldKind::Float => matches!(value, Value::Float(_) | Value::Integer(_)),
        FieldKind::Timestamp => matches!(value, Value::Timestamp(_)),
        FieldKind::Boolean => matches!(value, Value::Bool(_)),
    }
}
