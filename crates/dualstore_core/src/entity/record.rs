//! Mapping between entities and relational rows.

use crate::entity::EntityId;
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use dualstore_codec::{CodecError, Value};
use dualstore_storage::{column, Row, ID_COLUMN};
use std::collections::BTreeMap;

/// A persisted entity.
///
/// Equality of entities is identity equality: implementors should compare
/// by [`Entity::id`] only, which [`crate::identity_eq!`] derives.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns the entity's stable identifier.
    fn id(&self) -> &EntityId;
}

/// A child table holding rows owned by a parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildTable {
    /// Table name.
    pub table: &'static str,
    /// Column holding the parent's id.
    pub foreign_key: &'static str,
}

/// The rows an entity owns in one child table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSet {
    /// Target child table.
    pub table: ChildTable,
    /// Child rows. Each needs its own textual `id`; the store fills the
    /// foreign key.
    pub rows: Vec<Row>,
}

/// Child rows loaded for one entity, keyed by child table name, each list
/// ordered by child id.
pub type ChildRecords = BTreeMap<String, Vec<Row>>;

/// Conversion of an entity to and from relational rows.
///
/// `encode` must be deterministic: the stores compare encoded rows to decide
/// whether a save changed anything.
pub trait RecordCodec: Entity {
    /// Name of the entity type. Also the name of its table.
    fn entity_type() -> &'static str;

    /// Encodes the entity into its main row, including the `id` column.
    fn encode(&self) -> Row;

    /// Decodes an entity from its main row and child rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a required column is missing or has the wrong type.
    fn decode(row: &Row, children: &ChildRecords) -> CoreResult<Self>;

    /// Child tables this entity owns.
    fn child_tables() -> Vec<ChildTable> {
        Vec::new()
    }

    /// Child rows to persist, one set per entry of [`RecordCodec::child_tables`].
    fn child_sets(&self) -> Vec<ChildSet> {
        Vec::new()
    }
}

/// Starts a row holding only the `id` column.
pub fn new_row(id: &EntityId) -> Row {
    let mut row = Row::new();
    row.insert(ID_COLUMN.to_string(), Value::from(id));
    row
}

/// Typed read access to a row, used by [`RecordCodec::decode`] implementations.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    entity_type: &'static str,
    row: &'a Row,
}

impl<'a> RowView<'a> {
    /// Wraps a row of `entity_type`.
    pub fn new(entity_type: &'static str, row: &'a Row) -> Self {
        Self { entity_type, row }
    }

    /// Raw column value, `Null` when absent.
    pub fn value(&self, name: &str) -> &'a Value {
        column(self.row, name)
    }

    fn mismatch(&self, name: &str, expected: &str) -> CodecError {
        CodecError::type_mismatch(
            format!("{expected} in {}.{name}", self.entity_type),
            self.value(name).kind_name(),
        )
    }

    /// The `id` column.
    ///
    /// # Errors
    ///
    /// Returns an error if the row has no textual id.
    pub fn id(&self) -> CoreResult<EntityId> {
        Ok(EntityId::from(self.text(ID_COLUMN)?))
    }

    /// A required text column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or not text.
    pub fn text(&self, name: &str) -> CoreResult<String> {
        self.opt_text(name)
            .ok_or_else(|| self.mismatch(name, "text").into())
    }

    /// An optional text column.
    pub fn opt_text(&self, name: &str) -> Option<String> {
        self.value(name).as_text().map(str::to_string)
    }

    /// A required integer column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or not an integer.
    pub fn integer(&self, name: &str) -> CoreResult<i64> {
        self.value(name)
            .as_integer()
            .ok_or_else(|| self.mismatch(name, "integer").into())
    }

    /// A required float column. Integers are widened.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or not numeric.
    pub fn float(&self, name: &str) -> CoreResult<f64> {
        self.value(name)
            .as_float()
            .ok_or_else(|| self.mismatch(name, "float").into())
    }

    /// A required boolean column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or not a boolean.
    pub fn boolean(&self, name: &str) -> CoreResult<bool> {
        self.value(name)
            .as_bool()
            .ok_or_else(|| self.mismatch(name, "boolean").into())
    }

    /// An optional timestamp column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column holds something other than a timestamp.
    pub fn opt_timestamp(&self, name: &str) -> CoreResult<Option<DateTime<Utc>>> {
        match self.value(name) {
            Value::Null => Ok(None),
            Value::Timestamp(t) => Ok(Some(*t)),
            _ => Err(self.mismatch(name, "timestamp").into()),
        }
    }
}

/// Implements `PartialEq`, `Eq` and `Hash` for an [`Entity`] by id only.
///
/// ```rust
/// use dualstore_core::{identity_eq, Entity, EntityId};
///
/// #[derive(Debug, Clone)]
/// struct Note {
///     id: EntityId,
///     body: String,
/// }
///
/// impl Entity for Note {
///     fn id(&self) -> &EntityId {
///         &self.id
///     }
/// }
///
/// identity_eq!(Note);
///
/// let id = EntityId::new();
/// let a = Note { id: id.clone(), body: "draft".into() };
/// let b = Note { id, body: "final".into() };
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! identity_eq {
    ($ty:ty) => {
        impl ::std::cmp::PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::Entity::id(self) == $crate::Entity::id(other)
            }
        }

        impl ::std::cmp::Eq for $ty {}

        impl ::std::hash::Hash for $ty {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::hash::Hash::hash($crate::Entity::id(self), state);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ErrorKind};

    #[test]
    fn new_row_has_id() {
        let id = EntityId::from("n1");
        let row = new_row(&id);
        assert_eq!(RowView::new("note", &row).id().unwrap(), id);
    }

    #[test]
    fn typed_reads() {
        let mut row = new_row(&EntityId::from("n1"));
        row.insert("weight".into(), Value::Integer(3));
        row.insert("active".into(), Value::Bool(true));
        let view = RowView::new("note", &row);
        assert_eq!(view.integer("weight").unwrap(), 3);
        assert!((view.float("weight").unwrap() - 3.0).abs() < f64::EPSILON);
        assert!(view.boolean("active").unwrap());
        assert_eq!(view.opt_text("missing"), None);
        assert_eq!(view.opt_timestamp("missing").unwrap(), None);
    }

    #[test]
    fn wrong_type_is_codec_error() {
        let mut row = new_row(&EntityId::from("n1"));
        row.insert("weight".into(), Value::from("heavy"));
        let err = RowView::new("note", &row).integer("weight").unwrap_err();
        assert!(matches!(err, CoreError::Codec(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("note.weight"));
    }
}
