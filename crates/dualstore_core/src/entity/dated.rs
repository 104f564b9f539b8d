//! Temporal and dictionary record fields.

use crate::entity::{RecordCodec, RowView};
use crate::error::CoreResult;
use chrono::{DateTime, Duration, Utc};
use dualstore_codec::Value;
use dualstore_storage::Row;

/// Column holding the first-persistence timestamp.
pub const CREATED_COLUMN: &str = "created";
/// Column holding the last-change timestamp.
pub const UPDATED_COLUMN: &str = "updated";
/// Column holding the soft-delete timestamp.
pub const DELETED_COLUMN: &str = "deleted";
/// Column holding a dictionary entry's name.
pub const NAME_COLUMN: &str = "name";
/// Column holding a dictionary entry's ordering value.
pub const ORDER_COLUMN: &str = "order";
/// Column holding a dictionary entry's active flag.
pub const ACTIVE_COLUMN: &str = "active";

/// Timestamps every temporal record carries.
///
/// `created` and `updated` are owned by the store: `created` is stamped on
/// first persistence and never changes, `updated` advances only when a save
/// changes persisted state. `deleted` is `None` while the record is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatedFields {
    /// First persistence.
    pub created: Option<DateTime<Utc>>,
    /// Last persisted change.
    pub updated: Option<DateTime<Utc>>,
    /// Soft-delete time.
    pub deleted: Option<DateTime<Utc>>,
}

impl DatedFields {
    /// Returns true if the record is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Writes the three timestamp columns.
    pub fn write(&self, row: &mut Row) {
        row.insert(CREATED_COLUMN.into(), Value::from(self.created));
        row.insert(UPDATED_COLUMN.into(), Value::from(self.updated));
        row.insert(DELETED_COLUMN.into(), Value::from(self.deleted));
    }

    /// Reads the three timestamp columns.
    ///
    /// # Errors
    ///
    /// Returns an error if a column holds something other than a timestamp.
    pub fn read(view: &RowView<'_>) -> CoreResult<Self> {
        Ok(Self {
            created: view.opt_timestamp(CREATED_COLUMN)?,
            updated: view.opt_timestamp(UPDATED_COLUMN)?,
            deleted: view.opt_timestamp(DELETED_COLUMN)?,
        })
    }
}

/// A record with [`DatedFields`].
pub trait Dated: RecordCodec {
    /// The record's timestamps.
    fn dated(&self) -> &DatedFields;

    /// Mutable access for the store.
    fn dated_mut(&mut self) -> &mut DatedFields;
}

/// Returns a timestamp strictly after `previous`, normally the current time.
pub(crate) fn stamp_after(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

/// Fields of an editable enumeration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryFields {
    /// Display name, unique among live entries.
    pub name: String,
    /// Position in the total order of entries.
    pub order: i64,
    /// Inactive entries are hidden from default listings but not deleted.
    pub active: bool,
}

impl DictionaryFields {
    /// An active entry at position zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            active: true,
        }
    }

    /// Sets the position.
    #[must_use]
    pub fn order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Writes the name, order and active columns.
    pub fn write(&self, row: &mut Row) {
        row.insert(NAME_COLUMN.into(), Value::from(self.name.as_str()));
        row.insert(ORDER_COLUMN.into(), Value::Integer(self.order));
        row.insert(ACTIVE_COLUMN.into(), Value::Bool(self.active));
    }

    /// Reads the name, order and active columns.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or mistyped.
    pub fn read(view: &RowView<'_>) -> CoreResult<Self> {
        Ok(Self {
            name: view.text(NAME_COLUMN)?,
            order: view.integer(ORDER_COLUMN)?,
            active: view.boolean(ACTIVE_COLUMN)?,
        })
    }
}

/// A dated record that is also a dictionary entry.
pub trait Dictionary: Dated {
    /// The entry's dictionary fields.
    fn dictionary(&self) -> &DictionaryFields;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{new_row, EntityId};

    #[test]
    fn dated_fields_round_trip_through_row() {
        let now = Utc::now();
        let fields = DatedFields {
            created: Some(now),
            updated: Some(now),
            deleted: None,
        };
        let mut row = new_row(&EntityId::from("x"));
        fields.write(&mut row);
        assert_eq!(row.get(DELETED_COLUMN), Some(&Value::Null));
        let read = DatedFields::read(&RowView::new("x", &row)).unwrap();
        assert_eq!(read, fields);
        assert!(!read.is_deleted());
    }

    #[test]
    fn stamp_after_is_strictly_later() {
        let future = Utc::now() + Duration::seconds(60);
        assert!(stamp_after(Some(future)) > future);
        assert!(stamp_after(None) <= Utc::now());
    }

    #[test]
    fn dictionary_defaults_to_active() {
        let fields = DictionaryFields::new("Acme").order(4);
        assert!(fields.active);
        let mut row = new_row(&EntityId::from("p"));
        fields.write(&mut row);
        assert_eq!(DictionaryFields::read(&RowView::new("p", &row)).unwrap(), fields);
    }
}
