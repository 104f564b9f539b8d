//! Entity base types.
//!
//! Entities move through three layers of fields: identity (every entity),
//! temporal ([`DatedFields`]) and dictionary ([`DictionaryFields`]). Each
//! entity type maps itself to relational rows through [`RecordCodec`].

mod dated;
mod id;
mod record;

pub(crate) use dated::stamp_after;
pub use dated::{
    Dated, DatedFields, Dictionary, DictionaryFields, ACTIVE_COLUMN, CREATED_COLUMN,
    DELETED_COLUMN, NAME_COLUMN, ORDER_COLUMN, UPDATED_COLUMN,
};
pub use id::{EntityId, RevisionId, UserId};
pub use record::{new_row, ChildRecords, ChildSet, ChildTable, Entity, RecordCodec, RowView};
