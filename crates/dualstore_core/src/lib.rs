//! # dualstore core
//!
//! Persistence layer keeping a relational system of record and a derived
//! search index consistent.
//!
//! - Entities: identity, temporal and dictionary records mapped to rows
//!   through [`RecordCodec`]
//! - Query model: [`Params`] with a structural [`Filter`] tree, compiled by
//!   one walker into a relational [`dualstore_storage::Select`] or an index
//!   [`dualstore_index::SearchRequest`]
//! - Stores: [`BasicStore`], [`DatedStore`], [`DictionaryStore`] and
//!   [`IndexedStore`], composed from the [`Reader`], [`Writer`],
//!   [`SoftDeleter`] and [`Indexer`] capabilities
//! - Transactions with revision tracking and post-commit index writes
//! - [`Reindexer`]: rebuilds the indexes of explicitly registered stores
//!
//! ## Example
//!
//! ```rust
//! use dualstore_core::{
//!     identity_eq, new_row, BasicStore, ChildRecords, CoreResult, Database, Entity, EntityId,
//!     FieldTable, Filter, Params, Reader, RecordCodec, RowView, Writer,
//! };
//! use dualstore_codec::{FieldKind, Value};
//! use dualstore_storage::Row;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone)]
//! struct Note {
//!     id: EntityId,
//!     body: String,
//! }
//!
//! identity_eq!(Note);
//!
//! impl Entity for Note {
//!     fn id(&self) -> &EntityId {
//!         &self.id
//!     }
//! }
//!
//! impl RecordCodec for Note {
//!     fn entity_type() -> &'static str {
//!         "note"
//!     }
//!
//!     fn encode(&self) -> Row {
//!         let mut row = new_row(&self.id);
//!         row.insert("body".into(), Value::from(self.body.as_str()));
//!         row
//!     }
//!
//!     fn decode(row: &Row, _children: &ChildRecords) -> CoreResult<Self> {
//!         let view = RowView::new("note", row);
//!         Ok(Self { id: view.id()?, body: view.text("body")? })
//!     }
//! }
//!
//! let db = Arc::new(Database::in_memory());
//! let notes = BasicStore::<Note>::new(db, FieldTable::identity().field("body", FieldKind::Keyword));
//! notes.save(&Note { id: EntityId::from("n1"), body: "hello".into() }).unwrap();
//!
//! let found = notes.find_all(&Params::new().filter(Filter::contains("body", "ELL"))).unwrap();
//! assert_eq!(found.count, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod database;
mod entity;
mod error;
pub mod query;
mod reindex;
mod revision;
mod store;
mod transaction;

pub use config::StoreConfig;
pub use context::{ActorProvider, FixedActor, NoActor, SharedActor};
pub use database::Database;
pub use entity::{
    new_row, ChildRecords, ChildSet, ChildTable, Dated, DatedFields, Dictionary, DictionaryFields,
    Entity, EntityId, RecordCodec, RevisionId, RowView, UserId, ACTIVE_COLUMN, CREATED_COLUMN,
    DELETED_COLUMN, NAME_COLUMN, ORDER_COLUMN, UPDATED_COLUMN,
};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use query::{
    FieldMapping, FieldTable, Filter, FilterOperation, NestedMapping, Order, Params, QueryResult,
    RootFilterOperation, SortSpecification,
};
pub use reindex::{ReindexReport, ReindexStats, Reindexable, Reindexer, StoreOutcome, StoreRegistry};
pub use revision::{Revision, RevisionItem, RevisionOp, RevisionTracker, REVISION_ITEM_TABLE, REVISION_TABLE};
pub use store::{
    BasicStore, DatedStore, DictionaryStore, IndexMapping, IndexedStore, Indexer, Reader,
    RecordSource, SoftDeleter, TableMapping, Writer,
};
pub use transaction::{CommitReceipt, StaleIndexEntry, Transaction, TransactionState};
