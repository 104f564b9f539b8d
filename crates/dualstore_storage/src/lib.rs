//! # dualstore storage
//!
//! Interface to the relational system of record, plus an in-memory reference
//! backend.
//!
//! The query compiler produces [`Predicate`] trees and [`Select`] statements.
//! A SQL backend renders them with [`Select::to_sql`]; the in-memory backend
//! evaluates them directly with identical semantics.
//!
//! ## Example
//!
//! ```rust
//! use dualstore_storage::{InMemoryBackend, Predicate, RecordBackend, Row, Select};
//! use dualstore_codec::Value;
//!
//! let backend = InMemoryBackend::new();
//! let mut session = backend.begin().unwrap();
//! let mut row = Row::new();
//! row.insert("id".into(), Value::from("n1"));
//! row.insert("state".into(), Value::from("open"));
//! session.upsert("note", row).unwrap();
//!
//! let open = Select::from("note").filter(Predicate::eq("state", "open"));
//! assert_eq!(session.select(&open).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod predicate;
mod row;
mod select;

pub use backend::{RecordBackend, RecordSession};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use predicate::{ChildRows, CompareOp, LikeMode, NoChildren, Predicate, SqlWriter};
pub use row::{column, row_id, Row, ID_COLUMN};
pub use select::{OrderBy, Select, SqlStatement, Window};
