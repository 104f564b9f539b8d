//! # dualstore index
//!
//! Interface to the search index that holds derived, denormalized documents,
//! plus an in-memory reference backend.
//!
//! - [`IndexDocument`] / [`IndexSchema`]: documents with nested children and
//!   the collection field declarations they are validated against
//! - [`IndexQuery`] / [`SearchRequest`]: the query tree the compiler emits,
//!   rendered in Lucene/Solr syntax and evaluated by [`InMemoryIndex`]
//! - [`Analyzer`]: tokenizer for full-text fields
//!
//! ## Example
//!
//! ```rust
//! use dualstore_codec::FieldKind;
//! use dualstore_index::{IndexBackend, IndexDocument, IndexQuery, IndexSchema, InMemoryIndex, SearchRequest};
//!
//! let index = InMemoryIndex::new();
//! index.ensure_schema(&IndexSchema::new("note").field("body", FieldKind::Text)).unwrap();
//! index.upsert("note", vec![
//!     IndexDocument::new("n1", "note").with("body", "Quick brown fox"),
//! ]).unwrap();
//!
//! let phrase = IndexQuery::Phrase { field: "body".into(), text: "brown fox".into() };
//! let hits = index.search(&SearchRequest::new("note", "note").query(phrase)).unwrap();
//! assert_eq!(hits.ids, vec!["n1"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod analysis;
mod backend;
mod document;
mod error;
mod memory;
mod query;

pub use analysis::{Analyzer, AnalyzerConfig};
pub use backend::IndexBackend;
pub use document::{IndexDocument, IndexSchema, ID_FIELD, TYPE_FIELD};
pub use error::{IndexError, IndexResult};
pub use memory::InMemoryIndex;
pub use query::{IndexQuery, Page, RangeOp, SearchHits, SearchRequest, SortField, WildcardMode};
