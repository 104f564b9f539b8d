//! # dualstore codec
//!
//! Value layer shared by the relational and search-index sides of dualstore.
//!
//! - [`Value`]: dynamic field value with a total order, used in rows,
//!   index documents and compiled predicates
//! - [`FieldKind`]: declared kind of a mapped field and typed parsing of the
//!   string values carried by filters
//! - canonical CBOR bytes for deterministic comparison of documents
//!
//! ## Usage
//!
//! ```
//! use dualstore_codec::{to_canonical_bytes, FieldKind, Value};
//!
//! let value = FieldKind::Integer.parse("42").unwrap();
//! assert_eq!(value, Value::Integer(42));
//!
//! let bytes = to_canonical_bytes(&value).unwrap();
//! assert!(!bytes.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canonical;
mod error;
mod kind;
mod value;

pub use canonical::{from_canonical_bytes, to_canonical_bytes};
pub use error::{CodecError, CodecResult};
pub use kind::FieldKind;
pub use value::Value;
