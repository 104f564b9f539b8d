//! # dualstore testkit
//!
//! Test utilities for dualstore.
//!
//! This crate provides:
//! - Fixture entity types covering each store flavour: [`Producer`]
//!   (dictionary), [`Package`] (dated, with nested [`Task`] children) and
//!   [`Tag`] (basic)
//! - [`TestDatabase`]: in-memory backends with handles for fault injection
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use dualstore_core::{Params, Reader, Writer};
//! use dualstore_testkit::prelude::*;
//!
//! let db = TestDatabase::new();
//! let producers = db.producers();
//! producers.save(&Producer::new("p1", "Acme", "ACM")).unwrap();
//! assert_eq!(producers.count(&Params::new()).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod entities;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::entities::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use entities::*;
pub use fixtures::*;
pub use generators::*;
