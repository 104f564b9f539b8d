//! Query model and compiler.
//!
//! - [`Params`] / [`Filter`]: the structural filter, sort and paging request
//! - [`FieldTable`]: explicit mapping of field paths to columns and index fields
//! - [`FilterCompiler`]: one filter walker emitting through a [`Dialect`]
//! - [`compile_select`] / [`compile_search`]: the relational and index targets

mod compiler;
mod fields;
mod params;
mod search;
mod sql;

pub use compiler::{Comparison, Dialect, FilterCompiler, TextMatch};
pub use fields::{FieldMapping, FieldTable, NestedMapping};
pub use params::{
    Filter, FilterOperation, Order, Params, QueryResult, RootFilterOperation, SortSpecification,
    DEFAULT_SORT,
};
pub use search::{compile_search, IndexDialect};
pub use sql::{compile_select, RelationalDialect};
