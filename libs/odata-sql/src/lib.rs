#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! SQL query target for OData expressions.
//!
//! [`SqlTarget`] translates `$filter`, `$orderby` and `$search` trees into SQL for a
//! [`Dialect`]; [`SqlEntitySet`] assembles full `SELECT` and `COUNT` statements and
//! exposes a paged [`odata_core::EntitySource`] over any [`SqlExecutor`].

pub mod buffer;
pub mod dialect;
pub mod entity_set;
pub mod target;

pub use buffer::{SqlBuffer, SqlStatement};
pub use dialect::Dialect;
pub use entity_set::{SqlEntitySet, SqlEntitySource, SqlExecutor};
pub use target::SqlTarget;
