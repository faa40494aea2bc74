//! Batch deduplication and table fusion for Postgres.
//!
//! The engine removes duplicate rows from a table and merges the columns of one table into
//! another on a shared key. It works against any [`store::TableStore`]: [`store::PgTableStore`]
//! for a live database and [`store::MemoryStore`] for tests and dry runs.
//!
//! Destructive mutations always go through [`batch::BatchExecutor`], which splits them into
//! independently committed statements of bounded size.

pub mod batch;
pub mod catalog;
pub mod dedup;
pub mod error;
mod macros;
pub mod orchestrator;
pub mod query;
pub mod rank;
pub mod reconcile;
pub mod select;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod union;
