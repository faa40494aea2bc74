//! Common types used throughout the fusion engine.
//!
//! Re-exports table and column descriptors, physical row handles, key values and the
//! in-memory cell representation, together with the Postgres type system.

mod cell;
mod row;
mod schema;

pub use cell::*;
pub use row::*;
pub use schema::*;

// Re-exports.
pub use tokio_postgres::types::Type;
