//! Access to the tables the engine reads and mutates.

mod base;
mod memory;
mod postgres;

pub use base::*;
pub use memory::*;
pub use postgres::*;
