//! Configuration for the fusion workspace.
//!
//! Holds the connection, batching and deduplication settings consumed by the `fusion`
//! engine and the `fusion` command line tool, together with the hierarchical loader that
//! reads them from `configuration/` files and `APP_` environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
