//! Configuration types shared by the fusion engine and command line tool.

mod base;
mod batch;
mod connection;
mod dedup;
mod fusion;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::{FUSION_SESSION_OPTIONS, PgConnectionConfig, PgConnectionOptions, TlsConfig};
pub use dedup::DedupConfig;
pub use fusion::FusionConfig;
