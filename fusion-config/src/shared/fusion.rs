use serde::Deserialize;

use crate::Config;
use crate::shared::{BatchConfig, DedupConfig, PgConnectionConfig, ValidationError};

/// Top level configuration of the `fusion` tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FusionConfig {
    pub database: PgConnectionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.batch.validate()?;
        self.dedup.validate()
    }
}

impl Config for FusionConfig {}
