use serde::Deserialize;
use std::time::Duration;

use crate::shared::ValidationError;

/// Settings of the temporal duplicate pass.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DedupConfig {
    /// Column excluded from the row identity and compared with the tolerance instead.
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Maximum gap, in milliseconds, between two neighbouring rows considered the same event.
    #[serde(default = "default_temporal_tolerance_ms")]
    pub temporal_tolerance_ms: u64,
}

impl DedupConfig {
    pub const DEFAULT_TIMESTAMP_COLUMN: &'static str = "event_time";

    pub const DEFAULT_TEMPORAL_TOLERANCE_MS: u64 = 1000;

    pub fn temporal_tolerance(&self) -> Duration {
        Duration::from_millis(self.temporal_tolerance_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timestamp_column.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "dedup.timestamp_column".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            timestamp_column: default_timestamp_column(),
            temporal_tolerance_ms: default_temporal_tolerance_ms(),
        }
    }
}

fn default_timestamp_column() -> String {
    DedupConfig::DEFAULT_TIMESTAMP_COLUMN.to_string()
}

fn default_temporal_tolerance_ms() -> u64 {
    DedupConfig::DEFAULT_TEMPORAL_TOLERANCE_MS
}
