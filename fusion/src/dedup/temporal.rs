use std::time::Duration;
use tracing::debug;

use crate::dedup::DuplicateRule;
use crate::dedup::rule::validate_rule;
use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::{RowId, TableName};

/// Finds rows repeating the row before them within a time tolerance.
///
/// Rows are grouped on every column except the timestamp column and ordered by timestamp. A
/// row is reported when its timestamp is at most `tolerance` after the one of the row right
/// before it. Each row is only compared to its predecessor, so in a single pass a run of
/// events spaced by less than the tolerance collapses into its first event even when the run
/// spans more than the tolerance.
#[derive(Debug, Clone)]
pub struct TemporalDuplicateDetector<S> {
    store: S,
    timestamp_column: String,
    tolerance: Duration,
}

impl<S> TemporalDuplicateDetector<S>
where
    S: TableStore,
{
    pub fn new(store: S, timestamp_column: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            store,
            timestamp_column: timestamp_column.into(),
            tolerance,
        }
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    fn rule(&self) -> DuplicateRule {
        DuplicateRule::temporal(self.timestamp_column.clone(), self.tolerance)
    }

    /// Checks that `table` has a timestamp column of a type able to hold timestamps,
    /// without reading its rows.
    pub async fn check_table(&self, table: &TableName) -> FusionResult<()> {
        let columns = self.store.table_columns(table).await?;

        validate_rule(table, &columns, &self.rule())
    }

    /// Returns the rows to delete, sorted.
    ///
    /// Fails with [`crate::error::ErrorKind::ColumnNotFound`] when the timestamp column does
    /// not exist and with [`crate::error::ErrorKind::TimestampParse`] when its values cannot
    /// be read as timestamps.
    pub async fn detect(&self, table: &TableName) -> FusionResult<Vec<RowId>> {
        let candidates = self.store.find_duplicate_rows(table, &self.rule()).await?;

        debug!(
            %table,
            timestamp_column = %self.timestamp_column,
            tolerance_ms = self.tolerance.as_millis() as u64,
            candidates = candidates.len(),
            "temporal duplicates detected"
        );

        Ok(candidates)
    }
}
