//! Removal of duplicate rows from a table.
//!
//! Detection and deletion are separate steps: a detector reports the row identifiers to
//! drop and [`crate::batch::BatchExecutor`] deletes them in bounded statements.

mod exact;
pub mod rule;
mod temporal;

pub use exact::ExactDuplicateDetector;
pub use rule::DuplicateRule;
pub use temporal::TemporalDuplicateDetector;

use fusion_config::shared::{BatchConfig, DedupConfig};
use tracing::info;

use crate::batch::BatchExecutor;
use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::TableName;

/// Rows removed by a [`Deduplicator`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub exact_removed: u64,
    pub temporal_removed: u64,
}

impl DedupReport {
    pub fn total_removed(&self) -> u64 {
        self.exact_removed + self.temporal_removed
    }
}

/// Removes exact duplicates and then, when configured, temporal duplicates from a table.
#[derive(Debug, Clone)]
pub struct Deduplicator<S> {
    exact: ExactDuplicateDetector<S>,
    temporal: Option<TemporalDuplicateDetector<S>>,
    executor: BatchExecutor<S>,
}

impl<S> Deduplicator<S>
where
    S: TableStore + Clone,
{
    /// Creates a deduplicator removing exact duplicates only.
    pub fn exact_only(store: S, batch_size: usize) -> FusionResult<Self> {
        Ok(Self {
            exact: ExactDuplicateDetector::new(store.clone()),
            temporal: None,
            executor: BatchExecutor::new(store, batch_size)?,
        })
    }

    /// Creates a deduplicator running both passes with the configured timestamp column and
    /// tolerance.
    pub fn from_config(
        store: S,
        dedup: &DedupConfig,
        batch: &BatchConfig,
    ) -> FusionResult<Self> {
        let mut deduplicator = Self::exact_only(store.clone(), batch.max_size)?;
        deduplicator.temporal = Some(TemporalDuplicateDetector::new(
            store,
            dedup.timestamp_column.clone(),
            dedup.temporal_tolerance(),
        ));

        Ok(deduplicator)
    }

    /// Deletes rows identical to another row on every column.
    pub async fn remove_exact(&self, table: &TableName) -> FusionResult<u64> {
        let candidates = self.exact.detect(table).await?;
        if candidates.is_empty() {
            info!(%table, "no exact duplicates found");
            return Ok(0);
        }

        info!(%table, rows = candidates.len(), "deleting exact duplicates");
        let outcome = self.executor.delete_rows(table, candidates).await?;

        Ok(outcome.rows_affected)
    }

    /// Deletes rows repeating their predecessor within the tolerance, if configured.
    pub async fn remove_temporal(&self, table: &TableName) -> FusionResult<u64> {
        let Some(temporal) = &self.temporal else {
            return Ok(0);
        };

        let candidates = temporal.detect(table).await?;
        if candidates.is_empty() {
            info!(%table, "no temporal duplicates found");
            return Ok(0);
        }

        info!(%table, rows = candidates.len(), "deleting temporal duplicates");
        let outcome = self.executor.delete_rows(table, candidates).await?;

        Ok(outcome.rows_affected)
    }

    /// Runs the exact pass then the temporal pass.
    ///
    /// The temporal pass detects on the table as left by the exact pass, row identifiers are
    /// never carried from one pass to the other. The timestamp column is checked before the
    /// exact pass so that a table unfit for the temporal pass is left untouched.
    pub async fn run(&self, table: &TableName) -> FusionResult<DedupReport> {
        if let Some(temporal) = &self.temporal {
            temporal.check_table(table).await?;
        }

        let exact_removed = self.remove_exact(table).await?;
        let temporal_removed = self.remove_temporal(table).await?;

        let report = DedupReport {
            exact_removed,
            temporal_removed,
        };
        info!(
            %table,
            exact_removed,
            temporal_removed,
            "deduplication finished"
        );

        Ok(report)
    }
}
