use tracing::info;

use crate::batch::{BatchExecutor, BatchOutcome};
use crate::dedup::DuplicateRule;
use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::TableName;

/// Keeps a single row per key value, the one with the most non-null columns.
///
/// Rows with a NULL key are never touched. Ties keep the row with the lowest row identifier.
#[derive(Debug, Clone)]
pub struct CompletenessRanker<S> {
    store: S,
    executor: BatchExecutor<S>,
}

impl<S> CompletenessRanker<S>
where
    S: TableStore + Clone,
{
    pub fn new(store: S, batch_size: usize) -> FusionResult<Self> {
        Ok(Self {
            executor: BatchExecutor::new(store.clone(), batch_size)?,
            store,
        })
    }

    /// Deletes every row of `table` that is not the most complete one for its key.
    pub async fn keep_most_complete(
        &self,
        table: &TableName,
        key_column: &str,
    ) -> FusionResult<BatchOutcome> {
        let rule = DuplicateRule::least_complete(key_column);
        let redundant = self.store.find_duplicate_rows(table, &rule).await?;
        if redundant.is_empty() {
            info!(%table, key_column, "every key already has a single row");
            return Ok(BatchOutcome::default());
        }

        info!(%table, key_column, rows = redundant.len(), "removing less complete rows");
        self.executor.delete_rows(table, redundant).await
    }
}
