use fusion_config::shared::BatchConfig;
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, FusionResult};
use crate::store::{TableStore, UpdateFromSource};
use crate::types::{KeyValue, RowId, TableName};

/// Totals of a batched mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of statements executed.
    pub batches: usize,
    pub rows_affected: u64,
}

/// Applies deletions and updates in chunks of at most `batch_size` identifiers or keys.
///
/// Each chunk is one statement made durable on its own. Chunks run in the order of the input
/// and completed chunks stay applied when a later one fails, so an interrupted run is resumed
/// by running it again: the detectors will no longer report what was already removed.
#[derive(Debug, Clone)]
pub struct BatchExecutor<S> {
    store: S,
    batch_size: usize,
}

impl<S> BatchExecutor<S>
where
    S: TableStore,
{
    /// Creates an executor, failing with [`ErrorKind::ConfigError`] for a zero batch size.
    pub fn new(store: S, batch_size: usize) -> FusionResult<Self> {
        if batch_size == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Invalid batch size",
                "The batch size must be greater than zero"
            );
        }

        Ok(Self { store, batch_size })
    }

    pub fn from_config(store: S, config: &BatchConfig) -> FusionResult<Self> {
        Self::new(store, config.max_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Deletes the rows in `row_ids`.
    ///
    /// The identifiers are consumed: they stop being meaningful once the table is mutated.
    pub async fn delete_rows(
        &self,
        table: &TableName,
        row_ids: Vec<RowId>,
    ) -> FusionResult<BatchOutcome> {
        self.execute(table, "delete_rows", &row_ids, |chunk| {
            self.store.delete_rows(table, chunk)
        })
        .await
    }

    /// Deletes the rows whose `key_column` is one of `keys`.
    pub async fn delete_keys(
        &self,
        table: &TableName,
        key_column: &str,
        keys: &[KeyValue],
    ) -> FusionResult<BatchOutcome> {
        self.execute(table, "delete_keys", keys, |chunk| {
            self.store.delete_rows_by_key(table, key_column, chunk)
        })
        .await
    }

    /// Copies the columns of `update` from its source into `target` for every key in `keys`.
    pub async fn update_columns(
        &self,
        target: &TableName,
        update: &UpdateFromSource,
        keys: &[KeyValue],
    ) -> FusionResult<BatchOutcome> {
        self.execute(target, "update_columns", keys, |chunk| {
            self.store.update_columns(target, update, chunk)
        })
        .await
    }

    async fn execute<'a, T, F, Fut>(
        &self,
        table: &TableName,
        operation: &'static str,
        items: &'a [T],
        mut apply: F,
    ) -> FusionResult<BatchOutcome>
    where
        F: FnMut(&'a [T]) -> Fut,
        Fut: Future<Output = FusionResult<u64>>,
    {
        let mut outcome = BatchOutcome::default();
        if items.is_empty() {
            debug!(%table, operation, "nothing to apply, skipping");
            return Ok(outcome);
        }

        let batches = items.len().div_ceil(self.batch_size);
        for (index, chunk) in items.chunks(self.batch_size).enumerate() {
            let rows = apply(chunk).await?;

            outcome.batches += 1;
            outcome.rows_affected += rows;

            info!(
                %table,
                operation,
                batch = index + 1,
                batches,
                rows,
                "batch applied"
            );
        }

        Ok(outcome)
    }
}
