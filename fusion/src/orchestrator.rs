use std::fmt;
use tracing::info;

use crate::batch::BatchExecutor;
use crate::catalog::SchemaCatalog;
use crate::error::{ErrorKind, FusionResult};
use crate::rank::CompletenessRanker;
use crate::reconcile::SchemaReconciler;
use crate::select::KeySelector;
use crate::store::{TableStore, UpdateFromSource};
use crate::types::TableName;
use crate::{bail, fusion_error};

/// Stages of a fusion run, in execution order.
///
/// A run may jump to [`FusionStage::Done`] from any stage that finds nothing left to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStage {
    KeySelection,
    SourceRanking,
    SchemaReconciliation,
    MatchSetComputation,
    BatchedUpdate,
    Done,
}

impl fmt::Display for FusionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FusionStage::KeySelection => "key_selection",
            FusionStage::SourceRanking => "source_ranking",
            FusionStage::SchemaReconciliation => "schema_reconciliation",
            FusionStage::MatchSetComputation => "match_set_computation",
            FusionStage::BatchedUpdate => "batched_update",
            FusionStage::Done => "done",
        };

        f.write_str(name)
    }
}

/// Outcome of a fusion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionReport {
    pub key_column: String,
    /// Source rows deleted because a more complete row had the same key.
    pub source_rows_removed: u64,
    /// Columns added to the target, in the source's column order.
    pub added_columns: Vec<String>,
    /// Number of distinct non-null keys present in both tables.
    pub matching_keys: usize,
    pub rows_updated: u64,
    pub batches: usize,
    /// Stages the run went through, ending with [`FusionStage::Done`].
    pub stages: Vec<FusionStage>,
}

impl FusionReport {
    fn new(key_column: String) -> Self {
        Self {
            key_column,
            source_rows_removed: 0,
            added_columns: vec![],
            matching_keys: 0,
            rows_updated: 0,
            batches: 0,
            stages: vec![FusionStage::KeySelection],
        }
    }

    fn enter(&mut self, stage: FusionStage, target: &TableName) {
        info!(%target, %stage, "fusion stage");
        self.stages.push(stage);
    }

    fn finish(mut self, target: &TableName) -> Self {
        self.enter(FusionStage::Done, target);
        self
    }
}

/// Merges the columns a source table has and a target table lacks into the target.
///
/// Rows are matched on a key column shared by both tables. Target rows whose key is NULL or
/// absent from the source are left untouched and source rows whose key is absent from the
/// target are not inserted. Before the merge the source is reduced to its most complete row
/// per key, so each matched target row receives the values of exactly one source row.
#[derive(Debug, Clone)]
pub struct FusionOrchestrator<S> {
    store: S,
    catalog: SchemaCatalog<S>,
    ranker: CompletenessRanker<S>,
    reconciler: SchemaReconciler<S>,
    executor: BatchExecutor<S>,
}

impl<S> FusionOrchestrator<S>
where
    S: TableStore + Clone,
{
    pub fn new(store: S, batch_size: usize) -> FusionResult<Self> {
        Ok(Self {
            catalog: SchemaCatalog::new(store.clone()),
            ranker: CompletenessRanker::new(store.clone(), batch_size)?,
            reconciler: SchemaReconciler::new(store.clone()),
            executor: BatchExecutor::new(store.clone(), batch_size)?,
            store,
        })
    }

    /// Returns the columns usable as key, sorted.
    ///
    /// Fails with [`ErrorKind::NoCommonKey`] when the tables share no column.
    pub async fn key_candidates(
        &self,
        target: &TableName,
        source: &TableName,
    ) -> FusionResult<Vec<String>> {
        if target == source {
            bail!(
                ErrorKind::ConfigError,
                "Target and source are the same table",
                format!("Table '{target}' cannot be fused with itself")
            );
        }

        let candidates = self.catalog.common_columns(target, source).await?;
        if candidates.is_empty() {
            bail!(
                ErrorKind::NoCommonKey,
                "No common key",
                format!("Tables '{target}' and '{source}' have no column in common")
            );
        }

        Ok(candidates)
    }

    /// Fuses `source` into `target`, asking `selector` for the key when several columns are
    /// shared. A single shared column is used without asking.
    pub async fn fuse<K>(
        &self,
        target: &TableName,
        source: &TableName,
        selector: &K,
    ) -> FusionResult<FusionReport>
    where
        K: KeySelector + ?Sized,
    {
        let candidates = self.key_candidates(target, source).await?;
        let key_column = match candidates.as_slice() {
            [only] => only.clone(),
            _ => {
                let key_column = selector.select_key(&candidates)?;
                validate_key(&candidates, &key_column, target, source)?;
                key_column
            }
        };

        self.run(target, source, key_column).await
    }

    /// Fuses `source` into `target` on `key_column`, which must be shared by both tables.
    pub async fn fuse_with_key(
        &self,
        target: &TableName,
        source: &TableName,
        key_column: &str,
    ) -> FusionResult<FusionReport> {
        let candidates = self.key_candidates(target, source).await?;
        validate_key(&candidates, key_column, target, source)?;

        self.run(target, source, key_column.to_string()).await
    }

    async fn run(
        &self,
        target: &TableName,
        source: &TableName,
        key_column: String,
    ) -> FusionResult<FusionReport> {
        info!(%target, %source, key_column, "fusing tables");
        let mut report = FusionReport::new(key_column);

        report.enter(FusionStage::SourceRanking, target);
        let ranked = self
            .ranker
            .keep_most_complete(source, &report.key_column)
            .await?;
        report.source_rows_removed = ranked.rows_affected;
        report.batches += ranked.batches;

        report.enter(FusionStage::SchemaReconciliation, target);
        report.added_columns = self.reconciler.reconcile(target, source).await?;
        if report.added_columns.is_empty() {
            return Ok(report.finish(target));
        }

        report.enter(FusionStage::MatchSetComputation, target);
        let keys = self
            .store
            .matching_keys(target, source, &report.key_column)
            .await?;
        report.matching_keys = keys.len();
        if keys.is_empty() {
            info!(%target, %source, "no matching keys, nothing to update");
            return Ok(report.finish(target));
        }

        report.enter(FusionStage::BatchedUpdate, target);
        let update = UpdateFromSource {
            source: source.clone(),
            key_column: report.key_column.clone(),
            columns: report.added_columns.clone(),
        };
        let updated = self.executor.update_columns(target, &update, &keys).await?;
        report.rows_updated = updated.rows_affected;
        report.batches += updated.batches;

        info!(
            %target,
            %source,
            rows_updated = report.rows_updated,
            batches = report.batches,
            "fusion finished"
        );

        Ok(report.finish(target))
    }
}

fn validate_key(
    candidates: &[String],
    key_column: &str,
    target: &TableName,
    source: &TableName,
) -> FusionResult<()> {
    if candidates.iter().any(|candidate| candidate == key_column) {
        return Ok(());
    }

    Err(fusion_error!(
        ErrorKind::InvalidKey,
        "Invalid key column",
        format!(
            "Column '{key_column}' is not shared by '{target}' and '{source}', candidates are: {}",
            candidates.join(", ")
        )
    ))
}
