use tracing::debug;

use crate::dedup::DuplicateRule;
use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::{RowId, TableName};

/// Finds rows equal to another row on every column.
///
/// Within each group of identical rows the one with the lowest row identifier is the keeper,
/// every other row is reported. Deleting the reported rows leaves one row per distinct value.
#[derive(Debug, Clone)]
pub struct ExactDuplicateDetector<S> {
    store: S,
}

impl<S> ExactDuplicateDetector<S>
where
    S: TableStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the rows to delete, sorted. An empty table yields no rows.
    pub async fn detect(&self, table: &TableName) -> FusionResult<Vec<RowId>> {
        let candidates = self
            .store
            .find_duplicate_rows(table, &DuplicateRule::FullRow)
            .await?;

        debug!(%table, candidates = candidates.len(), "exact duplicates detected");

        Ok(candidates)
    }
}
