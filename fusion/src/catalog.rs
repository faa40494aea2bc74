use std::collections::BTreeSet;

use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::{ColumnSchema, TableName};

/// Read access to table schemas.
///
/// Nothing is cached: every call reads the committed schema, since reconciliation adds columns
/// in the middle of a run.
#[derive(Debug, Clone)]
pub struct SchemaCatalog<S> {
    store: S,
}

impl<S> SchemaCatalog<S>
where
    S: TableStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the columns of `table` in declaration order.
    pub async fn columns(&self, table: &TableName) -> FusionResult<Vec<ColumnSchema>> {
        self.store.table_columns(table).await
    }

    /// Returns the column names of `table`.
    pub async fn column_names(&self, table: &TableName) -> FusionResult<BTreeSet<String>> {
        let columns = self.columns(table).await?;

        Ok(columns.into_iter().map(|column| column.name).collect())
    }

    /// Returns the column names both tables share, sorted.
    pub async fn common_columns(
        &self,
        target: &TableName,
        source: &TableName,
    ) -> FusionResult<Vec<String>> {
        let target_columns = self.column_names(target).await?;
        let source_columns = self.column_names(source).await?;

        Ok(target_columns
            .intersection(&source_columns)
            .cloned()
            .collect())
    }

    pub async fn tables(&self, schema: &str) -> FusionResult<Vec<TableName>> {
        self.store.list_tables(schema).await
    }
}
