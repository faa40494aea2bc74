use std::collections::BTreeSet;
use tracing::info;

use crate::bail;
use crate::catalog::SchemaCatalog;
use crate::error::{ErrorKind, FusionResult};
use crate::store::TableStore;
use crate::types::TableName;

/// Concatenates tables sharing one column set into a new table.
#[derive(Debug, Clone)]
pub struct TableUnion<S> {
    store: S,
    catalog: SchemaCatalog<S>,
}

impl<S> TableUnion<S>
where
    S: TableStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            catalog: SchemaCatalog::new(store.clone()),
            store,
        }
    }

    /// Returns the tables of `schema` whose name starts with `prefix`, leaving out `exclude`.
    pub async fn tables_with_prefix(
        &self,
        schema: &str,
        prefix: &str,
        exclude: &TableName,
    ) -> FusionResult<Vec<TableName>> {
        let tables = self.catalog.tables(schema).await?;

        Ok(tables
            .into_iter()
            .filter(|table| table.name.starts_with(prefix) && table != exclude)
            .collect())
    }

    /// Replaces `name` with the rows of all `tables`, in the column order of the first table.
    ///
    /// Every table must have the same column set, checked before anything is written; a
    /// difference fails with [`ErrorKind::SchemaMismatch`]. An empty list does nothing.
    pub async fn union_into(&self, name: &TableName, tables: &[TableName]) -> FusionResult<u64> {
        let Some((first, rest)) = tables.split_first() else {
            info!(table = %name, "no tables to join");
            return Ok(0);
        };

        if tables.contains(name) {
            bail!(
                ErrorKind::InvalidData,
                "Union target is also a union input",
                format!("Table '{name}' cannot be rebuilt from itself")
            );
        }

        let columns: Vec<String> = self
            .catalog
            .columns(first)
            .await?
            .into_iter()
            .map(|column| column.name)
            .collect();
        let expected: BTreeSet<&str> = columns.iter().map(String::as_str).collect();

        for table in rest {
            let actual = self.catalog.column_names(table).await?;
            let actual: BTreeSet<&str> = actual.iter().map(String::as_str).collect();

            if actual != expected {
                let missing: Vec<&str> = expected.difference(&actual).copied().collect();
                let extra: Vec<&str> = actual.difference(&expected).copied().collect();
                bail!(
                    ErrorKind::SchemaMismatch,
                    "Tables have different columns",
                    format!(
                        "Table '{table}' differs from '{first}': missing [{}], extra [{}]",
                        missing.join(", "),
                        extra.join(", ")
                    )
                );
            }
        }

        let rows = self
            .store
            .create_table_from_union(name, tables, &columns)
            .await?;

        info!(table = %name, tables = tables.len(), rows, "tables joined");

        Ok(rows)
    }
}
