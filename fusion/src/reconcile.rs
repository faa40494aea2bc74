use tracing::info;

use crate::catalog::SchemaCatalog;
use crate::error::FusionResult;
use crate::store::TableStore;
use crate::types::{ColumnDefinition, TableName, Type};

/// Maps the declared type of a source column to the type given to the new target column.
///
/// The mapping is total: any type not listed becomes `text`. Length and precision modifiers
/// are not carried over, a `varchar(255)` is added as a plain `varchar`.
pub fn map_declared_type(typ: &Type) -> Type {
    match *typ {
        Type::INT2 => Type::INT2,
        Type::INT4 => Type::INT4,
        Type::INT8 => Type::INT8,
        Type::FLOAT4 => Type::FLOAT4,
        Type::FLOAT8 => Type::FLOAT8,
        Type::NUMERIC => Type::NUMERIC,
        Type::BOOL => Type::BOOL,
        Type::TEXT => Type::TEXT,
        Type::VARCHAR => Type::VARCHAR,
        Type::DATE => Type::DATE,
        Type::TIMESTAMP => Type::TIMESTAMP,
        Type::TIMESTAMPTZ => Type::TIMESTAMPTZ,
        _ => Type::TEXT,
    }
}

/// Adds to a target table the columns a source table has and the target lacks.
///
/// Reconciliation only ever adds columns. Existing target columns keep their name, type and
/// position.
#[derive(Debug, Clone)]
pub struct SchemaReconciler<S> {
    store: S,
    catalog: SchemaCatalog<S>,
}

impl<S> SchemaReconciler<S>
where
    S: TableStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            catalog: SchemaCatalog::new(store.clone()),
            store,
        }
    }

    /// Computes the columns of `source` missing from `target`, in the source's column order.
    pub async fn missing_columns(
        &self,
        target: &TableName,
        source: &TableName,
    ) -> FusionResult<Vec<ColumnDefinition>> {
        let target_columns = self.catalog.column_names(target).await?;
        let source_columns = self.catalog.columns(source).await?;

        Ok(source_columns
            .into_iter()
            .filter(|column| !target_columns.contains(&column.name))
            .map(|column| ColumnDefinition::new(column.name, map_declared_type(&column.typ)))
            .collect())
    }

    /// Adds the missing columns to `target` in one schema change and returns their names.
    ///
    /// Nothing is altered when the target already has every source column.
    pub async fn reconcile(
        &self,
        target: &TableName,
        source: &TableName,
    ) -> FusionResult<Vec<String>> {
        let missing = self.missing_columns(target, source).await?;
        if missing.is_empty() {
            info!(%target, %source, "no missing columns, schema left unchanged");
            return Ok(vec![]);
        }

        self.store.add_columns(target, &missing).await?;

        let added: Vec<String> = missing.into_iter().map(|column| column.name).collect();
        info!(%target, %source, columns = ?added, "added missing columns");

        Ok(added)
    }
}
