use crate::dedup::DuplicateRule;
use crate::error::FusionResult;
use crate::types::{ColumnDefinition, ColumnSchema, KeyValue, RowId, TableName};

/// Columns copied from a source table into the rows of a target table that share a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFromSource {
    pub source: TableName,
    pub key_column: String,
    pub columns: Vec<String>,
}

/// Trait for reading and mutating the tables the engine operates on.
///
/// [`TableStore`] implementations own the connection to the backing store. Every mutating
/// method is a single statement which is durable once it returns; callers wanting bounded
/// statements split their input before calling, see [`crate::batch::BatchExecutor`].
///
/// Row identifiers handed out by [`TableStore::find_duplicate_rows`] are only valid until the
/// next mutation of the same table.
pub trait TableStore {
    /// Returns the names of the base tables in `schema`, sorted.
    fn list_tables(&self, schema: &str)
    -> impl Future<Output = FusionResult<Vec<TableName>>> + Send;

    /// Returns the columns of `table` in declaration order.
    ///
    /// Fails with [`crate::error::ErrorKind::TableNotFound`] when the table does not exist.
    fn table_columns(
        &self,
        table: &TableName,
    ) -> impl Future<Output = FusionResult<Vec<ColumnSchema>>> + Send;

    fn count_rows(&self, table: &TableName) -> impl Future<Output = FusionResult<u64>> + Send;

    /// Returns the rows of `table` that `rule` marks as redundant, sorted by [`RowId`].
    fn find_duplicate_rows(
        &self,
        table: &TableName,
        rule: &DuplicateRule,
    ) -> impl Future<Output = FusionResult<Vec<RowId>>> + Send;

    /// Deletes the rows with the given identifiers and returns how many were deleted.
    fn delete_rows(
        &self,
        table: &TableName,
        row_ids: &[RowId],
    ) -> impl Future<Output = FusionResult<u64>> + Send;

    /// Deletes the rows whose `key_column` equals one of `keys`.
    fn delete_rows_by_key(
        &self,
        table: &TableName,
        key_column: &str,
        keys: &[KeyValue],
    ) -> impl Future<Output = FusionResult<u64>> + Send;

    /// Copies `update.columns` from the source row into every target row with the same key,
    /// restricted to `keys`. Returns the number of target rows updated.
    fn update_columns(
        &self,
        target: &TableName,
        update: &UpdateFromSource,
        keys: &[KeyValue],
    ) -> impl Future<Output = FusionResult<u64>> + Send;

    /// Adds all `columns` to `table` in one schema change.
    fn add_columns(
        &self,
        table: &TableName,
        columns: &[ColumnDefinition],
    ) -> impl Future<Output = FusionResult<()>> + Send;

    /// Returns the distinct non-null values of `key_column` present in both tables, sorted.
    fn matching_keys(
        &self,
        target: &TableName,
        source: &TableName,
        key_column: &str,
    ) -> impl Future<Output = FusionResult<Vec<KeyValue>>> + Send;

    /// Replaces `name` with a table holding the rows of every table in `tables`, projected on
    /// `columns`. Returns the number of rows written.
    fn create_table_from_union(
        &self,
        name: &TableName,
        tables: &[TableName],
        columns: &[String],
    ) -> impl Future<Output = FusionResult<u64>> + Send;
}
