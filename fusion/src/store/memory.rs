use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dedup::DuplicateRule;
use crate::dedup::rule::{column_index, find_redundant_rows};
use crate::error::{ErrorKind, FusionResult};
use crate::store::base::{TableStore, UpdateFromSource};
use crate::types::{Cell, ColumnDefinition, ColumnSchema, KeyValue, RowId, TableName};
use crate::{bail, fusion_error};

/// Number of row slots per block when handing out [`RowId`]s.
const ROWS_PER_BLOCK: u64 = 256;

/// A table held by [`MemoryStore`].
#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnSchema>,
    rows: BTreeMap<RowId, Vec<Cell>>,
    /// Sequence used to hand out row identifiers, never reused within a table.
    next_row: u64,
}

impl MemoryTable {
    fn new(columns: Vec<ColumnSchema>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
            next_row: 0,
        }
    }

    fn push(&mut self, cells: Vec<Cell>) -> RowId {
        let block = (self.next_row / ROWS_PER_BLOCK) as u32;
        let offset = (self.next_row % ROWS_PER_BLOCK + 1) as u16;
        self.next_row += 1;

        let row_id = RowId::new(block, offset);
        self.rows.insert(row_id, cells);

        row_id
    }

    fn key_text(&self, row: &[Cell], key_index: usize) -> Option<String> {
        row.get(key_index).and_then(Cell::to_text)
    }
}

/// Inner state of [`MemoryStore`].
#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<TableName, MemoryTable>,
    /// Number of mutating statements executed, the unit a batch maps to.
    mutations: u64,
}

impl Inner {
    fn table(&self, name: &TableName) -> FusionResult<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    fn table_mut(&mut self, name: &TableName) -> FusionResult<&mut MemoryTable> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }
}

fn table_not_found(name: &TableName) -> crate::error::FusionError {
    fusion_error!(
        ErrorKind::TableNotFound,
        "Table not found",
        format!("Table '{name}' does not exist")
    )
}

/// In-memory [`TableStore`] for tests and dry runs.
///
/// Tables are kept in ordered maps so every read is deterministic. Each mutating call counts
/// as one statement, which makes the number of batches executed observable through
/// [`MemoryStore::mutation_count`]. Cloning the store shares its tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` with the given columns, replacing any table with the same name.
    pub async fn create_table(&self, table: TableName, columns: Vec<ColumnDefinition>) {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(position, column)| {
                ColumnSchema::new(column.name, column.typ, -1, position as i32 + 1, true)
            })
            .collect();

        let mut inner = self.inner.lock().await;
        inner.tables.insert(table, MemoryTable::new(columns));
    }

    /// Appends rows to `table` and returns their identifiers.
    pub async fn insert_rows(
        &self,
        table: &TableName,
        rows: Vec<Vec<Cell>>,
    ) -> FusionResult<Vec<RowId>> {
        let mut inner = self.inner.lock().await;
        let memory_table = inner.table_mut(table)?;

        let width = memory_table.columns.len();
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            bail!(
                ErrorKind::InvalidData,
                "Row does not match table width",
                format!(
                    "Table '{table}' has {width} columns but a row with {} values was given",
                    row.len()
                )
            );
        }

        Ok(rows.into_iter().map(|row| memory_table.push(row)).collect())
    }

    /// Returns the rows of `table` in row identifier order.
    pub async fn rows(&self, table: &TableName) -> FusionResult<Vec<Vec<Cell>>> {
        let inner = self.inner.lock().await;

        Ok(inner.table(table)?.rows.values().cloned().collect())
    }

    /// Returns the number of mutating statements executed so far.
    pub async fn mutation_count(&self) -> u64 {
        self.inner.lock().await.mutations
    }
}

impl TableStore for MemoryStore {
    async fn list_tables(&self, schema: &str) -> FusionResult<Vec<TableName>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .keys()
            .filter(|table| table.schema == schema)
            .cloned()
            .collect())
    }

    async fn table_columns(&self, table: &TableName) -> FusionResult<Vec<ColumnSchema>> {
        let inner = self.inner.lock().await;

        Ok(inner.table(table)?.columns.clone())
    }

    async fn count_rows(&self, table: &TableName) -> FusionResult<u64> {
        let inner = self.inner.lock().await;

        Ok(inner.table(table)?.rows.len() as u64)
    }

    async fn find_duplicate_rows(
        &self,
        table: &TableName,
        rule: &DuplicateRule,
    ) -> FusionResult<Vec<RowId>> {
        let inner = self.inner.lock().await;
        let memory_table = inner.table(table)?;

        find_redundant_rows(table, &memory_table.columns, &memory_table.rows, rule)
    }

    async fn delete_rows(&self, table: &TableName, row_ids: &[RowId]) -> FusionResult<u64> {
        let mut inner = self.inner.lock().await;
        let memory_table = inner.table_mut(table)?;

        let deleted = row_ids
            .iter()
            .filter(|row_id| memory_table.rows.remove(row_id).is_some())
            .count();
        inner.mutations += 1;

        Ok(deleted as u64)
    }

    async fn delete_rows_by_key(
        &self,
        table: &TableName,
        key_column: &str,
        keys: &[KeyValue],
    ) -> FusionResult<u64> {
        let mut inner = self.inner.lock().await;
        let memory_table = inner.table_mut(table)?;
        let key_index = column_index(table, &memory_table.columns, key_column)?;

        let keys: HashSet<&str> = keys.iter().map(KeyValue::as_str).collect();
        let before = memory_table.rows.len();
        memory_table.rows.retain(|_, row| {
            row[key_index]
                .to_text()
                .is_none_or(|key| !keys.contains(key.as_str()))
        });
        let deleted = before - memory_table.rows.len();
        inner.mutations += 1;

        Ok(deleted as u64)
    }

    async fn update_columns(
        &self,
        target: &TableName,
        update: &UpdateFromSource,
        keys: &[KeyValue],
    ) -> FusionResult<u64> {
        let mut inner = self.inner.lock().await;

        let source_table = inner.table(&update.source)?;
        let source_key = column_index(&update.source, &source_table.columns, &update.key_column)?;
        let source_indexes = update
            .columns
            .iter()
            .map(|column| column_index(&update.source, &source_table.columns, column))
            .collect::<FusionResult<Vec<_>>>()?;

        let keys: HashSet<&str> = keys.iter().map(KeyValue::as_str).collect();

        // First row per key wins, matching the lowest identifier after ranking.
        let mut source_values: BTreeMap<String, Vec<Cell>> = BTreeMap::new();
        for row in source_table.rows.values() {
            let Some(key) = source_table.key_text(row, source_key) else {
                continue;
            };
            if !keys.contains(key.as_str()) {
                continue;
            }
            source_values
                .entry(key)
                .or_insert_with(|| source_indexes.iter().map(|&i| row[i].clone()).collect());
        }

        let target_table = inner.table_mut(target)?;
        let target_key = column_index(target, &target_table.columns, &update.key_column)?;
        let target_indexes = update
            .columns
            .iter()
            .map(|column| column_index(target, &target_table.columns, column))
            .collect::<FusionResult<Vec<_>>>()?;

        let mut updated = 0;
        for row in target_table.rows.values_mut() {
            let Some(values) = row[target_key]
                .to_text()
                .and_then(|key| source_values.get(&key))
            else {
                continue;
            };

            for (&index, value) in target_indexes.iter().zip(values) {
                row[index] = value.clone();
            }
            updated += 1;
        }
        inner.mutations += 1;

        Ok(updated)
    }

    async fn add_columns(
        &self,
        table: &TableName,
        columns: &[ColumnDefinition],
    ) -> FusionResult<()> {
        let mut inner = self.inner.lock().await;
        let memory_table = inner.table_mut(table)?;

        if let Some(existing) = columns
            .iter()
            .find(|column| memory_table.columns.iter().any(|c| c.name == column.name))
        {
            bail!(
                ErrorKind::StoreQueryFailed,
                "Column already exists",
                format!("Column '{}' already exists in table '{table}'", existing.name)
            );
        }

        for column in columns {
            let position = memory_table.columns.len() as i32 + 1;
            memory_table.columns.push(ColumnSchema::new(
                column.name.clone(),
                column.typ.clone(),
                -1,
                position,
                true,
            ));
        }
        for row in memory_table.rows.values_mut() {
            row.resize(memory_table.columns.len(), Cell::Null);
        }
        inner.mutations += 1;

        Ok(())
    }

    async fn matching_keys(
        &self,
        target: &TableName,
        source: &TableName,
        key_column: &str,
    ) -> FusionResult<Vec<KeyValue>> {
        let inner = self.inner.lock().await;

        let key_set = |name: &TableName| -> FusionResult<BTreeSet<String>> {
            let table = inner.table(name)?;
            let key_index = column_index(name, &table.columns, key_column)?;

            Ok(table
                .rows
                .values()
                .filter_map(|row| table.key_text(row, key_index))
                .collect())
        };

        let target_keys = key_set(target)?;
        let source_keys = key_set(source)?;

        Ok(target_keys
            .intersection(&source_keys)
            .map(|key| KeyValue::new(key.as_str()))
            .collect())
    }

    async fn create_table_from_union(
        &self,
        name: &TableName,
        tables: &[TableName],
        columns: &[String],
    ) -> FusionResult<u64> {
        let mut inner = self.inner.lock().await;

        let mut union: Option<MemoryTable> = None;
        for table in tables {
            let memory_table = inner.table(table)?;
            let indexes = columns
                .iter()
                .map(|column| column_index(table, &memory_table.columns, column))
                .collect::<FusionResult<Vec<_>>>()?;

            let union = union.get_or_insert_with(|| {
                MemoryTable::new(
                    indexes
                        .iter()
                        .enumerate()
                        .map(|(position, &index)| {
                            let column = &memory_table.columns[index];
                            ColumnSchema::new(
                                column.name.clone(),
                                column.typ.clone(),
                                column.modifier,
                                position as i32 + 1,
                                true,
                            )
                        })
                        .collect(),
                )
            });

            let projected: Vec<Vec<Cell>> = memory_table
                .rows
                .values()
                .map(|row| indexes.iter().map(|&index| row[index].clone()).collect())
                .collect();
            for row in projected {
                union.push(row);
            }
        }

        let Some(union) = union else {
            bail!(
                ErrorKind::InvalidData,
                "No tables to union",
                format!("Table '{name}' cannot be created from an empty table list")
            );
        };

        let written = union.rows.len() as u64;
        inner.tables.insert(name.clone(), union);
        inner.mutations += 1;

        Ok(written)
    }
}
