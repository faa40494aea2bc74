use chrono::NaiveDateTime;
use fusion::store::MemoryStore;
use fusion::types::{Cell, ColumnDefinition, TableName, Type};
use std::collections::BTreeSet;

pub fn table(name: &str) -> TableName {
    TableName::public(name)
}

pub fn text(value: &str) -> Cell {
    Cell::String(value.to_string())
}

pub fn int(value: i32) -> Cell {
    Cell::I32(value)
}

/// A timestamp cell from `YYYY-MM-DD HH:MM:SS[.fff]`.
pub fn at(value: &str) -> Cell {
    Cell::Timestamp(
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
            .expect("test timestamp must be valid"),
    )
}

/// Creates `name` with `columns` and fills it with `rows`.
pub async fn seed(
    store: &MemoryStore,
    name: &str,
    columns: &[(&str, Type)],
    rows: Vec<Vec<Cell>>,
) -> TableName {
    let table = table(name);
    store
        .create_table(
            table.clone(),
            columns
                .iter()
                .map(|(column, typ)| ColumnDefinition::new(*column, typ.clone()))
                .collect(),
        )
        .await;
    store.insert_rows(&table, rows).await.unwrap();

    table
}

/// Renders the rows of `table` as text for order-insensitive comparisons.
pub async fn row_set(store: &MemoryStore, table: &TableName) -> BTreeSet<Vec<Option<String>>> {
    store
        .rows(table)
        .await
        .unwrap()
        .iter()
        .map(|row| row.iter().map(Cell::to_text).collect())
        .collect()
}

/// Renders the rows of `table` as text in row identifier order.
pub async fn row_list(store: &MemoryStore, table: &TableName) -> Vec<Vec<Option<String>>> {
    store
        .rows(table)
        .await
        .unwrap()
        .iter()
        .map(|row| row.iter().map(Cell::to_text).collect())
        .collect()
}
