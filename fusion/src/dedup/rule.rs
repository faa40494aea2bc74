use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::bail;
use crate::error::{ErrorKind, FusionResult};
use crate::types::{Cell, ColumnSchema, RowId, TableName, Type};

/// Equivalence rule deciding which rows of a table are redundant.
///
/// Every rule partitions the rows of a table, orders each partition deterministically and
/// reports the rows that must go so that a single keeper survives per partition. Partitions
/// treat NULL as equal to NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateRule {
    /// Rows equal on every column. The lowest [`RowId`] of each group is kept.
    FullRow,
    /// Rows equal on every column except `timestamp_column` whose timestamp lies within
    /// `tolerance` of the row right before it in timestamp order.
    ///
    /// The comparison is made against the immediate predecessor, whether or not that
    /// predecessor is itself removed, so a chain of rows each within tolerance of its
    /// neighbour collapses into its first row in a single pass.
    Temporal {
        timestamp_column: String,
        tolerance: Duration,
    },
    /// Rows sharing a non-null `key_column` value. The row with the most non-null values
    /// outside the key is kept, ties going to the lowest [`RowId`].
    LeastComplete { key_column: String },
}

impl DuplicateRule {
    pub fn temporal(timestamp_column: impl Into<String>, tolerance: Duration) -> Self {
        DuplicateRule::Temporal {
            timestamp_column: timestamp_column.into(),
            tolerance,
        }
    }

    pub fn least_complete(key_column: impl Into<String>) -> Self {
        DuplicateRule::LeastComplete {
            key_column: key_column.into(),
        }
    }

    /// Short name of the rule, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DuplicateRule::FullRow => "full_row",
            DuplicateRule::Temporal { .. } => "temporal",
            DuplicateRule::LeastComplete { .. } => "least_complete",
        }
    }
}

/// Returns whether a column of type `typ` can hold values read as timestamps.
pub fn is_timestamp_compatible(typ: &Type) -> bool {
    matches!(
        *typ,
        Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::DATE
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
    )
}

/// Finds the position of `column` in `columns`, failing with [`ErrorKind::ColumnNotFound`].
pub(crate) fn column_index(
    table: &TableName,
    columns: &[ColumnSchema],
    column: &str,
) -> FusionResult<usize> {
    match columns.iter().position(|schema| schema.name == column) {
        Some(index) => Ok(index),
        None => bail!(
            ErrorKind::ColumnNotFound,
            "Column not found",
            format!("Column '{column}' does not exist in table '{table}'")
        ),
    }
}

/// Validates that `rule` can be applied to a table with `columns`.
pub(crate) fn validate_rule(
    table: &TableName,
    columns: &[ColumnSchema],
    rule: &DuplicateRule,
) -> FusionResult<()> {
    match rule {
        DuplicateRule::FullRow => Ok(()),
        DuplicateRule::Temporal {
            timestamp_column, ..
        } => {
            let index = column_index(table, columns, timestamp_column)?;
            let typ = &columns[index].typ;
            if !is_timestamp_compatible(typ) {
                bail!(
                    ErrorKind::TimestampParse,
                    "Column is not a timestamp",
                    format!(
                        "Column '{timestamp_column}' of table '{table}' has type '{typ}' which cannot hold timestamps"
                    )
                );
            }

            Ok(())
        }
        DuplicateRule::LeastComplete { key_column } => {
            column_index(table, columns, key_column).map(|_| ())
        }
    }
}

/// Partition key of a row: the text form of the selected cells, NULL kept as `None`.
type PartitionKey = Vec<Option<String>>;

fn partition_key<'a>(cells: impl Iterator<Item = &'a Cell>) -> PartitionKey {
    cells.map(Cell::to_text).collect()
}

/// Evaluates `rule` over rows held in memory and returns the redundant rows, sorted.
///
/// `rows` must be ordered by [`RowId`], which is the order used for tie-breaks.
pub(crate) fn find_redundant_rows(
    table: &TableName,
    columns: &[ColumnSchema],
    rows: &BTreeMap<RowId, Vec<Cell>>,
    rule: &DuplicateRule,
) -> FusionResult<Vec<RowId>> {
    validate_rule(table, columns, rule)?;

    let mut redundant = match rule {
        DuplicateRule::FullRow => full_row_duplicates(rows),
        DuplicateRule::Temporal {
            timestamp_column,
            tolerance,
        } => {
            let index = column_index(table, columns, timestamp_column)?;
            temporal_duplicates(rows, index, *tolerance)?
        }
        DuplicateRule::LeastComplete { key_column } => {
            let index = column_index(table, columns, key_column)?;
            least_complete_rows(rows, index)
        }
    };
    redundant.sort();

    Ok(redundant)
}

fn full_row_duplicates(rows: &BTreeMap<RowId, Vec<Cell>>) -> Vec<RowId> {
    let mut groups: BTreeMap<PartitionKey, Vec<RowId>> = BTreeMap::new();
    for (row_id, cells) in rows {
        groups
            .entry(partition_key(cells.iter()))
            .or_default()
            .push(*row_id);
    }

    groups
        .into_values()
        .flat_map(|group| group.into_iter().skip(1))
        .collect()
}

fn temporal_duplicates(
    rows: &BTreeMap<RowId, Vec<Cell>>,
    timestamp_index: usize,
    tolerance: Duration,
) -> FusionResult<Vec<RowId>> {
    let tolerance_micros = i64::try_from(tolerance.as_micros()).unwrap_or(i64::MAX);

    let mut groups: BTreeMap<PartitionKey, Vec<(Option<DateTime<Utc>>, RowId)>> = BTreeMap::new();
    for (row_id, cells) in rows {
        let key = partition_key(
            cells
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != timestamp_index)
                .map(|(_, cell)| cell),
        );
        let timestamp = cells[timestamp_index].to_timestamp()?;

        groups.entry(key).or_default().push((timestamp, *row_id));
    }

    let mut redundant = Vec::new();
    for mut group in groups.into_values() {
        // Timestamps ascending with NULLs last, row identifier breaking ties.
        group.sort_by_key(|(timestamp, row_id)| (timestamp.is_none(), *timestamp, *row_id));

        for pair in group.windows(2) {
            let (Some(previous), _) = pair[0] else {
                continue;
            };
            let (Some(current), row_id) = pair[1] else {
                continue;
            };

            let within_tolerance = (current - previous)
                .num_microseconds()
                .is_some_and(|gap| gap <= tolerance_micros);
            if within_tolerance {
                redundant.push(row_id);
            }
        }
    }

    Ok(redundant)
}

fn least_complete_rows(rows: &BTreeMap<RowId, Vec<Cell>>, key_index: usize) -> Vec<RowId> {
    let mut groups: BTreeMap<String, Vec<(usize, RowId)>> = BTreeMap::new();
    for (row_id, cells) in rows {
        let Some(key) = cells[key_index].to_text() else {
            continue;
        };
        let score = completeness_score(cells, key_index);

        groups.entry(key).or_default().push((score, *row_id));
    }

    let mut redundant = Vec::new();
    for mut group in groups.into_values() {
        group.sort_by_key(|(score, row_id)| (Reverse(*score), *row_id));
        redundant.extend(group.into_iter().skip(1).map(|(_, row_id)| row_id));
    }

    redundant
}

/// Counts the non-null cells of a row, ignoring the key column.
pub fn completeness_score(cells: &[Cell], key_index: usize) -> usize {
    cells
        .iter()
        .enumerate()
        .filter(|(index, cell)| *index != key_index && !cell.is_null())
        .count()
}
