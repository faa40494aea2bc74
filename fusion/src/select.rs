//! Choice of a key column or a table among candidates, made outside the engine.
//!
//! The engine never prompts. Whoever drives it supplies a selector: an interactive prompt, a
//! fixed answer from the command line or a closure in tests.

use crate::bail;
use crate::error::{ErrorKind, FusionResult};
use crate::types::TableName;

/// Chooses the key column used to match two tables.
pub trait KeySelector {
    /// Returns one of `candidates`, which are sorted and hold at least two names.
    fn select_key(&self, candidates: &[String]) -> FusionResult<String>;
}

/// Chooses one table among candidates.
pub trait TableSelector {
    fn select_table(&self, candidates: &[TableName]) -> FusionResult<TableName>;
}

impl<F> KeySelector for F
where
    F: Fn(&[String]) -> FusionResult<String>,
{
    fn select_key(&self, candidates: &[String]) -> FusionResult<String> {
        self(candidates)
    }
}

/// Selector answering with values fixed up front.
#[derive(Debug, Clone, Default)]
pub struct FixedSelection {
    key: Option<String>,
    table: Option<TableName>,
}

impl FixedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_table(mut self, table: TableName) -> Self {
        self.table = Some(table);
        self
    }
}

impl KeySelector for FixedSelection {
    fn select_key(&self, candidates: &[String]) -> FusionResult<String> {
        match &self.key {
            Some(key) => Ok(key.clone()),
            None => bail!(
                ErrorKind::SelectionFailed,
                "No key column selected",
                format!("A key column must be chosen among {}", candidates.join(", "))
            ),
        }
    }
}

impl TableSelector for FixedSelection {
    fn select_table(&self, candidates: &[TableName]) -> FusionResult<TableName> {
        match &self.table {
            Some(table) if candidates.contains(table) => Ok(table.clone()),
            Some(table) => bail!(
                ErrorKind::TableNotFound,
                "Selected table not found",
                format!("Table '{table}' is not among the available tables")
            ),
            None => bail!(
                ErrorKind::SelectionFailed,
                "No table selected",
                format!("A table must be chosen among {} candidates", candidates.len())
            ),
        }
    }
}
