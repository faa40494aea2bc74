use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a row identifier does not have the `(block,offset)` form.
#[derive(Debug, Error)]
#[error("invalid row identifier `{0}`, expected `(block,offset)`")]
pub struct ParseRowIdError(String);

/// Physical handle of a row, shaped like a Postgres `ctid`.
///
/// A [`RowId`] is only meaningful within the pass that produced it: the store may move or
/// reuse the slot once rows are deleted or updated. It is ordered by block then offset,
/// which gives every duplicate group a deterministic keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId {
    block: u32,
    offset: u16,
}

impl RowId {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.block, self.offset)
    }
}

impl FromStr for RowId {
    type Err = ParseRowIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseRowIdError(s.to_string());

        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let (block, offset) = inner.split_once(',').ok_or_else(invalid)?;

        Ok(RowId {
            block: block.trim().parse().map_err(|_| invalid())?,
            offset: offset.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Text rendering of a non-null key value, as the store prints it.
///
/// A key set is bound as a single `text[]` parameter whatever the declared type of the key
/// column. It only selects which keys a statement covers, rows are matched on the key values
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyValue(String);

impl KeyValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::new(value)
    }
}
