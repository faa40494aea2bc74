use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::bail;
use crate::error::{ErrorKind, FusionResult};

/// Layouts tried, in order, when a text cell is read as a timestamp without an offset.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Layout of a timestamp with a numeric offset as Postgres prints it (`+00`, `+02:00`).
const OFFSET_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// A single column value held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the value as Postgres would print it with `::text`, or `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(value) => Some(value.to_string()),
            Cell::I32(value) => Some(value.to_string()),
            Cell::I64(value) => Some(value.to_string()),
            Cell::F64(value) => Some(value.to_string()),
            Cell::String(value) => Some(value.clone()),
            Cell::Date(value) => Some(value.format("%Y-%m-%d").to_string()),
            Cell::Timestamp(value) => Some(value.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Cell::TimestampTz(value) => {
                Some(value.format("%Y-%m-%d %H:%M:%S%.f+00").to_string())
            }
        }
    }

    /// Interprets the value as a point in time, `None` for NULL.
    ///
    /// Timestamps without zone are taken as UTC, dates as their midnight. Text is parsed
    /// with the layouts CSV exports commonly use (`2022-10-01 00:00:00 UTC`, RFC 3339, ISO
    /// with or without offset). Any other value fails with [`ErrorKind::TimestampParse`].
    pub fn to_timestamp(&self) -> FusionResult<Option<DateTime<Utc>>> {
        match self {
            Cell::Null => Ok(None),
            Cell::TimestampTz(value) => Ok(Some(*value)),
            Cell::Timestamp(value) => Ok(Some(value.and_utc())),
            Cell::Date(value) => Ok(value.and_hms_opt(0, 0, 0).map(|value| value.and_utc())),
            Cell::String(value) => parse_timestamp(value).map(Some),
            other => bail!(
                ErrorKind::TimestampParse,
                "Value is not a timestamp",
                format!("Value {other:?} cannot be read as a timestamp")
            ),
        }
    }
}

/// Parses a textual timestamp.
pub fn parse_timestamp(value: &str) -> FusionResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_str(value, OFFSET_TIMESTAMP_FORMAT) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = value
        .strip_suffix(" UTC")
        .or_else(|| value.strip_suffix('Z'))
        .unwrap_or(value);
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(parsed.and_utc());
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    bail!(
        ErrorKind::TimestampParse,
        "Timestamp parsing failed",
        format!("Value '{value}' is not a recognized timestamp")
    );
}
