use pg_escape::quote_identifier;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::{Kind, Type};

/// An object identifier in Postgres.
type Oid = u32;

/// Schema used when a table name is given without one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Converts a type oid to a [`Type`], falling back to an unnamed type for unknown oids.
pub fn convert_type_oid_to_type(type_oid: Oid) -> Type {
    Type::from_oid(type_oid).unwrap_or(Type::new(
        format!("unnamed_type({type_oid})"),
        type_oid,
        Kind::Simple,
        "pg_catalog".to_string(),
    ))
}

/// A fully qualified table name consisting of a schema and table name.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Creates a table name in the [`DEFAULT_SCHEMA`].
    pub fn public(name: impl Into<String>) -> TableName {
        Self::new(DEFAULT_SCHEMA, name)
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for TableName {
    type Err = std::convert::Infallible;

    /// Parses `schema.table` or a bare `table`, which lands in [`DEFAULT_SCHEMA`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('.') {
            Some((schema, name)) => TableName::new(schema, name),
            None => TableName::public(s),
        })
    }
}

/// Type modifier of a column, such as the length of a `varchar`.
type TypeModifier = i32;

/// The declared shape of a single column.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: Type,
    pub modifier: TypeModifier,
    /// 1-based position of the column, significant only for display.
    pub ordinal_position: i32,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(
        name: String,
        typ: Type,
        modifier: TypeModifier,
        ordinal_position: i32,
        nullable: bool,
    ) -> ColumnSchema {
        Self {
            name,
            typ,
            modifier,
            ordinal_position,
            nullable,
        }
    }
}

/// A column to be added to a table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub typ: Type,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}

/// Returns the SQL spelling of a column type accepted by `alter table ... add column`.
///
/// Only the types produced by the reconciliation mapping are spelled out; anything else is
/// written as `text`.
pub fn sql_type_name(typ: &Type) -> &'static str {
    match *typ {
        Type::INT2 => "smallint",
        Type::INT4 => "integer",
        Type::INT8 => "bigint",
        Type::FLOAT4 => "real",
        Type::FLOAT8 => "double precision",
        Type::NUMERIC => "numeric",
        Type::BOOL => "boolean",
        Type::VARCHAR => "varchar",
        Type::DATE => "date",
        Type::TIMESTAMP => "timestamp",
        Type::TIMESTAMPTZ => "timestamptz",
        _ => "text",
    }
}
