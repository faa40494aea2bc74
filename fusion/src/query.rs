//! Rendering of the SQL statements issued by [`crate::store::PgTableStore`].
//!
//! Identifiers are always quoted through [`pg_escape::quote_identifier`] and every value is
//! left to a `$n` placeholder, so nothing coming from table contents or from the caller is
//! spliced into a statement as a literal.

use pg_escape::quote_identifier;
use tokio_postgres::types::Kind;

use crate::bail;
use crate::dedup::DuplicateRule;
use crate::dedup::rule::validate_rule;
use crate::error::{ErrorKind, FusionResult};
use crate::types::{ColumnDefinition, ColumnSchema, TableName, Type, sql_type_name};

/// Built-in types Postgres has no equality operator for.
const TYPES_WITHOUT_EQUALITY: [Type; 9] = [
    Type::JSON,
    Type::XML,
    Type::POINT,
    Type::LINE,
    Type::LSEG,
    Type::BOX,
    Type::PATH,
    Type::POLYGON,
    Type::CIRCLE,
];

/// Renders a comma separated list of quoted column names.
fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|column| quote_identifier(column).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn lacks_equality(typ: &Type) -> bool {
    match typ.kind() {
        Kind::Array(element) => lacks_equality(element),
        _ => TYPES_WITHOUT_EQUALITY.contains(typ),
    }
}

/// Renders the expression a column is compared by when grouping rows.
///
/// Columns whose type cannot be compared for equality are grouped by their text form.
fn comparable_expression(column: &ColumnSchema) -> String {
    let name = quote_identifier(&column.name);
    if lacks_equality(&column.typ) {
        format!("{name}::text")
    } else {
        name.into_owned()
    }
}

/// Renders a `partition by` clause, empty when there is nothing to partition on.
fn partition_clause<'a>(columns: impl IntoIterator<Item = &'a ColumnSchema>) -> String {
    let expressions: Vec<String> = columns.into_iter().map(comparable_expression).collect();
    if expressions.is_empty() {
        return String::new();
    }

    format!("partition by {} ", expressions.join(", "))
}

/// Renders the number of `columns` holding a value, as one integer sum.
fn non_null_count<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    let terms: Vec<String> = columns
        .into_iter()
        .map(|column| format!("({} is not null)::int", quote_identifier(column)))
        .collect();
    if terms.is_empty() {
        return "0".to_string();
    }

    terms.join(" + ")
}

/// Builder of the statements needed by the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    /// Lists the base tables of the schema bound to `$1`.
    pub fn list_tables() -> &'static str {
        "select table_schema::text, table_name::text
        from information_schema.tables
        where table_schema::text = $1 and table_type = 'BASE TABLE'
        order by table_name"
    }

    /// Resolves the oid of the table whose schema and name are bound to `$1` and `$2`.
    pub fn table_oid() -> &'static str {
        "select c.oid
        from pg_class c
        join pg_namespace n on c.relnamespace = n.oid
        where n.nspname = $1 and c.relname = $2 and c.relkind in ('r', 'p')"
    }

    /// Lists the live columns of the table whose oid is bound to `$1`, in declaration order.
    pub fn table_columns() -> &'static str {
        "select
            a.attname::text as name,
            a.atttypid as type_oid,
            a.atttypmod as type_modifier,
            a.attnum::int4 as ordinal_position,
            not a.attnotnull as nullable
        from pg_attribute a
        where a.attrelid = $1 and a.attnum > 0 and not a.attisdropped
        order by a.attnum"
    }

    pub fn count_rows(table: &TableName) -> String {
        format!("select count(*) from {}", table.as_quoted_identifier())
    }

    /// Selects the `ctid` of every row `rule` marks as redundant.
    ///
    /// The temporal rule expects its tolerance, in microseconds, bound to `$1` as a `bigint`.
    pub fn find_duplicates(
        table: &TableName,
        columns: &[ColumnSchema],
        rule: &DuplicateRule,
    ) -> FusionResult<String> {
        validate_rule(table, columns, rule)?;

        let quoted_table = table.as_quoted_identifier();
        let query = match rule {
            DuplicateRule::FullRow => {
                format!(
                    "select ctid::text from (
                        select ctid, row_number() over ({}order by ctid) as rank
                        from {quoted_table}
                    ) ranked
                    where rank > 1
                    order by ctid",
                    partition_clause(columns),
                )
            }
            DuplicateRule::Temporal {
                timestamp_column, ..
            } => {
                let partition = columns
                    .iter()
                    .filter(|column| &column.name != timestamp_column);
                let timestamp = format!("{}::timestamptz", quote_identifier(timestamp_column));

                format!(
                    "select ctid::text from (
                        select ctid, {timestamp} as current_ts, lag({timestamp}) over w as previous_ts
                        from {quoted_table}
                        window w as ({}order by {timestamp}, ctid)
                    ) ordered
                    where current_ts - previous_ts <= $1::bigint * interval '1 microsecond'
                    order by ctid",
                    partition_clause(partition),
                )
            }
            DuplicateRule::LeastComplete { key_column } => {
                let score = non_null_count(
                    columns
                        .iter()
                        .map(|c| c.name.as_str())
                        .filter(|name| name != key_column),
                );
                let key = quote_identifier(key_column);
                let partition =
                    partition_clause(columns.iter().filter(|c| &c.name == key_column));

                format!(
                    "select ctid::text from (
                        select ctid, row_number() over ({partition}order by {score} desc, ctid) as rank
                        from {quoted_table}
                        where {key} is not null
                    ) ranked
                    where rank > 1
                    order by ctid"
                )
            }
        };

        Ok(query)
    }

    /// Deletes the rows whose `ctid` is in the `text[]` bound to `$1`.
    pub fn delete_rows(table: &TableName) -> String {
        format!(
            "delete from {} where ctid = any($1::text[]::tid[])",
            table.as_quoted_identifier()
        )
    }

    /// Deletes the rows whose key, read as text, is in the `text[]` bound to `$1`.
    pub fn delete_rows_by_key(table: &TableName, key_column: &str) -> String {
        format!(
            "delete from {} where {}::text = any($1::text[])",
            table.as_quoted_identifier(),
            quote_identifier(key_column)
        )
    }

    /// Copies `columns` from `source` into `target` for the target keys whose text form is in
    /// the `text[]` bound to `$1`.
    ///
    /// Rows are joined on the key values themselves, so the key columns of both tables must
    /// be comparable, and `$1` holds keys as returned by [`QueryBuilder::matching_keys`].
    pub fn update_from_source(
        target: &TableName,
        source: &TableName,
        key_column: &str,
        columns: &[String],
    ) -> FusionResult<String> {
        if columns.is_empty() {
            bail!(
                ErrorKind::InvalidData,
                "No columns to update",
                format!("Update of '{target}' from '{source}' names no columns")
            );
        }

        let assignments = columns
            .iter()
            .map(|column| {
                let column = quote_identifier(column);
                format!("{column} = s.{column}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let key = quote_identifier(key_column);

        Ok(format!(
            "update {} as t set {assignments}
            from {} as s
            where t.{key} = s.{key} and t.{key}::text = any($1::text[])",
            target.as_quoted_identifier(),
            source.as_quoted_identifier(),
        ))
    }

    /// Adds every column in one `alter table` statement.
    pub fn add_columns(table: &TableName, columns: &[ColumnDefinition]) -> FusionResult<String> {
        if columns.is_empty() {
            bail!(
                ErrorKind::InvalidData,
                "No columns to add",
                format!("Schema change of '{table}' names no columns")
            );
        }

        let additions = columns
            .iter()
            .map(|column| {
                format!(
                    "add column {} {}",
                    quote_identifier(&column.name),
                    sql_type_name(&column.typ)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "alter table {} {additions}",
            table.as_quoted_identifier()
        ))
    }

    /// Selects, in byte order, the text form of the distinct target keys equal to a source key.
    pub fn matching_keys(target: &TableName, source: &TableName, key_column: &str) -> String {
        let key = quote_identifier(key_column);

        format!(
            "select distinct t.{key}::text collate \"C\" as key
            from {} as t
            join {} as s on t.{key} = s.{key}
            order by key",
            target.as_quoted_identifier(),
            source.as_quoted_identifier(),
        )
    }

    /// Replaces `name` with the `union all` of `tables` projected on `columns`.
    ///
    /// Returns two statements meant to be sent together as one simple query, which Postgres
    /// runs in a single implicit transaction.
    pub fn create_table_from_union(
        name: &TableName,
        tables: &[TableName],
        columns: &[String],
    ) -> FusionResult<String> {
        if tables.is_empty() || columns.is_empty() {
            bail!(
                ErrorKind::InvalidData,
                "No tables to union",
                format!("Table '{name}' cannot be created from an empty table or column list")
            );
        }

        let projection = column_list(columns.iter().map(String::as_str));
        let selects = tables
            .iter()
            .map(|table| format!("select {projection} from {}", table.as_quoted_identifier()))
            .collect::<Vec<_>>()
            .join(" union all ");
        let quoted_name = name.as_quoted_identifier();

        Ok(format!(
            "drop table if exists {quoted_name}; create table {quoted_name} as {selects};"
        ))
    }
}
