use fusion_config::shared::PgConnectionConfig;
use rustls::ClientConfig;
use std::io::BufReader;
use std::sync::Arc;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Connection, NoTls, SimpleQueryMessage, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::dedup::DuplicateRule;
use crate::error::{ErrorKind, FusionError, FusionResult};
use crate::query::QueryBuilder;
use crate::store::base::{TableStore, UpdateFromSource};
use crate::types::{
    ColumnDefinition, ColumnSchema, KeyValue, RowId, TableName, convert_type_oid_to_type,
};
use crate::{bail, fusion_error};

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The client terminates the connection when dropped, the handle is not needed.
    tokio::spawn(task);
}

/// Converts a conversion failure raised while reading timestamps into a timestamp error.
fn into_timestamp_error(err: FusionError, table: &TableName, column: &str) -> FusionError {
    if err.kind() != ErrorKind::ConversionError {
        return err;
    }

    let detail = format!(
        "Column '{column}' of table '{table}' holds a value that is not a timestamp: {}",
        err.detail().unwrap_or_default()
    );
    fusion_error!(
        ErrorKind::TimestampParse,
        "Timestamp parsing failed",
        detail,
        source: err
    )
}

/// [`TableStore`] backed by a single Postgres connection.
///
/// Every method issues one statement outside of any explicit transaction, so each mutation is
/// committed as soon as it returns. The store never opens connections on its own after
/// [`PgTableStore::connect`]; cloning it shares the same client.
#[derive(Debug, Clone)]
pub struct PgTableStore {
    client: Arc<Client>,
}

impl PgTableStore {
    /// Connects to the database described by `config`, over TLS when it is enabled.
    pub async fn connect(config: &PgConnectionConfig) -> FusionResult<Self> {
        match config.tls.enabled {
            true => Self::connect_tls(config).await,
            false => Self::connect_no_tls(config).await,
        }
    }

    async fn connect_no_tls(config: &PgConnectionConfig) -> FusionResult<Self> {
        let (client, connection) = config.with_db().connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!(host = %config.host, database = %config.name, "connected to postgres without tls");

        Ok(Self::from_client(client))
    }

    async fn connect_tls(config: &PgConnectionConfig) -> FusionResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader = BufReader::new(config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config
            .with_db()
            .connect(MakeRustlsConnect::new(tls_config))
            .await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        info!(host = %config.host, database = %config.name, "connected to postgres with tls");

        Ok(Self::from_client(client))
    }

    /// Wraps an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn table_oid(&self, table: &TableName) -> FusionResult<u32> {
        let row = self
            .client
            .query_opt(QueryBuilder::table_oid(), &[&table.schema, &table.name])
            .await?;

        match row {
            Some(row) => Ok(row.try_get(0)?),
            None => bail!(
                ErrorKind::TableNotFound,
                "Table not found",
                format!("Table '{table}' does not exist")
            ),
        }
    }
}

impl TableStore for PgTableStore {
    async fn list_tables(&self, schema: &str) -> FusionResult<Vec<TableName>> {
        let rows = self.client.query(QueryBuilder::list_tables(), &[&schema]).await?;

        rows.iter()
            .map(|row| -> FusionResult<TableName> {
                let schema: String = row.try_get(0)?;
                let name: String = row.try_get(1)?;

                Ok(TableName::new(schema, name))
            })
            .collect()
    }

    async fn table_columns(&self, table: &TableName) -> FusionResult<Vec<ColumnSchema>> {
        let table_oid = self.table_oid(table).await?;
        let rows = self
            .client
            .query(QueryBuilder::table_columns(), &[&table_oid])
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let type_oid: u32 = row.try_get("type_oid")?;
            columns.push(ColumnSchema::new(
                row.try_get("name")?,
                convert_type_oid_to_type(type_oid),
                row.try_get("type_modifier")?,
                row.try_get("ordinal_position")?,
                row.try_get("nullable")?,
            ));
        }

        Ok(columns)
    }

    async fn count_rows(&self, table: &TableName) -> FusionResult<u64> {
        let row = self
            .client
            .query_one(&QueryBuilder::count_rows(table), &[])
            .await?;
        let count: i64 = row.try_get(0)?;

        Ok(count as u64)
    }

    async fn find_duplicate_rows(
        &self,
        table: &TableName,
        rule: &DuplicateRule,
    ) -> FusionResult<Vec<RowId>> {
        let columns = self.table_columns(table).await?;
        let query = QueryBuilder::find_duplicates(table, &columns, rule)?;

        debug!(%table, rule = rule.name(), "scanning for redundant rows");

        let rows = match rule {
            DuplicateRule::Temporal {
                timestamp_column,
                tolerance,
            } => {
                let tolerance_micros = i64::try_from(tolerance.as_micros()).unwrap_or(i64::MAX);
                let params: [&(dyn ToSql + Sync); 1] = [&tolerance_micros];

                self.client
                    .query(&query, &params)
                    .await
                    .map_err(FusionError::from)
                    .map_err(|err| into_timestamp_error(err, table, timestamp_column))?
            }
            DuplicateRule::FullRow | DuplicateRule::LeastComplete { .. } => {
                self.client.query(&query, &[]).await?
            }
        };

        let mut row_ids = Vec::with_capacity(rows.len());
        for row in rows {
            let ctid: String = row.try_get(0)?;
            let row_id = ctid.parse::<RowId>().map_err(|err| {
                fusion_error!(
                    ErrorKind::ConversionError,
                    "Row identifier parsing failed",
                    err.to_string(),
                    source: err
                )
            })?;
            row_ids.push(row_id);
        }
        row_ids.sort();

        Ok(row_ids)
    }

    async fn delete_rows(&self, table: &TableName, row_ids: &[RowId]) -> FusionResult<u64> {
        let row_ids: Vec<String> = row_ids.iter().map(RowId::to_string).collect();

        let deleted = self
            .client
            .execute(&QueryBuilder::delete_rows(table), &[&row_ids])
            .await?;

        Ok(deleted)
    }

    async fn delete_rows_by_key(
        &self,
        table: &TableName,
        key_column: &str,
        keys: &[KeyValue],
    ) -> FusionResult<u64> {
        let keys: Vec<&str> = keys.iter().map(KeyValue::as_str).collect();

        let deleted = self
            .client
            .execute(&QueryBuilder::delete_rows_by_key(table, key_column), &[&keys])
            .await?;

        Ok(deleted)
    }

    async fn update_columns(
        &self,
        target: &TableName,
        update: &UpdateFromSource,
        keys: &[KeyValue],
    ) -> FusionResult<u64> {
        let query = QueryBuilder::update_from_source(
            target,
            &update.source,
            &update.key_column,
            &update.columns,
        )?;
        let keys: Vec<&str> = keys.iter().map(KeyValue::as_str).collect();

        let updated = self.client.execute(&query, &[&keys]).await?;

        Ok(updated)
    }

    async fn add_columns(
        &self,
        table: &TableName,
        columns: &[ColumnDefinition],
    ) -> FusionResult<()> {
        let query = QueryBuilder::add_columns(table, columns)?;
        self.client.execute(&query, &[]).await?;

        Ok(())
    }

    async fn matching_keys(
        &self,
        target: &TableName,
        source: &TableName,
        key_column: &str,
    ) -> FusionResult<Vec<KeyValue>> {
        let rows = self
            .client
            .query(&QueryBuilder::matching_keys(target, source, key_column), &[])
            .await?;

        rows.iter()
            .map(|row| -> FusionResult<KeyValue> { Ok(KeyValue::new(row.try_get::<_, String>(0)?)) })
            .collect()
    }

    async fn create_table_from_union(
        &self,
        name: &TableName,
        tables: &[TableName],
        columns: &[String],
    ) -> FusionResult<u64> {
        let query = QueryBuilder::create_table_from_union(name, tables, columns)?;

        let written = self
            .client
            .simple_query(&query)
            .await?
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::CommandComplete(rows) => Some(rows),
                _ => None,
            })
            .last()
            .unwrap_or_default();

        Ok(written)
    }
}
