use fusion_config::shared::{PgConnectionConfig, TlsConfig};
use secrecy::SecretString;
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

use crate::store::PgTableStore;

/// Reads the connection of the test server from the environment.
///
/// Returns `None` when `TESTS_DATABASE_HOST` is not set, letting database tests skip. Each
/// call generates a unique database name so tests never share tables.
///
/// - `TESTS_DATABASE_HOST`: server hostname
/// - `TESTS_DATABASE_PORT`: server port, defaults to 5432
/// - `TESTS_DATABASE_USERNAME`: user, defaults to `postgres`
/// - `TESTS_DATABASE_PASSWORD`: password (optional)
pub fn local_pg_connection_config() -> Option<PgConnectionConfig> {
    let host = std::env::var("TESTS_DATABASE_HOST").ok()?;

    Some(PgConnectionConfig {
        host,
        port: std::env::var("TESTS_DATABASE_PORT")
            .map(|port| {
                port.parse()
                    .expect("TESTS_DATABASE_PORT must be a valid port number")
            })
            .unwrap_or(5432),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .unwrap_or_else(|_| "postgres".to_string()),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::disabled(),
    })
}

/// A database created for a single test, dropped when the value is dropped.
///
/// `client` is a raw connection for seeding and inspecting tables, `store` is the
/// [`PgTableStore`] under test. Both point at the same database.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub client: Client,
    pub store: PgTableStore,
}

impl TestDatabase {
    /// Runs `statements` as one simple query, panicking on failure.
    pub async fn run(&self, statements: &str) {
        self.client
            .batch_execute(statements)
            .await
            .expect("Failed to run test statements");
    }

    /// Returns the rows of `table` rendered as text, ordered by every column.
    pub async fn rows_as_text(&self, table: &str, columns: &[&str]) -> Vec<Vec<Option<String>>> {
        let projection = columns
            .iter()
            .map(|column| format!("{column}::text"))
            .collect::<Vec<_>>()
            .join(", ");
        let order = (1..=columns.len())
            .map(|position| position.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        self.client
            .query(&format!("select {projection} from {table} order by {order}"), &[])
            .await
            .expect("Failed to read test rows")
            .iter()
            .map(|row| (0..columns.len()).map(|index| row.get(index)).collect())
            .collect()
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let config = self.config.clone();
        // Requires the multi threaded runtime, as every database test uses.
        tokio::task::block_in_place(move || {
            Handle::current().block_on(drop_pg_database(&config));
        });
    }
}

/// Creates a fresh database and connects both a raw client and a store to it.
///
/// Returns `None` when no test server is configured.
///
/// # Panics
///
/// Panics if the server is configured but the database cannot be created.
pub async fn spawn_database() -> Option<TestDatabase> {
    let config = local_pg_connection_config()?;

    let (admin, connection) = config
        .without_db()
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");
    tokio::spawn(connection);
    admin
        .execute(&format!(r#"create database "{}""#, config.name), &[])
        .await
        .expect("Failed to create database");

    let (client, connection) = config
        .with_db()
        .connect(NoTls)
        .await
        .expect("Failed to connect to the test database");
    tokio::spawn(connection);

    let store = PgTableStore::connect(&config)
        .await
        .expect("Failed to connect the store");

    Some(TestDatabase {
        config,
        client,
        store,
    })
}

/// Terminates the connections to the database and drops it.
///
/// Errors are reported on stderr only, cleanup never fails a test.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let (client, connection) = match config.without_db().connect(NoTls).await {
        Ok(connected) => connected,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };
    tokio::spawn(connection);

    if let Err(e) = client
        .execute(
            "select pg_terminate_backend(pid)
            from pg_stat_activity
            where datname = $1 and pid <> pg_backend_pid()",
            &[&config.name],
        )
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = client
        .execute(&format!(r#"drop database if exists "{}""#, config.name), &[])
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}
