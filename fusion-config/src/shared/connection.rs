use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::LazyLock;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::ValidationError;

const APP_NAME_FUSION: &str = "fusion";

/// Session settings applied to every connection opened by the fusion tool.
///
/// Timestamps are rendered in UTC so that key values compared as text are stable across
/// sessions. Statement and lock timeouts are disabled, callers bound runs externally.
pub static FUSION_SESSION_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: "ISO".to_string(),
        intervalstyle: "postgres".to_string(),
        extra_float_digits: 3,
        client_encoding: "UTF8".to_string(),
        timezone: "UTC".to_string(),
        statement_timeout: 0,
        lock_timeout: 0,
        application_name: APP_NAME_FUSION.to_string(),
    });

#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub intervalstyle: String,
    pub extra_float_digits: i32,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    /// Returns the options as `-c key=value` pairs for the startup `options` parameter.
    pub fn to_options_string(&self) -> String {
        format!(
            "-c datestyle={} -c intervalstyle={} -c extra_float_digits={} -c client_encoding={} -c timezone={} -c statement_timeout={} -c lock_timeout={}",
            self.datestyle,
            self.intervalstyle,
            self.extra_float_digits,
            self.client_encoding,
            self.timezone,
            self.statement_timeout,
            self.lock_timeout,
        )
    }
}

/// Connection parameters for the Postgres database holding the tables to clean.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub name: String,
    pub username: String,
    /// Redacted in debug output.
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "database.host".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        self.tls.validate()
    }

    /// Builds tokio-postgres connect options for the configured database.
    pub fn with_db(&self) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Prefer
        };

        let mut config = TokioPgConnectOptions::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .dbname(&self.name)
            .application_name(&FUSION_SESSION_OPTIONS.application_name)
            .options(&FUSION_SESSION_OPTIONS.to_options_string())
            .ssl_mode(ssl_mode);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        config
    }

    /// Builds connect options for the server's `postgres` database, used to create or drop
    /// the configured database.
    pub fn without_db(&self) -> TokioPgConnectOptions {
        let mut config = self.with_db();
        config.dbname("postgres");

        config
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM encoded root certificates trusted when TLS is enabled.
    #[serde(default)]
    pub trusted_root_certs: String,
    #[serde(default)]
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}
