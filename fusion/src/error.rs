//! Error types and result definitions for fusion operations.
//!
//! Every fallible operation of the engine returns a [`FusionError`], which carries an
//! [`ErrorKind`] for programmatic handling together with a static description, optional
//! dynamic detail, the originating error and the callsite that raised it.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for fusion operations.
pub type FusionResult<T> = Result<T, FusionError>;

/// Classification of a [`FusionError`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Lookup errors
    TableNotFound,
    ColumnNotFound,

    // Schema & key errors
    SchemaMismatch,
    NoCommonKey,
    InvalidKey,

    // Data errors
    TimestampParse,
    ConversionError,
    ConstraintViolation,
    InvalidData,

    // Store errors
    StoreConnectionFailed,
    StoreQueryFailed,
    StoreIoError,
    AuthenticationError,
    InvalidState,

    // Caller supplied input
    ConfigError,
    SelectionFailed,

    IoError,

    Unknown,
}

impl ErrorKind {
    /// Returns whether the kind reports a missing table or column.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorKind::TableNotFound | ErrorKind::ColumnNotFound)
    }
}

/// Main error type of the fusion engine.
#[derive(Debug, Clone)]
pub struct FusionError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl FusionError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        FusionError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for FusionError {
    fn eq(&self, other: &FusionError) -> bool {
        self.kind == other.kind && self.description == other.description
    }
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        let rendered_backtrace = self.backtrace.to_string();
        if !rendered_backtrace.trim().is_empty() && !rendered_backtrace.contains("disabled") {
            write!(f, "\n  Backtrace:")?;
            for line in rendered_backtrace.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for FusionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`FusionError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for FusionError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> FusionError {
        FusionError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`FusionError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for FusionError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> FusionError {
        FusionError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for FusionError {
    #[track_caller]
    fn from(err: std::io::Error) -> FusionError {
        let detail = err.to_string();
        FusionError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rustls::Error> for FusionError {
    #[track_caller]
    fn from(err: rustls::Error) -> FusionError {
        let detail = err.to_string();
        FusionError::from_components(
            ErrorKind::StoreConnectionFailed,
            Cow::Borrowed("TLS configuration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio_postgres::Error`] by classifying its SQLSTATE code.
impl From<tokio_postgres::Error> for FusionError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> FusionError {
        use tokio_postgres::error::SqlState;

        let (kind, description) = match err.code() {
            Some(sqlstate) => match *sqlstate {
                SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                | SqlState::TOO_MANY_CONNECTIONS => (
                    ErrorKind::StoreConnectionFailed,
                    "PostgreSQL connection failed",
                ),

                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),

                SqlState::UNDEFINED_TABLE | SqlState::UNDEFINED_SCHEMA => {
                    (ErrorKind::TableNotFound, "PostgreSQL table not found")
                }
                SqlState::UNDEFINED_COLUMN => {
                    (ErrorKind::ColumnNotFound, "PostgreSQL column not found")
                }

                SqlState::INTEGRITY_CONSTRAINT_VIOLATION
                | SqlState::NOT_NULL_VIOLATION
                | SqlState::FOREIGN_KEY_VIOLATION
                | SqlState::UNIQUE_VIOLATION
                | SqlState::CHECK_VIOLATION => (
                    ErrorKind::ConstraintViolation,
                    "PostgreSQL constraint violation",
                ),

                SqlState::DATA_EXCEPTION
                | SqlState::INVALID_TEXT_REPRESENTATION
                | SqlState::INVALID_DATETIME_FORMAT
                | SqlState::DATETIME_FIELD_OVERFLOW
                | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                | SqlState::CANNOT_COERCE
                | SqlState::DATATYPE_MISMATCH => (
                    ErrorKind::ConversionError,
                    "PostgreSQL data conversion failed",
                ),

                SqlState::T_R_SERIALIZATION_FAILURE
                | SqlState::T_R_DEADLOCK_DETECTED
                | SqlState::LOCK_NOT_AVAILABLE
                | SqlState::INVALID_TRANSACTION_STATE => {
                    (ErrorKind::InvalidState, "PostgreSQL transaction failed")
                }

                SqlState::IO_ERROR => (ErrorKind::StoreIoError, "PostgreSQL I/O error"),

                _ => (ErrorKind::StoreQueryFailed, "PostgreSQL query failed"),
            },
            // Without a code the error comes from the client side, usually the socket.
            None if err.is_closed() => (
                ErrorKind::StoreConnectionFailed,
                "PostgreSQL connection closed",
            ),
            None => (ErrorKind::StoreQueryFailed, "PostgreSQL client error"),
        };

        let detail = err
            .as_db_error()
            .map(|db_error| db_error.message().to_string())
            .unwrap_or_else(|| err.to_string());

        FusionError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
