use fusion::error::FusionError;
use fusion_config::LoadConfigError;
use fusion_config::shared::ValidationError;
use fusion_telemetry::tracing::TracingError;
use rustyline::error::ReadlineError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Errors ending a `fusion` invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),

    #[error("failed to start the prompt: {0}")]
    Prompt(#[from] ReadlineError),

    #[error("failed to start the runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Fusion(#[from] FusionError),
}
