//! `fusion` command line tool.
//!
//! Cleans duplicate rows out of Postgres tables and merges the columns of one table into
//! another. Connection and defaults come from `configuration/` and `APP_` environment
//! variables; table names and key columns missing from the command line are prompted for.

use clap::{Parser, Subcommand};
use fusion::store::PgTableStore;
use fusion_config::load_config;
use fusion_config::shared::FusionConfig;
use fusion_telemetry::tracing::init_tracing;
use tracing::error;

use crate::commands::{DedupArgs, FuseArgs, JoinArgs};
use crate::error::CliResult;

mod commands;
mod error;
mod prompt;

#[derive(Debug, Parser)]
#[command(name = "fusion", version, about, arg_required_else_help = true)]
struct AppArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the tables of the public schema
    Tables,
    /// Remove exact and temporal duplicates from a table
    Dedup(DedupArgs),
    /// Add the columns of a source table to a target table, matching rows on a key
    Fuse(FuseArgs),
    /// Create a table from every table whose name starts with a prefix
    Join(JoinArgs),
}

fn main() {
    let args = AppArgs::parse();

    if let Err(err) = main_impl(args) {
        error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn main_impl(args: AppArgs) -> CliResult<()> {
    init_tracing(env!("CARGO_BIN_NAME"))?;

    let config = load_config::<FusionConfig>()?;
    config.validate()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args.command, config))
}

async fn async_main(command: Command, config: FusionConfig) -> CliResult<()> {
    let store = PgTableStore::connect(&config.database).await?;

    match command {
        Command::Tables => commands::tables(store).await,
        Command::Dedup(args) => commands::dedup(store, &config, args).await,
        Command::Fuse(args) => commands::fuse(store, &config, args).await,
        Command::Join(args) => commands::join(store, args).await,
    }
}
