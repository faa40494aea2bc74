use clap::Args;
use fusion::catalog::SchemaCatalog;
use fusion::dedup::Deduplicator;
use fusion::orchestrator::FusionOrchestrator;
use fusion::select::TableSelector;
use fusion::store::PgTableStore;
use fusion::types::{DEFAULT_SCHEMA, TableName};
use fusion::union::TableUnion;
use fusion_config::shared::{BatchConfig, DedupConfig, FusionConfig};
use tracing::info;

use crate::error::CliResult;
use crate::prompt::Prompt;

#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Table to clean, prompted for when omitted
    #[arg(long)]
    table: Option<TableName>,

    /// Column compared with a tolerance instead of exactly, required unless --exact-only is set
    #[arg(long)]
    timestamp_column: Option<String>,

    /// Largest gap, in milliseconds, between two events considered the same
    #[arg(long)]
    tolerance_ms: Option<u64>,

    /// Only remove rows identical on every column
    #[arg(long)]
    exact_only: bool,

    /// Maximum number of rows deleted per statement
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct FuseArgs {
    /// Table receiving the new columns, prompted for when omitted
    #[arg(long)]
    target: Option<TableName>,

    /// Table providing the new columns, prompted for when omitted
    #[arg(long)]
    source: Option<TableName>,

    /// Column matching rows of both tables, prompted for when several are shared
    #[arg(long)]
    key: Option<String>,

    /// Maximum number of keys updated per statement
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct JoinArgs {
    /// Prefix of the tables to join
    #[arg(long, default_value = "data_202")]
    prefix: String,

    /// Table created from the joined rows, replaced if it exists
    #[arg(long, default_value = "customers")]
    into: TableName,
}

fn batch_config(config: &FusionConfig, batch_size: Option<usize>) -> CliResult<BatchConfig> {
    let batch = BatchConfig {
        max_size: batch_size.unwrap_or(config.batch.max_size),
    };
    batch.validate()?;

    Ok(batch)
}

/// Uses `table` when given, otherwise asks for one of the tables of the default schema.
async fn resolve_table(
    store: &PgTableStore,
    prompt: &Prompt,
    table: Option<TableName>,
) -> CliResult<TableName> {
    if let Some(table) = table {
        return Ok(table);
    }

    let tables = SchemaCatalog::new(store.clone())
        .tables(DEFAULT_SCHEMA)
        .await?;

    Ok(prompt.select_table(&tables)?)
}

pub async fn tables(store: PgTableStore) -> CliResult<()> {
    let tables = SchemaCatalog::new(store).tables(DEFAULT_SCHEMA).await?;
    for table in tables {
        println!("{table}");
    }

    Ok(())
}

pub async fn dedup(store: PgTableStore, config: &FusionConfig, args: DedupArgs) -> CliResult<()> {
    let prompt = Prompt::new()?;
    let table = resolve_table(&store, &prompt, args.table).await?;

    let batch = batch_config(config, args.batch_size)?;
    let deduplicator = if args.exact_only {
        Deduplicator::exact_only(store, batch.max_size)?
    } else {
        let dedup = DedupConfig {
            timestamp_column: args
                .timestamp_column
                .unwrap_or_else(|| config.dedup.timestamp_column.clone()),
            temporal_tolerance_ms: args
                .tolerance_ms
                .unwrap_or(config.dedup.temporal_tolerance_ms),
        };
        dedup.validate()?;

        Deduplicator::from_config(store, &dedup, &batch)?
    };

    let report = deduplicator.run(&table).await?;
    println!(
        "{table}: removed {} exact and {} temporal duplicates",
        report.exact_removed, report.temporal_removed
    );

    Ok(())
}

pub async fn fuse(store: PgTableStore, config: &FusionConfig, args: FuseArgs) -> CliResult<()> {
    let prompt = Prompt::new()?;
    let target = resolve_table(&store, &prompt, args.target).await?;
    let source = resolve_table(&store, &prompt, args.source).await?;

    let batch = batch_config(config, args.batch_size)?;
    let orchestrator = FusionOrchestrator::new(store, batch.max_size)?;

    let report = match args.key {
        Some(key) => orchestrator.fuse_with_key(&target, &source, &key).await?,
        None => orchestrator.fuse(&target, &source, &prompt).await?,
    };

    info!(
        %target,
        %source,
        stages = ?report.stages.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "fusion report"
    );
    println!(
        "{target} <- {source} on {}: {} source rows removed, {} columns added, {} keys matched, {} rows updated",
        report.key_column,
        report.source_rows_removed,
        report.added_columns.len(),
        report.matching_keys,
        report.rows_updated
    );

    Ok(())
}

pub async fn join(store: PgTableStore, args: JoinArgs) -> CliResult<()> {
    let union = TableUnion::new(store);
    let tables = union
        .tables_with_prefix(DEFAULT_SCHEMA, &args.prefix, &args.into)
        .await?;

    let rows = union.union_into(&args.into, &tables).await?;
    println!("{}: {rows} rows from {} tables", args.into, tables.len());

    Ok(())
}
