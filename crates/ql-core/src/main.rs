//! `quantlab` command-line entry point.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use ql_common::{Error, Result, SCHEMA_VERSION};
use ql_config::{json_schema, resolve_api_key, resolve_config, validate, ConfigSnapshot, ResolvedConfig};
use ql_core::exit_codes::ExitCode;
use ql_core::logging::{self, LogFormat, LogOptions};
use ql_core::{
    aggregate, load_domain_table, quality, triage, DomainQuery, IngestOptions, Orchestrator, Pacer,
    RestTransport, StaticConstituents, TableSelector,
};
use ql_store::{to_record_batch, DomainLayout, PartitionWriter, RawLayout};

#[derive(Parser, Debug)]
#[command(name = "quantlab", version, about = "Market and fundamentals data pipeline")]
struct Cli {
    /// Path to the configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for raw and final data
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Also append JSON log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every configured endpoint into raw partitions
    Ingest(IngestArgs),
    /// Rebuild domain tables from raw partitions
    Aggregate,
    /// Run invariant checks over domain tables
    Quality {
        /// Table name, or "all"
        #[arg(long, default_value = "all")]
        table: String,
        /// Columns listed in the missing-value detail
        #[arg(long)]
        top: Option<usize>,
    },
    /// Print rows of a domain table
    Show(ShowArgs),
    /// Find, replay and purge stored provider error payloads
    Failures {
        #[command(subcommand)]
        command: FailureCommands,
    },
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Comma-separated ticker universe; overrides ingest.tickers
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,
    /// Window start (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Window end (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Seconds to wait between provider calls
    #[arg(long)]
    pause: Option<f64>,
    /// Refetch partitions that already hold data
    #[arg(long)]
    no_resume: bool,
    /// Also fetch factor series
    #[arg(long)]
    fetch_factors: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Domain table name
    table: String,
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Maximum rows printed
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Subcommand, Debug)]
enum FailureCommands {
    /// Write the failure worklist CSV
    Export {
        /// Worklist path (default: <final>/failures_all.csv)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Scan a domain table (or "all") instead of the raw tree
        #[arg(long)]
        table: Option<String>,
    },
    /// Re-fetch every worklist entry and replace its partitions
    Replay {
        /// Worklist path (default: <final>/failures_all.csv)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Delete failure rows from domain tables
    Purge {
        #[arg(long, default_value = "all")]
        table: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration and its fingerprint
    Show,
    /// Print the configuration JSON schema
    Schema,
}

fn main() {
    let cli = Cli::parse();
    let log_options = LogOptions {
        format: cli.log_format,
        verbosity: cli.verbose,
        file: cli.log_file.clone(),
    };
    if let Err(e) = logging::init(&log_options) {
        eprintln!("quantlab: {}", e);
        std::process::exit(ExitCode::from_error(&e).as_i32());
    }

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!(code = e.code(), error = %e, "command failed");
            eprintln!("quantlab: {}", e);
            ExitCode::from_error(&e)
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if let Commands::Config {
        command: ConfigCommands::Schema,
    } = &cli.command
    {
        emit_json(&json_schema())?;
        return Ok(ExitCode::Clean);
    }

    let resolved = resolve_config(cli.config.as_deref(), cli.data_root.as_deref())?;
    let ctx = Context {
        format: cli.format,
        raw: RawLayout::new(&resolved.paths.raw_dir),
        domain: DomainLayout::new(&resolved.paths.final_dir),
        resolved,
    };
    info!(
        raw = %ctx.raw.root().display(),
        final_dir = %ctx.domain.root().display(),
        "resolved data directories"
    );

    match &cli.command {
        Commands::Ingest(args) => run_ingest(&ctx, args),
        Commands::Aggregate => run_aggregate(&ctx),
        Commands::Quality { table, top } => run_quality(&ctx, table, *top),
        Commands::Show(args) => run_show(&ctx, args),
        Commands::Failures { command } => match command {
            FailureCommands::Export { output, table } => {
                run_failures_export(&ctx, output.as_deref(), table.as_deref())
            }
            FailureCommands::Replay { input } => run_failures_replay(&ctx, input.as_deref()),
            FailureCommands::Purge { table } => run_failures_purge(&ctx, table),
        },
        Commands::Config { .. } => run_config_show(&ctx),
    }
}

struct Context {
    format: OutputFormat,
    resolved: ResolvedConfig,
    raw: RawLayout,
    domain: DomainLayout,
}

impl Context {
    fn emit<T: Serialize>(&self, command: &str, body: &T, human: impl FnOnce()) -> Result<()> {
        match self.format {
            OutputFormat::Json => emit_json(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": Utc::now().to_rfc3339(),
                "command": command,
                "result": body,
            })),
            OutputFormat::Human => {
                human();
                Ok(())
            }
        }
    }

    fn pacer(&self) -> Pacer {
        Pacer::from_secs_f64(self.resolved.config.ingest.pause_secs)
    }
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_ingest(ctx: &Context, args: &IngestArgs) -> Result<ExitCode> {
    let mut config = ctx.resolved.config.clone();
    if args.start.is_some() {
        config.window.start = args.start;
    }
    if args.end.is_some() {
        config.window.end = args.end;
    }
    if let Some(pause) = args.pause {
        config.ingest.pause_secs = pause;
    }
    if args.no_resume {
        config.ingest.resume = false;
    }
    if args.fetch_factors {
        config.ingest.fetch_factors = true;
    }
    if args.tickers.is_some() {
        config.ingest.tickers = args.tickers.clone();
    }
    validate(&config)?;
    let options = IngestOptions::from_config(&config)?;

    let Some(tickers) = config.ingest.tickers.clone() else {
        return Err(Error::Constituents(
            "no constituent source configured; pass --tickers or set ingest.tickers".to_string(),
        ));
    };
    let source = StaticConstituents::new(tickers);

    let api_key = resolve_api_key(&config.provider)?;
    let transport = RestTransport::new(&config.provider, api_key);
    let snapshot = ConfigSnapshot::capture(&ctx.resolved);
    info!(fingerprint = %snapshot.fingerprint, start = %options.start, end = %options.end, "starting ingestion");

    let mut orchestrator = Orchestrator::new(
        &transport,
        PartitionWriter::new(ctx.raw.clone()),
        ctx.domain.clone(),
        Pacer::from_secs_f64(config.ingest.pause_secs),
        options,
    );
    let universe = orchestrator.prepare_universe(&source)?;
    let report = orchestrator.run(&universe);

    ctx.emit("ingest", &report, || {
        let s = &report.summary;
        println!("# Ingestion {}", report.run_id);
        println!();
        println!("  Tickers:  {}", report.tickers);
        println!("  Units:    {}", s.units);
        println!("  Written:  {}", s.written);
        println!("  Skipped:  {}", s.skipped);
        println!("  Locked:   {}", s.locked);
        println!("  Failed:   {}", s.failed);
    })?;
    Ok(if report.summary.failed > 0 {
        ExitCode::PartialFail
    } else {
        ExitCode::Clean
    })
}

fn run_aggregate(ctx: &Context) -> Result<ExitCode> {
    let report = aggregate(&ctx.raw, &ctx.domain)?;
    ctx.emit("aggregate", &report, || {
        if report.tables.is_empty() {
            println!("No raw partitions with data; nothing written.");
        }
        for table in &report.tables {
            println!(
                "  {:<32} {:>9} rows from {} partitions",
                table.name, table.rows, table.partitions
            );
        }
        for skipped in &report.skipped {
            println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
        }
    })?;
    Ok(ExitCode::Clean)
}

fn run_quality(ctx: &Context, table: &str, top: Option<usize>) -> Result<ExitCode> {
    let top = top.unwrap_or(ctx.resolved.config.quality.top_missing);
    let reports = quality::run_quality_checks(&ctx.domain, &TableSelector::parse(table), top)?;
    ctx.emit("quality", &reports, || {
        if reports.is_empty() {
            println!("No domain tables found under {}", ctx.domain.root().display());
        }
        for (name, report) in &reports {
            println!("# {} ({} rows)", name, report.rows);
            if !report.has_issues() {
                println!("  no issues");
            }
            for line in report
                .missing
                .iter()
                .chain(&report.missing_detail)
                .chain(&report.consistency)
                .chain(&report.bounds)
            {
                println!("  {}", line);
            }
        }
    })?;
    Ok(ExitCode::Clean)
}

fn run_show(ctx: &Context, args: &ShowArgs) -> Result<ExitCode> {
    let query = DomainQuery {
        tickers: args.tickers.clone(),
        start: args.start,
        end: args.end,
    };
    let rows = load_domain_table(&ctx.domain, &args.table, &query)?;
    if ctx.format == OutputFormat::Json {
        let shown: Vec<_> = rows.rows().iter().take(args.limit).collect();
        emit_json(&shown)?;
        return Ok(ExitCode::Clean);
    }
    if rows.is_empty() {
        println!("{}: no rows", args.table);
        return Ok(ExitCode::Clean);
    }
    let batch = to_record_batch(&rows).map_err(|e| Error::Storage(e.to_string()))?;
    let shown = batch.slice(0, args.limit.min(batch.num_rows()));
    let table = arrow::util::pretty::pretty_format_batches(&[shown])
        .map_err(|e| Error::Storage(e.to_string()))?;
    println!("{}", table);
    println!("{} of {} rows", args.limit.min(rows.len()), rows.len());
    Ok(ExitCode::Clean)
}

fn run_failures_export(ctx: &Context, output: Option<&Path>, table: Option<&str>) -> Result<ExitCode> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.domain.default_worklist_path());
    let records = match table {
        None => triage::scan_raw_tree(&ctx.raw)?,
        Some(selector) => {
            let mut records = Vec::new();
            for name in TableSelector::parse(selector).resolve(&ctx.domain)? {
                let rows = load_domain_table(&ctx.domain, &name, &DomainQuery::default())?;
                records.extend(triage::scan_table(&name, &rows));
            }
            records
        }
    };
    triage::write_worklist(&path, &records)?;
    ctx.emit("failures export", &records, || {
        println!("{} failures written to {}", records.len(), path.display());
    })?;
    Ok(ExitCode::Clean)
}

fn run_failures_replay(ctx: &Context, input: Option<&Path>) -> Result<ExitCode> {
    let path = input
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.domain.default_worklist_path());
    let records = triage::read_worklist(&path)?;
    if records.is_empty() {
        info!(path = %path.display(), "worklist is empty; nothing to replay");
        return Ok(ExitCode::Clean);
    }
    let provider = &ctx.resolved.config.provider;
    let transport = RestTransport::new(provider, resolve_api_key(provider)?);
    let writer = PartitionWriter::new(ctx.raw.clone());
    let mut pacer = ctx.pacer();
    let report = triage::replay(&records, &transport, &writer, &mut pacer, &provider.output_size);
    ctx.emit("failures replay", &report, || {
        println!(
            "Replayed {}: {} replaced, {} failed, {} stale partitions removed",
            report.attempted, report.replaced, report.failed, report.stale_removed
        );
    })?;
    Ok(if report.failed > 0 {
        ExitCode::PartialFail
    } else {
        ExitCode::Clean
    })
}

fn run_failures_purge(ctx: &Context, table: &str) -> Result<ExitCode> {
    let removed = triage::purge_domain_tables(&ctx.domain, &TableSelector::parse(table))?;
    ctx.emit("failures purge", &removed, || {
        if removed.is_empty() {
            println!("No invalid-api-call rows found.");
        }
        for (name, n) in &removed {
            println!("  {}: removed {} rows", name, n);
        }
    })?;
    Ok(ExitCode::Clean)
}

fn run_config_show(ctx: &Context) -> Result<ExitCode> {
    let snapshot = ConfigSnapshot::capture(&ctx.resolved);
    let body = serde_json::json!({
        "snapshot": snapshot,
        "config": ctx.resolved.config,
    });
    match ctx.format {
        OutputFormat::Json => emit_json(&body)?,
        OutputFormat::Human => {
            println!("# Configuration");
            println!();
            println!(
                "  Source:      {}",
                snapshot.source.as_deref().unwrap_or("built-in defaults")
            );
            println!("  Fingerprint: {}", snapshot.fingerprint);
            println!("  Raw dir:     {}", snapshot.raw_dir);
            println!("  Final dir:   {}", snapshot.final_dir);
            println!();
            println!("{}", serde_json::to_string_pretty(&ctx.resolved.config)?);
        }
    }
    Ok(ExitCode::Clean)
}
