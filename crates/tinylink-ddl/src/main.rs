//! tinylink-ddl CLI
//!
//! Command-line tool that converges a PostgreSQL database to the TinyLink
//! schema (or a schema read from a JSON file).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use tinylink_ddl::prelude::*;
use tinylink_ddl::tinylink;

/// Idempotent schema reconciliation for PostgreSQL.
#[derive(Parser)]
#[command(name = "tinylink-ddl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PostgreSQL connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of pooled connections.
    #[arg(long, default_value_t = 20)]
    max_connections: u32,

    /// Seconds to wait for a connection before giving up.
    #[arg(long, default_value_t = 5)]
    acquire_timeout_secs: u64,

    /// Namespace (PostgreSQL schema) to introspect.
    #[arg(short, long, default_value = "public")]
    namespace: String,

    /// JSON schema file to use instead of the built-in TinyLink tables.
    #[arg(short, long)]
    schema_file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Exit with an error if any step failed.
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables, columns, constraints and indexes.
    Init,

    /// Drop and recreate foreign-key and unique constraints, then reconcile.
    FixConstraints,

    /// Show the statements a run would execute without executing them.
    Plan {
        /// Plan a fix-constraints run.
        #[arg(long)]
        fix_constraints: bool,
    },

    /// Print the declared schema as JSON.
    DumpSchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let schema = match &cli.schema_file {
        Some(path) => Schema::from_json_file(path)?,
        None => tinylink::schema()?,
    };
    info!(tables = schema.len(), "Loaded schema");

    let options = match cli.command {
        Commands::DumpSchema => {
            println!("{}", schema.to_json()?);
            return Ok(());
        }
        Commands::Init => ReconcileOptions::new(),
        Commands::FixConstraints => ReconcileOptions::new().fix_constraints(true),
        Commands::Plan { fix_constraints } => ReconcileOptions::new()
            .fix_constraints(fix_constraints)
            .dry_run(true),
    };

    let database_url = cli
        .database_url
        .as_deref()
        .context("No database URL given (use --database-url or DATABASE_URL)")?;

    // Connect to database
    let settings = PoolSettings {
        max_connections: cli.max_connections,
        acquire_timeout: Duration::from_secs(cli.acquire_timeout_secs),
        ..PoolSettings::default()
    };
    let pool = settings.connect(database_url).await?;
    let source = PgSource::new(pool).namespace(&cli.namespace);

    let result = Engine::new(&source, &schema).options(options).run().await;
    source.pool().close().await;
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let summary = report.summary;
    if cli.strict && summary.has_failures() {
        anyhow::bail!(
            "{} step(s) failed and {} table pass(es) were aborted",
            summary.failed,
            summary.aborted_tables
        );
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    if report.options.dry_run {
        for sql in report.statements() {
            println!("{sql};");
        }
    }

    println!("\nTables:");
    println!("{:-<60}", "");
    for table in &report.tables {
        let mark = if table.aborted.is_some() || table.count(Outcome::Failed) > 0 {
            '!'
        } else {
            'X'
        };
        println!(
            " [{mark}] {} (applied {}, planned {}, skipped {}, warned {}, failed {})",
            table.table,
            table.count(Outcome::Applied),
            table.count(Outcome::Planned),
            table.count(Outcome::Skipped),
            table.count(Outcome::Warned),
            table.count(Outcome::Failed),
        );
        for step in table.steps_with(Outcome::Warned) {
            println!(
                "       warning {}: {}",
                step.subject,
                step.message.as_deref().unwrap_or_default()
            );
        }
        for step in table.steps_with(Outcome::Failed) {
            println!(
                "       failed {}: {}",
                step.subject,
                step.message.as_deref().unwrap_or_default()
            );
        }
        if let Some(aborted) = &table.aborted {
            println!("       aborted in {}: {}", aborted.stage, aborted.message);
        }
    }
    println!();
}
