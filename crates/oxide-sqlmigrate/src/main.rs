//! oxide-sqlmigrate CLI
//!
//! Command-line tool for applying SQL file migrations.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::{NonEmptyStringValueParser, RangedU64ValueParser};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_sqlmigrate::prelude::*;

/// Versioned SQL file migrations with a database changelog.
#[derive(Parser)]
#[command(name = "oxide-sqlmigrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the folder containing the migrations.
    #[arg(short = 'p', long, global = true, default_value = "./migrations")]
    migrations_path: PathBuf,

    /// Name of the environment and its configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "MIGRATE_ENVIRONMENT",
        default_value = "development"
    )]
    environment: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations.
    Up(SelectionArgs),

    /// Revert migrations.
    Down(SelectionArgs),

    /// Show the status of all migrations.
    Status {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = StatusFormat::Table)]
        format: StatusFormat,
    },

    /// Apply the bootstrap script and all migrations to a fresh database.
    Bootstrap,

    /// Write an SQL file that seeds the database directly.
    CreateSeed {
        /// Path of the seed file.
        #[arg(short, long, default_value = "seed.sql")]
        target: PathBuf,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Number of migrations to process (1 if nothing is selected).
    #[arg(
        short,
        long,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
        conflicts_with_all = ["all", "only"]
    )]
    count: Option<usize>,

    /// Process all migrations.
    #[arg(short = 'A', long, conflicts_with = "only")]
    all: bool,

    /// Process the single migration whose filename contains this text.
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    only: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusFormat {
    Table,
    Json,
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
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::CreateSeed { target } = &cli.command {
        if target.exists() {
            return Err(MigrateError::SeedTargetExists(target.clone()).into());
        }
    }

    let config = Config::load(&cli.migrations_path, &cli.environment)?;
    let conn = PostgresConnection::open(config.db.connect_options());
    let executor = MigrationExecutor::from_config(conn, &config);

    let outcome = run(&executor, cli.command).await;
    executor.close().await;
    outcome
}

async fn run(
    executor: &MigrationExecutor<PostgresConnection>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Up(selection) => migrate(executor, Direction::Up, selection).await?,
        Commands::Down(selection) => migrate(executor, Direction::Down, selection).await?,

        Commands::Status { format } => {
            executor.wait_for_start(Duration::from_millis(100), 1).await?;
            executor.init().await?;

            let (rows, note) = executor.status().await?;
            match format {
                StatusFormat::Table => print!("{}", render_status_table(&rows, &note)),
                StatusFormat::Json => {
                    let report = serde_json::json!({ "migrations": rows, "note": note });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }

        Commands::Bootstrap => {
            executor.wait_for_start(Duration::from_secs(1), 10).await?;
            executor.init().await?;
            executor.bootstrap().await?;

            let files = executor.file_migrations()?;
            let applied = executor.applied_migrations().await?;
            let pending = files.len().saturating_sub(applied.len());

            let progress = ProgressBar::new(pending as u64);
            progress.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            progress.enable_steady_tick(Duration::from_millis(250));

            let result = executor
                .apply_all_up(&files, &applied, |migration| {
                    progress.set_message(migration.qualified_name());
                    progress.inc(1);
                })
                .await;
            progress.finish_and_clear();

            let count = result?;
            info!(count, "Bootstrap finished");
        }

        Commands::CreateSeed { target } => {
            let seed = executor.seed_sql()?;
            write_seed_file(&target, &seed)?;
            info!(path = %target.display(), "Seed file written");
        }
    }

    Ok(())
}

async fn migrate(
    executor: &MigrationExecutor<PostgresConnection>,
    direction: Direction,
    selection: SelectionArgs,
) -> anyhow::Result<()> {
    executor.wait_for_start(Duration::from_millis(100), 1).await?;
    executor.init().await?;

    let files = executor.file_migrations()?;
    let applied = executor.applied_migrations().await?;

    if let Some(filter) = selection.only {
        executor
            .apply_specific(&filter, direction, &files, &applied)
            .await?;
    } else {
        let processed = executor
            .apply_with_count(
                selection.count.unwrap_or(1),
                selection.all,
                direction,
                &files,
                &applied,
            )
            .await?;
        info!(count = processed.len(), %direction, "Migrations processed");
    }
    Ok(())
}
