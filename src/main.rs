//! Kline loader - pushes validated kline archives into SQLite
//!
//! # Usage
//! ```sh
//! kline-loader data/valid --max-jobs 4 --env .env
//! ```
//!
//! # Environment Variables
//! - `DATABASE_URL` - SQLite URL (default: sqlite://data/klines.db)
//! - `KLINE_MAX_JOBS` - Planning units per batch (default: 4)
//! - `KLINE_RESET_SCHEMA` - Drop and recreate tables before loading (default: true)
//! - `KLINE_CONFLICT_POLICY` - `reject` or `skip` duplicate keys (default: reject)

use anyhow::{Context, Result};
use clap::Parser;
use kline_loader::application::{KlineLoader, RunOptions};
use kline_loader::config::LoaderConfig;
use kline_loader::domain::repositories::ConflictPolicy;
use kline_loader::infrastructure::{Database, SqliteKlineRepository, SqlitePairRepository};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Historical kline archive loader", long_about = None)]
struct Cli {
    /// Directory holding checksum-validated kline archives
    dirpath: PathBuf,

    /// Planning units per batch (overrides KLINE_MAX_JOBS)
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Env file read before configuration is loaded
    #[arg(long, default_value = ".env")]
    env: PathBuf,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Keep existing tables instead of dropping them first
    #[arg(long)]
    keep_tables: bool,

    /// Duplicate key handling: reject or skip
    #[arg(long)]
    on_conflict: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env file is optional
    let env_loaded = dotenvy::from_path(&cli.env).is_ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(Level::INFO.to_string())),
        )
        .with(stdout_layer)
        .init();

    info!("Kline loader {} starting...", env!("CARGO_PKG_VERSION"));
    if !env_loaded {
        info!("No env file at {}, using process environment", cli.env.display());
    }

    let mut config = LoaderConfig::from_env().context("Failed to load configuration")?;
    if let Some(max_jobs) = cli.max_jobs {
        anyhow::ensure!(max_jobs > 0, "--max-jobs must be at least 1");
        config.max_jobs = max_jobs;
    }
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if cli.keep_tables {
        config.reset_schema = false;
    }
    if let Some(policy) = cli.on_conflict.as_deref() {
        config.conflict_policy = ConflictPolicy::from_str(policy)?;
    }
    info!(
        "Configuration loaded: source={}, max_jobs={}, reset_schema={}, on_conflict={}",
        cli.dirpath.display(),
        config.max_jobs,
        config.reset_schema,
        config.conflict_policy
    );

    let database = Database::new(&config.database_url).await?;
    if config.reset_schema {
        database.reset().await.context("Failed to reset schema")?;
    }

    let options = RunOptions {
        source_dir: cli.dirpath,
        max_batch_size: config.max_jobs,
        conflict_policy: config.conflict_policy,
    };
    let loader = KlineLoader::new(
        Arc::new(SqlitePairRepository::new(database.clone())),
        Arc::new(SqliteKlineRepository::new(database.clone())),
        options,
    );

    // Ctrl-C drops the in-flight batch; its transaction never commits
    let outcome = tokio::select! {
        result = loader.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    database.close().await;

    let Some(result) = outcome else {
        warn!("Interrupted. Committed batches are kept, the in-flight batch was discarded.");
        anyhow::bail!("interrupted");
    };

    let summary = result.context("Kline load aborted")?;
    summary.log();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    info!("{} failures", summary.failure_count());

    Ok(())
}
