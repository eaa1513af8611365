//! bulk-load — full-replace load of monthly trip files into the warehouse.
//!
//! Acts as the run harness: builds the configuration once, runs the
//! pipeline, and on failure retries the whole run (never a single file)
//! after a delay. Each attempt starts from a truncate, so a retry cannot
//! duplicate rows.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use taxi_core::Config;

// ── CLI ─────────────────────────────────────────────────────────────

/// Load `<prefix>_<period>*.parquet` files into the warehouse table.
#[derive(Parser, Debug)]
#[command(name = "bulk-load", version, about)]
struct Cli {
    /// Directory holding the source files (overrides SOURCE_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Year or year-month to load, e.g. 2025 or 2025-03 (overrides SOURCE_PERIOD).
    #[arg(long)]
    period: Option<String>,

    /// File name prefix (overrides SOURCE_PREFIX).
    #[arg(long)]
    prefix: Option<String>,

    /// Destination table (overrides WAREHOUSE_TABLE).
    #[arg(long)]
    table: Option<String>,

    /// Whole-run retries after a failed attempt.
    #[arg(long, env = "BULK_LOAD_RETRIES", default_value_t = 1)]
    retries: u32,

    /// Delay between attempts in seconds.
    #[arg(long, env = "BULK_LOAD_RETRY_DELAY_SECS", default_value_t = 300)]
    retry_delay_secs: u64,

    /// Print the run report as JSON on success.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// First run plus retries.
    fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.source.data_dir = dir.clone();
        }
        if let Some(period) = &self.period {
            config.source.period = period.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.source.prefix = prefix.clone();
        }
        if let Some(table) = &self.table {
            config.warehouse.table = table.clone();
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    taxi_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.validate()?;
    config.log_summary();

    let attempts = cli.attempts();
    let mut attempt = 1;
    loop {
        match taxi_ingest::run_with_config(&config).await {
            Ok(report) => {
                info!(
                    files = report.file_count(),
                    rows = report.total_rows,
                    attempt,
                    "bulk load succeeded"
                );
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                warn!(
                    attempt,
                    of = attempts,
                    kind = e.kind(),
                    error = %e,
                    delay_secs = cli.retry_delay_secs,
                    "bulk load attempt failed, retrying whole run"
                );
                tokio::time::sleep(Duration::from_secs(cli.retry_delay_secs)).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempt, kind = e.kind(), error = %e, "bulk load failed");
                return Err(e.into());
            }
        }
    }
}
