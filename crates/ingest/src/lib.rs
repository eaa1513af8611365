//! Bulk loader for monthly taxi trip Parquet files into the PostgreSQL
//! warehouse table.
//!
//! Every run is a full replace: the table is truncated, then each file of
//! the batch is streamed in with `COPY` in its own transaction.

pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod transfer;
pub mod transform;
pub mod warehouse;

use taxi_core::Config;
use tracing::info;

pub use error::LoadError;
pub use pipeline::{FileReport, Pipeline, RunReport, RunState};
pub use sink::{LayoutDrift, SinkTable};
pub use source::{enumerate, Batch, FilePattern};
pub use transfer::BulkTransfer;
pub use transform::{CopyBatch, EncodeError, Transformer};
pub use warehouse::{PgWarehouse, Warehouse};

/// Run one full load with an already-built configuration.
pub async fn run_with_config(config: &Config) -> Result<RunReport, LoadError> {
    let warehouse = PgWarehouse::new(&config.warehouse)?;
    let mut pipeline = Pipeline::new(warehouse, &config.source);
    let report = pipeline.run().await?;
    info!(
        run_id = %report.run_id,
        files = report.file_count(),
        rows = report.total_rows,
        table = %config.warehouse.table,
        "all files loaded"
    );
    Ok(report)
}

/// Zero-argument entry point for schedulers: configuration comes from the
/// process environment (and `.env`), read exactly once.
pub async fn bulk_load() -> anyhow::Result<RunReport> {
    taxi_core::config::load_dotenv();
    let config = Config::from_env();
    config.validate()?;
    config.log_summary();
    Ok(run_with_config(&config).await?)
}
