use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use taxi_core::config::WarehouseConfig;

use crate::error::LoadError;
use crate::sink::{LayoutDrift, SinkTable};
use crate::transfer::BulkTransfer;
use crate::transform::CopyBatch;

/// Destination of a load run: table lifecycle plus bulk transfer.
///
/// The pipeline only talks to the sink through this trait.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Establish (or verify) connectivity. Failure means nothing was written.
    async fn connect(&self) -> Result<(), LoadError> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), LoadError>;

    /// Differences between the live table and the canonical layout.
    async fn detect_drift(&self) -> Result<Vec<LayoutDrift>, LoadError> {
        Ok(Vec::new())
    }

    async fn reset_contents(&self) -> Result<(), LoadError>;

    /// Load one file's rows in a single transaction; returns rows committed.
    async fn transfer(&self, batch: &CopyBatch) -> Result<u64, LoadError>;
}

/// PostgreSQL warehouse backed by a sqlx pool.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
    sink: SinkTable,
    transfer: BulkTransfer,
}

impl PgWarehouse {
    /// Build the pool without opening a connection; [`Warehouse::connect`]
    /// does the first round trip.
    pub fn new(config: &WarehouseConfig) -> Result<Self, LoadError> {
        let options = config
            .connect_options()
            .map_err(|e| LoadError::Connection(sqlx::Error::Configuration(Box::new(e))))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);
        Ok(Self::from_pool(pool, config))
    }

    pub fn from_pool(pool: PgPool, config: &WarehouseConfig) -> Self {
        Self {
            sink: SinkTable::new(pool.clone(), &config.table),
            transfer: BulkTransfer::new(pool.clone(), &config.table, config.copy_chunk_bytes),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn sink(&self) -> &SinkTable {
        &self.sink
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn connect(&self) -> Result<(), LoadError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(LoadError::Connection)?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), LoadError> {
        self.sink.ensure_schema().await
    }

    async fn detect_drift(&self) -> Result<Vec<LayoutDrift>, LoadError> {
        self.sink.detect_drift().await
    }

    async fn reset_contents(&self) -> Result<(), LoadError> {
        self.sink.reset_contents().await
    }

    async fn transfer(&self, batch: &CopyBatch) -> Result<u64, LoadError> {
        self.transfer.transfer(batch).await
    }
}
