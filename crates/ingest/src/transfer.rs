//! Streaming bulk load over the PostgreSQL `COPY FROM STDIN` protocol.

use sqlx::PgPool;
use taxi_core::schema;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::transform::CopyBatch;

/// Sends one [`CopyBatch`] per transaction into the sink table.
#[derive(Debug, Clone)]
pub struct BulkTransfer {
    pool: PgPool,
    copy_sql: String,
    chunk_bytes: usize,
}

impl BulkTransfer {
    pub fn new(pool: PgPool, table: &str, chunk_bytes: usize) -> Self {
        Self {
            pool,
            copy_sql: schema::copy_in_sql(table),
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Copy `batch` inside its own transaction and commit.
    ///
    /// On any error the transaction is rolled back and nothing from this
    /// batch is visible. The server's row count must equal `batch.rows`.
    pub async fn transfer(&self, batch: &CopyBatch) -> Result<u64, LoadError> {
        let fail = |e: sqlx::Error| LoadError::transfer(&batch.source, e);

        let mut tx = self.pool.begin().await.map_err(fail)?;
        let copied = {
            let mut copy = tx.copy_in_raw(&self.copy_sql).await.map_err(fail)?;
            for chunk in batch.payload.chunks(self.chunk_bytes) {
                let sent = copy.send(chunk).await.map(|_| ());
                if let Err(e) = sent {
                    if let Err(abort_err) = copy.abort("client send failed").await {
                        debug!(error = %abort_err, "COPY abort after send failure");
                    }
                    return Err(fail(e));
                }
            }
            copy.finish().await.map_err(fail)?
        };

        if copied != batch.rows {
            warn!(
                file = %batch.source.display(),
                expected = batch.rows,
                copied,
                "row count mismatch, rolling back"
            );
            if let Err(e) = tx.rollback().await {
                debug!(error = %e, "rollback after row count mismatch");
            }
            return Err(fail(sqlx::Error::Protocol(format!(
                "COPY reported {} rows, expected {}",
                copied, batch.rows
            ))));
        }

        tx.commit().await.map_err(fail)?;
        Ok(copied)
    }
}
