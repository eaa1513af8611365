use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use taxi_core::config::WarehouseConfig;
use taxi_core::CoreError;
use tracing::info;

/// Build the warehouse pool without connecting. Handlers surface
/// connectivity problems as 500s, so the API starts even when the
/// warehouse is still coming up.
pub fn init_pg_pool(config: &WarehouseConfig) -> Result<PgPool, CoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy_with(config.connect_options()?);
    info!(url = %config.redacted_url(), "PostgreSQL pool ready");
    Ok(pool)
}
