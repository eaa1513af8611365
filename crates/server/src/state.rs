use sqlx::PgPool;

/// Shared handler state: the warehouse pool and the table the loader fills.
pub struct AppState {
    pub pool: PgPool,
    /// Validated at startup; safe to splice into SQL.
    pub table: String,
}
