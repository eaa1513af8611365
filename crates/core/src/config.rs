use std::env;
use std::path::PathBuf;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::CoreError;
use crate::schema;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Process-wide configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub warehouse: WarehouseConfig,
    pub source: SourceConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TAXI_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TAXI_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            warehouse: WarehouseConfig::from_env_profiled(p),
            source: SourceConfig::from_env_profiled(p),
            server: ServerConfig::from_env_profiled(p),
        }
    }

    /// Reject values that would produce broken SQL or a useless transfer.
    pub fn validate(&self) -> Result<(), CoreError> {
        schema::validate_table_name(&self.warehouse.table)?;
        self.warehouse.connect_options()?;
        if self.warehouse.copy_chunk_bytes == 0 {
            return Err(CoreError::InvalidConfig {
                key: "WAREHOUSE_COPY_CHUNK_BYTES".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.source.prefix.is_empty() || self.source.period.is_empty() {
            return Err(CoreError::InvalidConfig {
                key: "SOURCE_PREFIX/SOURCE_PERIOD".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  warehouse:   {}, table={}",
            self.warehouse.redacted_url(),
            self.warehouse.table
        );
        tracing::info!(
            "  source:      dir={}, pattern={}",
            self.source.data_dir.display(),
            self.source.glob()
        );
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
    }
}

// ── Warehouse (PostgreSQL) ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    /// Destination relation for trip rows.
    pub table: String,
    /// Size of each CopyData frame sent during bulk transfer.
    pub copy_chunk_bytes: usize,
}

impl WarehouseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "WAREHOUSE_PG_HOST", "warehouse-postgres"),
            port: profiled_env_u16(p, "WAREHOUSE_PG_PORT", 5432),
            database: profiled_env_or(p, "WAREHOUSE_PG_DB", "nyc_taxi"),
            username: profiled_env_or(p, "WAREHOUSE_PG_USER", "nyc_taxi"),
            password: profiled_env_or(p, "WAREHOUSE_PG_PASSWORD", "nyc_taxi"),
            ssl_mode: profiled_env_or(p, "WAREHOUSE_PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "WAREHOUSE_PG_MAX_CONNECTIONS", 5),
            table: profiled_env_or(p, "WAREHOUSE_TABLE", schema::DEFAULT_TABLE),
            copy_chunk_bytes: profiled_env_usize(p, "WAREHOUSE_COPY_CHUNK_BYTES", 1024 * 1024),
        }
    }

    /// Typed connection options. Credentials are passed as-is, never through
    /// a URL, so passwords containing `/`, `#`, `?` or `%` survive intact.
    pub fn connect_options(&self) -> Result<PgConnectOptions, CoreError> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).map_err(|e| CoreError::InvalidConfig {
            key: "WAREHOUSE_PG_SSL_MODE".into(),
            reason: e.to_string(),
        })?;
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(ssl_mode))
    }

    /// Connection URL with the password masked, for logs only.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}?sslmode={}",
            self.username, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

// ── Source files ──────────────────────────────────────────────

/// Where monthly trip files live and how their names are shaped:
/// `<prefix>_<period>[-<suffix>].<extension>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    pub prefix: String,
    /// Year (`2025`) or year-month (`2025-03`).
    pub period: String,
    pub extension: String,
}

impl SourceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "SOURCE_DATA_DIR", "/opt/airflow/data")),
            prefix: profiled_env_or(p, "SOURCE_PREFIX", "yellow_tripdata"),
            period: profiled_env_or(p, "SOURCE_PERIOD", "2025"),
            extension: profiled_env_or(p, "SOURCE_EXTENSION", "parquet"),
        }
    }

    /// Human-readable glob equivalent of the file pattern, for logs.
    pub fn glob(&self) -> String {
        format!("{}_{}*.{}", self.prefix, self.period, self.extension)
    }
}

// ── Read API server ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let origins = profiled_env_or(
            p,
            "SERVER_CORS_ORIGINS",
            "http://localhost:3000,http://localhost:5173",
        );
        Self {
            host: profiled_env_or(p, "SERVER_HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "SERVER_PORT", 8000),
            cors_origins: origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
