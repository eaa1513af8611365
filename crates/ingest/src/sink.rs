//! Sink table lifecycle: create-if-absent, truncate, and layout drift checks.
//!
//! The table is never altered. A pre-existing table whose layout diverges
//! from [`TRIP_COLUMNS`] is reported, not corrected.

use sqlx::PgPool;
use taxi_core::schema::{self, ColumnSpec, TRIP_COLUMNS};
use tracing::info;

use crate::error::LoadError;

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExistingColumn {
    pub name: String,
    pub data_type: String,
}

/// One way the live table differs from the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutDrift {
    Missing { column: String },
    Unexpected { column: String },
    Misplaced { column: String, expected: usize, actual: usize },
    TypeMismatch { column: String, expected: String, actual: String },
}

impl std::fmt::Display for LayoutDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { column } => write!(f, "column {} is missing", column),
            Self::Unexpected { column } => write!(f, "column {} is not in the schema", column),
            Self::Misplaced { column, expected, actual } => write!(
                f, "column {} is at position {} (expected {})", column, actual, expected
            ),
            Self::TypeMismatch { column, expected, actual } => write!(
                f, "column {} has type {} (expected {})", column, actual, expected
            ),
        }
    }
}

/// Compare a live column list against the canonical one.
///
/// Positions are compared among the columns both sides share, so a missing
/// column does not also flag every column after it as misplaced.
pub fn compare_layout(expected: &[ColumnSpec], actual: &[ExistingColumn]) -> Vec<LayoutDrift> {
    let mut drift = Vec::new();

    for spec in expected {
        match actual.iter().find(|c| c.name == spec.sink) {
            None => drift.push(LayoutDrift::Missing { column: spec.sink.to_string() }),
            Some(col) if col.data_type != spec.sql_type.information_schema_name() => {
                drift.push(LayoutDrift::TypeMismatch {
                    column: spec.sink.to_string(),
                    expected: spec.sql_type.information_schema_name().to_string(),
                    actual: col.data_type.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for col in actual {
        if !expected.iter().any(|s| s.sink == col.name) {
            drift.push(LayoutDrift::Unexpected { column: col.name.clone() });
        }
    }

    let shared_expected: Vec<&str> = expected
        .iter()
        .map(|s| s.sink)
        .filter(|name| actual.iter().any(|c| c.name == *name))
        .collect();
    let shared_actual: Vec<&str> = actual
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| expected.iter().any(|s| s.sink == *name))
        .collect();
    for (pos, name) in shared_actual.iter().enumerate() {
        if shared_expected.get(pos) != Some(name) {
            let expected_pos = shared_expected.iter().position(|n| n == name).unwrap_or(pos);
            drift.push(LayoutDrift::Misplaced {
                column: name.to_string(),
                expected: expected_pos,
                actual: pos,
            });
        }
    }

    drift
}

/// Owner of the destination table's DDL and reset step.
#[derive(Debug, Clone)]
pub struct SinkTable {
    pool: PgPool,
    table: String,
}

impl SinkTable {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `CREATE TABLE IF NOT EXISTS` with the canonical layout.
    pub async fn ensure_schema(&self) -> Result<(), LoadError> {
        sqlx::query(&schema::create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|source| LoadError::Sink { operation: "create", source })?;
        info!(table = %self.table, "sink table ensured");
        Ok(())
    }

    /// Remove every row. Run once per load, before the first file.
    pub async fn reset_contents(&self) -> Result<(), LoadError> {
        sqlx::query(&format!("TRUNCATE TABLE {}", self.table))
            .execute(&self.pool)
            .await
            .map_err(|source| LoadError::Sink { operation: "truncate", source })?;
        info!(table = %self.table, "sink table truncated");
        Ok(())
    }

    /// Columns of the live table in ordinal order.
    pub async fn existing_columns(&self) -> Result<Vec<ExistingColumn>, LoadError> {
        sqlx::query_as::<_, ExistingColumn>(
            "SELECT column_name::text AS name, data_type::text AS data_type
             FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1
             ORDER BY ordinal_position",
        )
        .bind(&self.table)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| LoadError::Sink { operation: "describe", source })
    }

    pub async fn detect_drift(&self) -> Result<Vec<LayoutDrift>, LoadError> {
        let actual = self.existing_columns().await?;
        Ok(compare_layout(TRIP_COLUMNS, &actual))
    }
}
