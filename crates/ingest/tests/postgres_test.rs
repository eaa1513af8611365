//! Tests against a live PostgreSQL warehouse.
//!
//! All tests are `#[ignore]`; run them explicitly with the `WAREHOUSE_PG_*`
//! variables pointing at a scratch database:
//!
//! ```text
//! cargo test -p taxi-ingest --test postgres_test -- --ignored --test-threads=1
//! ```

mod common;

use std::path::PathBuf;

use common::{trips, write_trip_file, Trip};
use sqlx::Row;
use taxi_core::Config;
use taxi_ingest::{BulkTransfer, CopyBatch, FilePattern, LoadError, PgWarehouse, Pipeline, Warehouse};
use tempfile::TempDir;

const TEST_TABLE: &str = "raw_nyc_taxi_trips_it";

fn warehouse() -> PgWarehouse {
    taxi_core::config::load_dotenv();
    let mut config = Config::from_env();
    config.warehouse.table = TEST_TABLE.to_string();
    PgWarehouse::new(&config.warehouse).unwrap()
}

async fn count(w: &PgWarehouse) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", TEST_TABLE))
        .fetch_one(w.pool())
        .await
        .unwrap()
        .get("n")
}

#[tokio::test]
#[ignore]
async fn ensure_schema_is_idempotent_and_matches_layout() {
    let w = warehouse();
    w.connect().await.unwrap();
    w.ensure_schema().await.unwrap();
    w.ensure_schema().await.unwrap();

    let drift = w.detect_drift().await.unwrap();
    assert!(drift.is_empty(), "unexpected drift: {:?}", drift);
    assert_eq!(w.sink().existing_columns().await.unwrap().len(), 20);
}

#[tokio::test]
#[ignore]
async fn full_run_loads_and_replaces() {
    let dir = TempDir::new().unwrap();
    write_trip_file(
        &dir.path().join("yellow_tripdata_2025-01.parquet"),
        &[
            Trip::new(1.0, 1.0),
            Trip { passenger_count: None, ..Trip::new(2.0, 0.0) },
            Trip::new(2.0, 3.0),
        ],
        None,
    );
    write_trip_file(&dir.path().join("yellow_tripdata_2025-02.parquet"), &trips(5), None);

    let pattern = FilePattern::new("yellow_tripdata", "2025", "parquet");
    let mut p = Pipeline::with_pattern(warehouse(), dir.path(), pattern);

    let first = p.run().await.unwrap();
    assert_eq!(first.total_rows, 8);
    assert_eq!(count(p.warehouse()).await, 8);

    let second = p.run().await.unwrap();
    assert_eq!(second.total_rows, 8);
    assert_eq!(count(p.warehouse()).await, 8);

    let nulls: i64 = sqlx::query(&format!(
        "SELECT COUNT(*) AS n FROM {} WHERE passenger_count IS NULL",
        TEST_TABLE
    ))
    .fetch_one(p.warehouse().pool())
    .await
    .unwrap()
    .get("n");
    assert_eq!(nulls, 1);

    let vendor: Option<i32> = sqlx::query(&format!(
        "SELECT vendorid FROM {} ORDER BY tpep_pickup_datetime, vendorid LIMIT 1",
        TEST_TABLE
    ))
    .fetch_one(p.warehouse().pool())
    .await
    .unwrap()
    .get("vendorid");
    assert_eq!(vendor, Some(1));
}

/// One sink-ordered CSV line with the given vendor id field.
fn row(vendor: &str, minute: u32) -> String {
    format!(
        "{},2025-01-01 00:{:02}:00,2025-01-01 00:{:02}:30,1,1.5,1,N,161,161,1,\
         10,0,0.5,2,0,1,14,2.5,0,0\n",
        vendor, minute, minute
    )
}

fn copy_batch(lines: &[String]) -> CopyBatch {
    CopyBatch {
        source: PathBuf::from("yellow_tripdata_2025-01.parquet"),
        rows: lines.len() as u64,
        payload: lines.concat().into_bytes(),
    }
}

#[tokio::test]
#[ignore]
async fn rejected_row_commits_nothing_from_the_file() {
    let w = warehouse();
    w.ensure_schema().await.unwrap();
    w.reset_contents().await.unwrap();

    let batch = copy_batch(&[row("1", 0), row("abc", 1), row("2", 2)]);
    let err = w.transfer(&batch).await.unwrap_err();

    assert!(matches!(err, LoadError::Transfer { .. }), "got {:?}", err);
    assert_eq!(count(&w).await, 0);
}

#[tokio::test]
#[ignore]
async fn small_chunks_split_rows_without_losing_any() {
    let w = warehouse();
    w.ensure_schema().await.unwrap();
    w.reset_contents().await.unwrap();

    let lines: Vec<String> = (0..25).map(|i| row("2", i)).collect();
    let transfer = BulkTransfer::new(w.pool().clone(), TEST_TABLE, 7);
    let copied = transfer.transfer(&copy_batch(&lines)).await.unwrap();

    assert_eq!(copied, 25);
    assert_eq!(count(&w).await, 25);
}

#[tokio::test]
#[ignore]
async fn row_count_mismatch_rolls_back() {
    let w = warehouse();
    w.ensure_schema().await.unwrap();
    w.reset_contents().await.unwrap();

    let mut batch = copy_batch(&[row("1", 0)]);
    batch.rows = 2;

    let err = w.transfer(&batch).await.unwrap_err();
    assert!(matches!(err, LoadError::Transfer { .. }));
    assert_eq!(count(&w).await, 0);
}
