//! Shared fixtures: canonical trip Parquet files and an in-memory warehouse.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use taxi_core::schema::TRIP_COLUMNS;
use taxi_ingest::{CopyBatch, LoadError, Warehouse};

/// 2025-01-01 00:00:00 UTC in microseconds.
pub const JAN_1_2025_US: i64 = 1_735_689_600_000_000;

/// The handful of fields tests care about; everything else gets a fixed value.
#[derive(Debug, Clone)]
pub struct Trip {
    pub vendor_id: Option<f64>,
    pub passenger_count: Option<f64>,
    pub pickup_offset_secs: i64,
    pub total_amount: f64,
    pub flag: Option<&'static str>,
}

impl Trip {
    pub fn new(vendor_id: f64, passenger_count: f64) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            passenger_count: Some(passenger_count),
            pickup_offset_secs: 0,
            total_amount: 10.5,
            flag: Some("N"),
        }
    }
}

/// `n` distinct ordinary trips.
pub fn trips(n: usize) -> Vec<Trip> {
    (0..n)
        .map(|i| Trip {
            pickup_offset_secs: i as i64 * 60,
            total_amount: 5.0 + i as f64,
            ..Trip::new(2.0, 1.0)
        })
        .collect()
}

fn column(name: &str, trips: &[Trip]) -> ArrayRef {
    let n = trips.len();
    match name {
        "VendorID" => Arc::new(Float64Array::from(trips.iter().map(|t| t.vendor_id).collect::<Vec<_>>())),
        "passenger_count" => {
            Arc::new(Float64Array::from(trips.iter().map(|t| t.passenger_count).collect::<Vec<_>>()))
        }
        "tpep_pickup_datetime" => Arc::new(TimestampMicrosecondArray::from(
            trips
                .iter()
                .map(|t| JAN_1_2025_US + t.pickup_offset_secs * 1_000_000)
                .collect::<Vec<_>>(),
        )),
        "tpep_dropoff_datetime" => Arc::new(TimestampMicrosecondArray::from(
            trips
                .iter()
                .map(|t| JAN_1_2025_US + (t.pickup_offset_secs + 600) * 1_000_000)
                .collect::<Vec<_>>(),
        )),
        "store_and_fwd_flag" => Arc::new(StringArray::from(trips.iter().map(|t| t.flag).collect::<Vec<_>>())),
        "PULocationID" | "DOLocationID" => Arc::new(Int32Array::from(vec![161; n])),
        "payment_type" => Arc::new(Int64Array::from(vec![1; n])),
        "RatecodeID" => Arc::new(Float64Array::from(vec![Some(1.0); n])),
        "total_amount" => Arc::new(Float64Array::from(trips.iter().map(|t| t.total_amount).collect::<Vec<_>>())),
        _ => Arc::new(Float64Array::from(vec![1.25; n])),
    }
}

/// Write a trip file with every canonical column (plus one extra column),
/// optionally leaving one canonical column out.
pub fn write_trip_file(path: &Path, trips: &[Trip], omit: Option<&str>) {
    let mut fields = Vec::new();
    let mut arrays = Vec::new();
    for spec in TRIP_COLUMNS {
        if Some(spec.source) == omit {
            continue;
        }
        let array = column(spec.source, trips);
        fields.push(Field::new(spec.source, array.data_type().clone(), true));
        arrays.push(array);
    }
    fields.push(Field::new("source_batch", arrow::datatypes::DataType::Int32, true));
    arrays.push(Arc::new(Int32Array::from(vec![7; trips.len()])));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

// ── In-memory warehouse ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryState {
    pub table_exists: bool,
    /// Committed rows, as CSV lines.
    pub rows: Vec<String>,
    /// Sink operations in call order.
    pub calls: Vec<String>,
}

/// Warehouse double with the same transactional contract as PostgreSQL:
/// a failed transfer commits nothing.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    pub state: Mutex<MemoryState>,
    /// 1-based transfer call that should fail.
    pub fail_transfer_at: Option<usize>,
    pub unreachable: bool,
}

impl MemoryWarehouse {
    pub fn rows(&self) -> Vec<String> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Fields of every committed row.
    pub fn records(&self) -> Vec<Vec<String>> {
        self.rows()
            .iter()
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn connect(&self) -> Result<(), LoadError> {
        if self.unreachable {
            return Err(LoadError::Connection(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), LoadError> {
        let mut state = self.state.lock().unwrap();
        state.table_exists = true;
        state.calls.push("ensure_schema".into());
        Ok(())
    }

    async fn reset_contents(&self) -> Result<(), LoadError> {
        let mut state = self.state.lock().unwrap();
        state.rows.clear();
        state.calls.push("reset_contents".into());
        Ok(())
    }

    async fn transfer(&self, batch: &CopyBatch) -> Result<u64, LoadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("transfer".into());
        let attempt = state.calls.iter().filter(|c| *c == "transfer").count();
        if self.fail_transfer_at == Some(attempt) {
            return Err(LoadError::Transfer {
                path: batch.source.clone(),
                source: sqlx::Error::Protocol("connection reset mid-stream".into()),
            });
        }
        let text = String::from_utf8(batch.payload.clone()).unwrap();
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let count = lines.len() as u64;
        state.rows.extend(lines);
        Ok(count)
    }
}
