//! Parquet → `COPY` CSV transform.
//!
//! Reads one source file, projects it onto the canonical columns in sink
//! order, coerces integer-like columns and renders every row as one CSV
//! line. An unquoted empty field is SQL NULL; there is no header line.
//! Nothing here touches the database.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, ArrowPrimitiveType, AsArray, BooleanArray, GenericStringArray,
    OffsetSizeTrait, PrimitiveArray,
};
use arrow::datatypes::{
    ArrowTemporalType, DataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, SchemaRef, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDateTime, Timelike};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use taxi_core::schema::{ColumnSpec, TRIP_COLUMNS};
use thiserror::Error;
use tracing::debug;

use crate::error::LoadError;

const DEFAULT_BATCH_SIZE: usize = 65_536;

/// Why a record batch could not be rendered.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column {column} has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("column {column} row {row}: {value} is not representable as an integer")]
    NotAnInteger { column: String, row: usize, value: String },

    #[error("column {column} row {row}: timestamp out of range")]
    TimestampOutOfRange { column: String, row: usize },
}

/// Serialized rows of one source file, ready for `COPY ... FROM STDIN`.
#[derive(Debug, Clone)]
pub struct CopyBatch {
    pub source: PathBuf,
    pub rows: u64,
    pub payload: Vec<u8>,
}

/// Turns source files into [`CopyBatch`]es for a fixed column layout.
#[derive(Debug, Clone)]
pub struct Transformer {
    columns: &'static [ColumnSpec],
    batch_size: usize,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(TRIP_COLUMNS)
    }
}

impl Transformer {
    pub fn new(columns: &'static [ColumnSpec]) -> Self {
        Self {
            columns,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Decode `path` and render it as CSV in canonical column order.
    pub fn transform_file(&self, path: &Path) -> Result<CopyBatch, LoadError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| LoadError::decode(path, e))?;

        let roots = self.resolve_roots(builder.schema()).map_err(|missing| {
            LoadError::SchemaMismatch {
                path: path.to_path_buf(),
                missing,
            }
        })?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|e| LoadError::decode(path, e))?;

        let mut out = String::new();
        let mut rows = 0u64;
        for batch in reader {
            let batch = batch.map_err(|e| LoadError::decode(path, e))?;
            rows += self.encode(&batch, &mut out).map_err(|e| match e {
                EncodeError::MissingColumns(missing) => LoadError::SchemaMismatch {
                    path: path.to_path_buf(),
                    missing,
                },
                other => LoadError::decode(path, other),
            })?;
        }

        debug!(file = %path.display(), rows, bytes = out.len(), "transformed source file");
        Ok(CopyBatch {
            source: path.to_path_buf(),
            rows,
            payload: out.into_bytes(),
        })
    }

    /// Root field indices of the canonical columns, or the names that are absent.
    fn resolve_roots(&self, schema: &SchemaRef) -> Result<Vec<usize>, Vec<String>> {
        let mut roots = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();
        for spec in self.columns {
            match schema.index_of(spec.source) {
                Ok(idx) => roots.push(idx),
                Err(_) => missing.push(spec.source.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(roots)
        } else {
            Err(missing)
        }
    }

    /// Append one CSV line per row of `batch` to `out`. Returns the row count.
    ///
    /// Columns are looked up by source name, so the batch may carry extra
    /// columns in any order; they are ignored.
    pub fn encode(&self, batch: &RecordBatch, out: &mut String) -> Result<u64, EncodeError> {
        let mut arrays = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();
        for spec in self.columns {
            match batch.column_by_name(spec.source) {
                Some(array) => arrays.push(normalize(spec, array)?),
                None => missing.push(spec.source.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(EncodeError::MissingColumns(missing));
        }

        let writers = self
            .columns
            .iter()
            .zip(&arrays)
            .map(|(spec, array)| cell_writer(spec, array))
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            for (i, write_cell) in writers.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_cell(row, out)?;
            }
            out.push('\n');
        }
        Ok(batch.num_rows() as u64)
    }
}

/// Decode dictionary-encoded text to plain strings so one writer handles both.
fn normalize(spec: &ColumnSpec, array: &ArrayRef) -> Result<ArrayRef, EncodeError> {
    match array.data_type() {
        DataType::Dictionary(_, value) if matches!(**value, DataType::Utf8 | DataType::LargeUtf8) => {
            arrow::compute::cast(array.as_ref(), value.as_ref()).map_err(|_| {
                EncodeError::UnsupportedType {
                    column: spec.source.to_string(),
                    data_type: array.data_type().to_string(),
                }
            })
        }
        _ => Ok(Arc::clone(array)),
    }
}

type CellWriter<'a> = Box<dyn Fn(usize, &mut String) -> Result<(), EncodeError> + 'a>;

fn cell_writer<'a>(spec: &'static ColumnSpec, array: &'a ArrayRef) -> Result<CellWriter<'a>, EncodeError> {
    let column = spec.source;
    let unsupported = || EncodeError::UnsupportedType {
        column: column.to_string(),
        data_type: array.data_type().to_string(),
    };

    let writer: CellWriter<'a> = match array.data_type() {
        DataType::Int8 => integer_writer(array.as_primitive::<Int8Type>()),
        DataType::Int16 => integer_writer(array.as_primitive::<Int16Type>()),
        DataType::Int32 => integer_writer(array.as_primitive::<Int32Type>()),
        DataType::Int64 => integer_writer(array.as_primitive::<Int64Type>()),
        DataType::UInt8 => integer_writer(array.as_primitive::<UInt8Type>()),
        DataType::UInt16 => integer_writer(array.as_primitive::<UInt16Type>()),
        DataType::UInt32 => integer_writer(array.as_primitive::<UInt32Type>()),
        DataType::UInt64 => integer_writer(array.as_primitive::<UInt64Type>()),
        DataType::Float32 if spec.coerce => rounded_writer(column, array.as_primitive::<Float32Type>()),
        DataType::Float64 if spec.coerce => rounded_writer(column, array.as_primitive::<Float64Type>()),
        _ if spec.coerce => return Err(unsupported()),
        DataType::Float32 => float_writer(array.as_primitive::<Float32Type>()),
        DataType::Float64 => float_writer(array.as_primitive::<Float64Type>()),
        DataType::Boolean => bool_writer(array.as_boolean()),
        DataType::Utf8 => text_writer(array.as_string::<i32>()),
        DataType::LargeUtf8 => text_writer(array.as_string::<i64>()),
        DataType::Timestamp(TimeUnit::Second, _) => {
            timestamp_writer(column, array.as_primitive::<TimestampSecondType>())
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            timestamp_writer(column, array.as_primitive::<TimestampMillisecondType>())
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            timestamp_writer(column, array.as_primitive::<TimestampMicrosecondType>())
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            timestamp_writer(column, array.as_primitive::<TimestampNanosecondType>())
        }
        DataType::Date32 => date_writer(column, array.as_primitive::<Date32Type>()),
        _ => return Err(unsupported()),
    };
    Ok(writer)
}

fn integer_writer<'a, T>(array: &'a PrimitiveArray<T>) -> CellWriter<'a>
where
    T: ArrowPrimitiveType,
    T::Native: std::fmt::Display,
{
    Box::new(move |row, out| {
        if array.is_valid(row) {
            let _ = write!(out, "{}", array.value(row));
        }
        Ok(())
    })
}

/// Float source, integer sink: round half to even, NaN and null become NULL.
fn rounded_writer<'a, T>(column: &'static str, array: &'a PrimitiveArray<T>) -> CellWriter<'a>
where
    T: ArrowPrimitiveType,
    T::Native: Into<f64>,
{
    Box::new(move |row, out| {
        if array.is_null(row) {
            return Ok(());
        }
        let value: f64 = array.value(row).into();
        if value.is_nan() {
            return Ok(());
        }
        let rounded = value.round_ties_even();
        if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
            return Err(EncodeError::NotAnInteger {
                column: column.to_string(),
                row,
                value: value.to_string(),
            });
        }
        let _ = write!(out, "{}", rounded as i64);
        Ok(())
    })
}

/// Shortest round-trip decimal; NaN and null become NULL.
fn float_writer<'a, T>(array: &'a PrimitiveArray<T>) -> CellWriter<'a>
where
    T: ArrowPrimitiveType,
    T::Native: Into<f64> + std::fmt::Display,
{
    Box::new(move |row, out| {
        if array.is_null(row) {
            return Ok(());
        }
        let native = array.value(row);
        let value: f64 = native.into();
        if value.is_nan() {
            return Ok(());
        }
        if value.is_infinite() {
            out.push_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
        } else {
            let _ = write!(out, "{}", native);
        }
        Ok(())
    })
}

fn bool_writer(array: &BooleanArray) -> CellWriter<'_> {
    Box::new(move |row, out| {
        if array.is_valid(row) {
            out.push_str(if array.value(row) { "true" } else { "false" });
        }
        Ok(())
    })
}

fn text_writer<O: OffsetSizeTrait>(array: &GenericStringArray<O>) -> CellWriter<'_> {
    Box::new(move |row, out| {
        if array.is_valid(row) {
            write_text_field(array.value(row), out);
        }
        Ok(())
    })
}

fn timestamp_writer<'a, T>(column: &'static str, array: &'a PrimitiveArray<T>) -> CellWriter<'a>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    Box::new(move |row, out| {
        if array.is_null(row) {
            return Ok(());
        }
        let ts = array
            .value_as_datetime(row)
            .ok_or_else(|| EncodeError::TimestampOutOfRange {
                column: column.to_string(),
                row,
            })?;
        write_timestamp(&ts, out);
        Ok(())
    })
}

fn date_writer<'a>(column: &'static str, array: &'a PrimitiveArray<Date32Type>) -> CellWriter<'a> {
    Box::new(move |row, out| {
        if array.is_null(row) {
            return Ok(());
        }
        let date = array
            .value_as_date(row)
            .ok_or_else(|| EncodeError::TimestampOutOfRange {
                column: column.to_string(),
                row,
            })?;
        let _ = write!(out, "{}", date.format("%Y-%m-%d"));
        Ok(())
    })
}

/// `TIMESTAMP` literal: whole seconds when possible, otherwise microseconds.
/// Zoned values arrive as UTC; nanoseconds are truncated.
fn write_timestamp(ts: &NaiveDateTime, out: &mut String) {
    if ts.nanosecond() == 0 {
        let _ = write!(out, "{}", ts.format("%Y-%m-%d %H:%M:%S"));
    } else {
        let _ = write!(out, "{}", ts.format("%Y-%m-%d %H:%M:%S%.6f"));
    }
}

/// CSV text field. Quoted when it holds a delimiter, quote or line break;
/// an empty string is quoted so it does not read back as NULL.
fn write_text_field(value: &str, out: &mut String) {
    if value.is_empty() {
        out.push_str("\"\"");
    } else if value.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for ch in value.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}
