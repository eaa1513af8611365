//! Canonical row schema for the trip warehouse table.
//!
//! [`TRIP_COLUMNS`] is the only place the column list lives. The table DDL,
//! the `COPY` column list, and the transfer serializer are all derived from
//! it, because `COPY` is positional: two adjacent `DOUBLE PRECISION` columns
//! swapped in one place but not the other load without any type error.

use crate::error::CoreError;

/// Default destination relation.
pub const DEFAULT_TABLE: &str = "raw_nyc_taxi_trips";

/// SQL type of a sink column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Timestamp,
    DoublePrecision,
    Varchar(u16),
}

impl SqlType {
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            SqlType::Varchar(n) => format!("VARCHAR({})", n),
        }
    }

    /// Name as reported by `information_schema.columns.data_type`.
    pub fn information_schema_name(&self) -> &'static str {
        match self {
            SqlType::Integer => "integer",
            SqlType::Timestamp => "timestamp without time zone",
            SqlType::DoublePrecision => "double precision",
            SqlType::Varchar(_) => "character varying",
        }
    }
}

/// One column of the canonical schema: where it comes from, where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name in the Parquet source (case-sensitive).
    pub source: &'static str,
    /// Column name in the sink table.
    pub sink: &'static str,
    pub sql_type: SqlType,
    /// Float-to-nullable-integer normalization applies.
    pub coerce: bool,
}

const fn col(source: &'static str, sink: &'static str, sql_type: SqlType, coerce: bool) -> ColumnSpec {
    ColumnSpec { source, sink, sql_type, coerce }
}

/// Trip record columns in sink order.
pub const TRIP_COLUMNS: &[ColumnSpec] = &[
    col("VendorID", "vendorid", SqlType::Integer, true),
    col("tpep_pickup_datetime", "tpep_pickup_datetime", SqlType::Timestamp, false),
    col("tpep_dropoff_datetime", "tpep_dropoff_datetime", SqlType::Timestamp, false),
    col("passenger_count", "passenger_count", SqlType::Integer, true),
    col("trip_distance", "trip_distance", SqlType::DoublePrecision, false),
    col("RatecodeID", "ratecodeid", SqlType::Integer, true),
    col("store_and_fwd_flag", "store_and_fwd_flag", SqlType::Varchar(10), false),
    col("PULocationID", "pulocationid", SqlType::Integer, true),
    col("DOLocationID", "dolocationid", SqlType::Integer, true),
    col("payment_type", "payment_type", SqlType::Integer, true),
    col("fare_amount", "fare_amount", SqlType::DoublePrecision, false),
    col("extra", "extra", SqlType::DoublePrecision, false),
    col("mta_tax", "mta_tax", SqlType::DoublePrecision, false),
    col("tip_amount", "tip_amount", SqlType::DoublePrecision, false),
    col("tolls_amount", "tolls_amount", SqlType::DoublePrecision, false),
    col("improvement_surcharge", "improvement_surcharge", SqlType::DoublePrecision, false),
    col("total_amount", "total_amount", SqlType::DoublePrecision, false),
    col("congestion_surcharge", "congestion_surcharge", SqlType::DoublePrecision, false),
    col("Airport_fee", "airport_fee", SqlType::DoublePrecision, false),
    col("cbd_congestion_fee", "cbd_congestion_fee", SqlType::DoublePrecision, false),
];

pub fn source_columns() -> Vec<&'static str> {
    TRIP_COLUMNS.iter().map(|c| c.source).collect()
}

pub fn sink_columns() -> Vec<&'static str> {
    TRIP_COLUMNS.iter().map(|c| c.sink).collect()
}

/// Source names of the columns that need integer coercion.
pub fn coerced_columns() -> Vec<&'static str> {
    TRIP_COLUMNS.iter().filter(|c| c.coerce).map(|c| c.source).collect()
}

/// Accept only plain lowercase identifiers; the name is spliced into SQL.
pub fn validate_table_name(name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(CoreError::InvalidTableName(name.to_string()))
    }
}

/// `CREATE TABLE IF NOT EXISTS` for the trip table.
pub fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = TRIP_COLUMNS
        .iter()
        .map(|c| format!("    {} {}", c.sink, c.sql_type.ddl()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        table,
        columns.join(",\n")
    )
}

/// `COPY ... FROM STDIN` statement matching the transfer wire format:
/// CSV, no header, unquoted empty field is NULL.
pub fn copy_in_sql(table: &str) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT CSV, NULL '')",
        table,
        sink_columns().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column names listed in a `CREATE TABLE` body, in order.
    fn ddl_column_names(ddl: &str) -> Vec<String> {
        let open = ddl.find('(').unwrap();
        let close = ddl.rfind(')').unwrap();
        let body = &ddl[open + 1..close];
        let mut names = Vec::new();
        let mut depth = 0;
        for line in body.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // VARCHAR(10) contains parentheses; take the first token only.
            if depth == 0 {
                names.push(trimmed.split_whitespace().next().unwrap().to_string());
            }
            depth += trimmed.matches('(').count();
            depth -= trimmed.matches(')').count();
        }
        names
    }

    fn copy_column_names(copy: &str) -> Vec<String> {
        let open = copy.find('(').unwrap();
        let close = copy[open..].find(')').unwrap() + open;
        copy[open + 1..close]
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }

    #[test]
    fn ddl_and_copy_enumerate_identical_columns() {
        let sink: Vec<String> = sink_columns().iter().map(|s| s.to_string()).collect();
        let ddl = ddl_column_names(&create_table_sql(DEFAULT_TABLE));
        let copy = copy_column_names(&copy_in_sql(DEFAULT_TABLE));

        assert_eq!(sink.len(), 20);
        assert_eq!(ddl, sink);
        assert_eq!(copy, sink);
    }

    #[test]
    fn sink_names_are_unique_lowercase_identifiers() {
        let mut seen = std::collections::HashSet::new();
        for c in TRIP_COLUMNS {
            assert!(seen.insert(c.sink), "duplicate sink column {}", c.sink);
            assert!(validate_table_name(c.sink).is_ok(), "bad identifier {}", c.sink);
        }
    }

    #[test]
    fn coercion_set_is_exactly_the_integer_columns() {
        assert_eq!(
            coerced_columns(),
            vec!["VendorID", "passenger_count", "RatecodeID", "PULocationID", "DOLocationID", "payment_type"]
        );
        for c in TRIP_COLUMNS {
            assert_eq!(c.coerce, c.sql_type == SqlType::Integer, "{}", c.source);
        }
    }

    #[test]
    fn source_names_keep_parquet_casing() {
        let sources = source_columns();
        assert_eq!(sources.first(), Some(&"VendorID"));
        assert!(sources.contains(&"Airport_fee"));
        assert!(sources.contains(&"PULocationID"));
    }

    #[test]
    fn ddl_types_render() {
        let ddl = create_table_sql("trips");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS trips ("));
        assert!(ddl.contains("store_and_fwd_flag VARCHAR(10)"));
        assert!(ddl.contains("tpep_pickup_datetime TIMESTAMP"));
        assert!(ddl.contains("cbd_congestion_fee DOUBLE PRECISION"));
    }

    #[test]
    fn copy_statement_uses_csv_with_empty_null() {
        let sql = copy_in_sql("trips");
        assert!(sql.starts_with("COPY trips (vendorid, tpep_pickup_datetime,"));
        assert!(sql.ends_with("FROM STDIN WITH (FORMAT CSV, NULL '')"));
        assert!(!sql.contains("HEADER"));
    }

    #[test]
    fn table_name_validation() {
        assert!(validate_table_name("raw_nyc_taxi_trips").is_ok());
        assert!(validate_table_name("_trips2").is_ok());
        assert!(validate_table_name("Trips").is_err());
        assert!(validate_table_name("2trips").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("trips;drop").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }
}
