//! Read-side API endpoints.
//!
//! Shared error and date-range types live here in mod.rs.

mod health;
mod metrics;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct QueryErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(e) => {
                error!(error = %e, "metrics query failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(QueryErrorResponse { error: self.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Date range ───────────────────────────────────────────────────

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD`, both days inclusive.
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Half-open pickup window `[start, end)` used in every WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Turn an inclusive day range into `[start 00:00, end + 1 day 00:00)`.
    pub fn from_inclusive(start: NaiveDate, end: NaiveDate) -> Result<Self, ApiError> {
        if end < start {
            return Err(ApiError::BadRequest(format!(
                "end ({}) is before start ({})",
                end, start
            )));
        }
        let end_exclusive = end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ApiError::BadRequest(format!("end ({}) is out of range", end)))?;
        Ok(Self {
            start: start.and_time(chrono::NaiveTime::MIN),
            end: end_exclusive.and_time(chrono::NaiveTime::MIN),
        })
    }
}

impl TryFrom<RangeParams> for DateRange {
    type Error = ApiError;

    fn try_from(params: RangeParams) -> Result<Self, Self::Error> {
        Self::from_inclusive(params.start, params.end)
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::root;
pub use metrics::{daily_revenue, hourly_trips, summary, tip_by_payment};

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn inclusive_range_becomes_half_open() {
        let r = DateRange::from_inclusive(day("2025-01-01"), day("2025-01-31")).unwrap();
        assert_eq!(r.start.to_string(), "2025-01-01 00:00:00");
        assert_eq!(r.end.to_string(), "2025-02-01 00:00:00");
    }

    #[test]
    fn single_day_range_covers_the_whole_day() {
        let r = DateRange::from_inclusive(day("2024-02-28"), day("2024-02-28")).unwrap();
        assert_eq!(r.end - r.start, chrono::Duration::days(1));

        let leap = DateRange::from_inclusive(day("2024-02-29"), day("2024-02-29")).unwrap();
        assert_eq!(leap.end.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = DateRange::from_inclusive(day("2025-03-02"), day("2025-03-01")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.to_string(), "end (2025-03-01) is before start (2025-03-02)");
    }

    #[test]
    fn error_statuses() {
        let bad = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let db = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
