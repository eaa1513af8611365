//! Trip rollups over the warehouse table, all filtered on pickup time.
//!
//! Tip percentage is `tip_amount / fare_amount` averaged over trips with a
//! positive fare; 0.18 means 18%.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use crate::state::AppState;

use super::{ApiResult, DateRange, RangeParams};

const TIP_PCT: &str = "COALESCE(AVG(CASE WHEN fare_amount > 0 THEN tip_amount / fare_amount END), 0)";

// ── Summary ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total_trips: i64,
    pub total_revenue: f64,
    pub avg_fare: f64,
    pub avg_tip_pct: f64,
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> ApiResult<SummaryMetrics> {
    let range = DateRange::try_from(params)?;
    let sql = format!(
        "SELECT COUNT(*)::bigint AS total_trips,
                COALESCE(SUM(total_amount), 0)::float8 AS total_revenue,
                COALESCE(AVG(fare_amount), 0)::float8 AS avg_fare,
                {}::float8 AS avg_tip_pct
         FROM {}
         WHERE tpep_pickup_datetime >= $1 AND tpep_pickup_datetime < $2",
        TIP_PCT, state.table
    );
    let row = sqlx::query_as::<_, SummaryMetrics>(&sql)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(row))
}

// ── Daily revenue ────────────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailyRevenuePoint {
    pub trip_date: NaiveDate,
    pub trips: i64,
    pub total_revenue: f64,
}

pub async fn daily_revenue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Vec<DailyRevenuePoint>> {
    let range = DateRange::try_from(params)?;
    let sql = format!(
        "SELECT DATE(tpep_pickup_datetime) AS trip_date,
                COUNT(*)::bigint AS trips,
                COALESCE(SUM(total_amount), 0)::float8 AS total_revenue
         FROM {}
         WHERE tpep_pickup_datetime >= $1 AND tpep_pickup_datetime < $2
         GROUP BY 1
         ORDER BY 1",
        state.table
    );
    let rows = sqlx::query_as::<_, DailyRevenuePoint>(&sql)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

// ── Hourly trips ─────────────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HourlyTripsPoint {
    pub pickup_hour: i32,
    pub trips: i64,
    pub avg_distance: f64,
}

pub async fn hourly_trips(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Vec<HourlyTripsPoint>> {
    let range = DateRange::try_from(params)?;
    let sql = format!(
        "SELECT EXTRACT(HOUR FROM tpep_pickup_datetime)::int AS pickup_hour,
                COUNT(*)::bigint AS trips,
                COALESCE(AVG(trip_distance), 0)::float8 AS avg_distance
         FROM {}
         WHERE tpep_pickup_datetime >= $1 AND tpep_pickup_datetime < $2
         GROUP BY 1
         ORDER BY 1",
        state.table
    );
    let rows = sqlx::query_as::<_, HourlyTripsPoint>(&sql)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

// ── Tip by payment type ──────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TipByPaymentPoint {
    pub payment_type: String,
    pub trips: i64,
    pub tip_pct: f64,
}

/// SQL label for the TLC payment type code.
fn payment_label_sql() -> &'static str {
    "CASE payment_type
        WHEN 1 THEN 'Credit card'
        WHEN 2 THEN 'Cash'
        WHEN 3 THEN 'No charge'
        WHEN 4 THEN 'Dispute'
        WHEN 5 THEN 'Unknown'
        WHEN 6 THEN 'Voided'
        ELSE 'Other'
     END"
}

pub async fn tip_by_payment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Vec<TipByPaymentPoint>> {
    let range = DateRange::try_from(params)?;
    let sql = format!(
        "SELECT {} AS payment_type,
                COUNT(*)::bigint AS trips,
                {}::float8 AS tip_pct
         FROM {}
         WHERE tpep_pickup_datetime >= $1 AND tpep_pickup_datetime < $2
         GROUP BY 1
         ORDER BY trips DESC",
        payment_label_sql(),
        TIP_PCT,
        state.table
    );
    let rows = sqlx::query_as::<_, TipByPaymentPoint>(&sql)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}
