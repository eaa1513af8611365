//! HTTP router construction.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use taxi_core::config::ServerConfig;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Browser dashboards allowed to call the API.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(api::root))
        .route("/api/metrics/summary", get(api::summary))
        .route("/api/metrics/daily_revenue", get(api::daily_revenue))
        .route("/api/metrics/hourly_trips", get(api::hourly_trips))
        .route("/api/metrics/tip_by_payment", get(api::tip_by_payment))
        .layer(cors_layer(config))
        .with_state(state)
}
