use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "NYC Taxi API running",
    })
}
