use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness only. The model and the store are checked once, at startup.
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Available",
    })
}
