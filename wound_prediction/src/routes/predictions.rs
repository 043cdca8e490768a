use crate::{
    model_service::ModelService,
    server::SharedState,
    store::{PredictionStore, StoredPrediction},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub message: &'static str,
    pub data: Vec<StoredPrediction>,
}

#[instrument(skip(state))]
pub async fn predictions_by_user<M: ModelService, S: PredictionStore>(
    State(state): State<SharedState<M, S>>,
    Path(user_id): Path<String>,
) -> Response {
    state.metrics.record_request("/users/{user_id}/predictions");

    match state.pipeline.store().list_by_submitter(&user_id).await {
        Ok(data) => Json(PredictionsResponse {
            message: "Predictions retrieved successfully",
            data,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to list predictions for {}: {}", user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Error getting predictions",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
