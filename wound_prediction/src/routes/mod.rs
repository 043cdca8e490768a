mod health;
mod labels;
mod metrics;
mod predict;
mod predictions;

use crate::{model_service::ModelService, server::SharedState, store::PredictionStore};
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes<M: ModelService, S: PredictionStore>() -> Router<SharedState<M, S>> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/labels", get(labels::class_labels))
        .route("/metrics", get(metrics::metrics_handler::<M, S>))
        .route("/predict", post(predict::predict::<M, S>))
        .route(
            "/users/{user_id}/predictions",
            get(predictions::predictions_by_user::<M, S>),
        )
}
