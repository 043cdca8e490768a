use crate::{
    error::PredictionError,
    model_service::ModelService,
    server::SharedState,
    store::{PredictionRecord, PredictionStore},
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const FILE_FIELD: &str = "file";
const USER_ID_FIELD: &str = "userId";

#[derive(Error, Debug)]
pub enum PredictRouteError {
    #[error("Invalid multipart request: {0}")]
    InvalidRequest(#[from] MultipartRejection),
    #[error("Failed to read multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing `file` field in form data")]
    MissingFile,
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

impl IntoResponse for PredictRouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictRouteError::InvalidRequest(_) | PredictRouteError::MissingFile => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PredictRouteError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            PredictRouteError::Multipart(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictRouteError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: PredictionRecord,
}

struct Upload {
    image_data: Vec<u8>,
    user_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, PredictRouteError> {
    let mut image_data = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => image_data = Some(field.bytes().await?.to_vec()),
            Some(USER_ID_FIELD) => {
                let value = field.text().await?;
                if !value.is_empty() {
                    user_id = Some(value);
                }
            }
            _ => {}
        }
    }

    Ok(Upload {
        image_data: image_data.ok_or(PredictRouteError::MissingFile)?,
        user_id,
    })
}

#[instrument(skip(state, multipart))]
pub async fn predict<M: ModelService, S: PredictionStore>(
    State(state): State<SharedState<M, S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictRouteError> {
    state.metrics.record_request("/predict");

    let upload = read_upload(multipart?).await?;

    let started = Instant::now();
    let result = state
        .pipeline
        .handle(upload.image_data, upload.user_id)
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(payload) => {
            state.metrics.record_prediction_duration(elapsed_ms, "success");
            state.metrics.record_prediction(payload.class);
            Ok(Json(PredictResponse {
                predictions: payload,
            }))
        }
        Err(e) => {
            state.metrics.record_prediction_duration(elapsed_ms, "error");
            tracing::error!("Prediction failed: {}", e);
            Err(e.into())
        }
    }
}
