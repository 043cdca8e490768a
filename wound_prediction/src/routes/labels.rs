use crate::labels::ClassLabel;
use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    pub labels: Vec<ClassLabel>,
}

/// Lists class labels in model output order.
pub async fn class_labels() -> Json<LabelsResponse> {
    Json(LabelsResponse {
        labels: ClassLabel::ALL.to_vec(),
    })
}
