use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Unexpected shape: {0}")]
    Shape(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Prediction store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<image::ImageError> for PredictionError {
    fn from(err: image::ImageError) -> Self {
        PredictionError::Decode(err.to_string())
    }
}

impl From<ort::Error> for PredictionError {
    fn from(err: ort::Error) -> Self {
        PredictionError::Inference(err.to_string())
    }
}

impl From<reqwest::Error> for PredictionError {
    fn from(err: reqwest::Error) -> Self {
        PredictionError::StoreUnavailable(err.to_string())
    }
}
