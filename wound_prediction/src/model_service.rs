use crate::{error::PredictionError, normalizer::ImageTensor, scoring::ScoreVector};
use async_trait::async_trait;

#[async_trait]
pub trait ModelService: Send + Sync + 'static {
    async fn score(&self, tensor: ImageTensor) -> Result<ScoreVector, PredictionError>;
}
