use crate::{
    error::PredictionError,
    model_service::ModelService,
    normalizer::normalize_on_pool,
    scoring::resolve,
    store::{PredictionRecord, PredictionStore, ResultRecorder},
};

/// Runs normalize, score, resolve and record for one upload. The first
/// failing stage aborts the request; nothing is returned unless the record
/// was stored.
pub struct ClassificationPipeline<M: ModelService, S: PredictionStore> {
    model_service: M,
    recorder: ResultRecorder<S>,
}

impl<M: ModelService, S: PredictionStore> ClassificationPipeline<M, S> {
    pub fn new(model_service: M, store: S) -> Self {
        Self {
            model_service,
            recorder: ResultRecorder::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.recorder.store()
    }

    #[tracing::instrument(skip(self, raw_bytes), fields(bytes = raw_bytes.len()))]
    pub async fn handle(
        &self,
        raw_bytes: Vec<u8>,
        submitter_id: Option<String>,
    ) -> Result<PredictionRecord, PredictionError> {
        let tensor = normalize_on_pool(raw_bytes).await?;
        let scores = self.model_service.score(tensor).await?;
        let result = resolve(&scores)?;
        tracing::debug!(
            "Classified as {} with confidence {:.2}",
            result.class,
            result.confidence
        );

        self.recorder.record(result, submitter_id).await
    }
}
