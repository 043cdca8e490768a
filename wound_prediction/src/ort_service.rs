use crate::{
    config::ModelConfig,
    error::PredictionError,
    labels::ClassLabel,
    model_service::ModelService,
    normalizer::ImageTensor,
    scoring::ScoreVector,
};
use async_trait::async_trait;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
}

impl OrtModelService {
    /// Loads the model once per pool slot and checks its output width
    /// against the label set. Any failure here is fatal for the process.
    pub fn new(model_config: &ModelConfig) -> Result<Self, PredictionError> {
        let model_path = model_config.get_path();
        let num_instances = model_config.num_instances.max(1);

        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .with_intra_threads(model_config.intra_threads.max(1))?
                    .commit_from_file(&model_path)?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| {
                PredictionError::ModelUnavailable(format!(
                    "failed to load {:?}: {}",
                    model_path, e
                ))
            })?;

        let output_name = {
            let session = sessions[0]
                .lock()
                .map_err(|e| PredictionError::ModelUnavailable(e.to_string()))?;
            session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or_else(|| {
                    PredictionError::ModelUnavailable("model declares no outputs".to_string())
                })?
        };

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output {:?}",
            num_instances,
            model_path,
            output_name
        );

        let service = Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name: output_name.into(),
        };
        service.check_output_width()?;

        Ok(service)
    }

    fn check_output_width(&self) -> Result<(), PredictionError> {
        let scores = self
            .run_inference(&ImageTensor::zeros())
            .map_err(|e| PredictionError::ModelUnavailable(format!("warm-up failed: {}", e)))?;

        if scores.len() != ClassLabel::count() {
            return Err(PredictionError::ModelUnavailable(format!(
                "model produces {} scores but {} class labels are configured",
                scores.len(),
                ClassLabel::count()
            )));
        }
        Ok(())
    }

    pub fn run_inference(&self, input: &ImageTensor) -> Result<ScoreVector, PredictionError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| PredictionError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| PredictionError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (shape, data) = outputs[&*self.output_name].try_extract_tensor::<f32>()?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        match dims.as_slice() {
            [1, width] if *width as usize == data.len() => Ok(ScoreVector::new(data.to_vec())),
            other => Err(PredictionError::Shape(format!(
                "expected model output of shape [1, N], got {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn score(&self, tensor: ImageTensor) -> Result<ScoreVector, PredictionError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.run_inference(&tensor))
            .await
            .map_err(|e| PredictionError::Inference(format!("inference task failed: {}", e)))?
    }
}
