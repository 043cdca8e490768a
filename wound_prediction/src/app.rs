use crate::{
    config::{Config, StoreBackend},
    firestore::FirestoreStore,
    model_service::ModelService,
    ort_service::OrtModelService,
    pipeline::ClassificationPipeline,
    server::HttpServer,
    store::{InMemoryStore, PredictionStore},
    telemetry::Metrics,
};
use std::{error::Error, sync::Arc};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(Metrics::new()?);

    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to initialize model service: {}", e);
            return Err(Box::new(e));
        }
    };

    match config.store.backend {
        StoreBackend::Firestore => {
            let store = match FirestoreStore::new(&config.store) {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!("Failed to initialize Firestore store: {}", e);
                    return Err(Box::new(e));
                }
            };
            tracing::info!(
                "Recording predictions to Firestore collection {:?} in project {:?}",
                config.store.collection,
                config.store.project_id
            );
            serve(model_service, store, metrics, &config).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Recording predictions in memory, records are lost on exit");
            serve(model_service, InMemoryStore::new(), metrics, &config).await
        }
    }
}

async fn serve<M: ModelService, S: PredictionStore>(
    model_service: M,
    store: S,
    metrics: Arc<Metrics>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let pipeline = ClassificationPipeline::new(model_service, store);
    let server = HttpServer::new(pipeline, metrics, &config.server).await?;
    server.run().await?;

    Ok(())
}
