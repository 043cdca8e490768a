use crate::{
    config::ServerConfig, model_service::ModelService, pipeline::ClassificationPipeline,
    routes::api_routes, store::PredictionStore, telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{future::Future, sync::Arc};
use tokio::{
    net::TcpListener,
    signal::{self, unix::SignalKind},
};

pub struct SharedState<M: ModelService, S: PredictionStore> {
    pub pipeline: Arc<ClassificationPipeline<M, S>>,
    pub metrics: Arc<Metrics>,
}

impl<M: ModelService, S: PredictionStore> Clone for SharedState<M, S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn build_router<M: ModelService, S: PredictionStore>(
    pipeline: ClassificationPipeline<M, S>,
    metrics: Arc<Metrics>,
    max_upload_bytes: usize,
) -> Router {
    let app_state = SharedState {
        pipeline: Arc::new(pipeline),
        metrics,
    };

    api_routes::<M, S>()
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ModelService, S: PredictionStore>(
        pipeline: ClassificationPipeline<M, S>,
        metrics: Arc<Metrics>,
        config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let addr = config.get_address();
        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let router =
            build_router(pipeline, metrics, config.max_upload_bytes).layer(metrics_layer);

        let listener = TcpListener::bind(&addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        tracing::info!("Prediction service listening on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Prediction service stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Cannot listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => tracing::info!("SIGINT received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
