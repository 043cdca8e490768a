mod firestore;
mod gcp_auth;
mod ort_service;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod error;
pub mod labels;
pub mod model_service;
pub mod normalizer;
pub mod pipeline;
pub mod scoring;
pub mod store;

pub use app::start_app;
pub use firestore::FirestoreStore;
pub use ort_service::OrtModelService;
pub use server::build_router;
pub use telemetry::Metrics;
