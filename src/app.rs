use crate::config::environment::AppConfig;
use crate::module::blob::crud::BlobStore;
use crate::module::blob::model::PosterSnapshot;
use crate::module::blob::route::register_routes;
use crate::service::backend::SubmitBackend;
use crate::service::pricing_service::RateSample;
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<BlobStore>,
    pub backend: Arc<SubmitBackend>,
    pub rate_cache: Arc<RwLock<Option<RateSample>>>,
    pub poster: Arc<RwLock<PosterSnapshot>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, backend: SubmitBackend) -> Self {
        Self {
            config,
            store: Arc::new(BlobStore::default()),
            backend: Arc::new(backend),
            rate_cache: Arc::new(RwLock::new(None)),
            poster: Arc::new(RwLock::new(PosterSnapshot::default())),
            http: reqwest::Client::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    register_routes(state).layer(cors)
}
