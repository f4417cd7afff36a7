use super::controller;
use crate::app::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn register_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/quote", post(controller::quote))
        .route("/v1/blobs", post(controller::submit_blob))
        .route("/v1/poster", get(controller::poster_status))
        .route("/v1/network-info", get(controller::network_info))
        .route("/v1/health", get(controller::health))
        .with_state(state)
}
