use super::crud;
use super::error::AppError;
use super::schema::{
    BlobBody, ErrorBody, HealthMetricsView, HealthResponse, NetworkInfoResponse,
    PosterStatusResponse, QuoteResponse, REFUND_POLICY,
};
use crate::app::AppState;
use crate::service::metrics_service;
use crate::service::parse_service::parse_blob_request;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info};

pub async fn quote(
    State(state): State<AppState>,
    Json(body): Json<BlobBody>,
) -> impl IntoResponse {
    let parsed = match parse_blob_request(
        &body,
        &state.config.default_namespace_b64,
        state.config.max_blob_bytes,
    ) {
        Ok(parsed) => parsed,
        Err(err) => return error_quote(&err),
    };

    match crud::get_or_compute_quote(&state, &parsed, None).await {
        Ok(quote) => {
            metrics_service::inc_quotes_served();
            info!(
                payload_bytes = parsed.payload_bytes,
                charged_usd = quote.charged_usd,
                rate_source = %quote.rate_source,
                "quote served"
            );
            let response = QuoteResponse {
                payload_bytes: parsed.payload_bytes as u64,
                quote,
            };
            (StatusCode::OK, Json(to_value(&response)))
        }
        Err(err) => error_quote(&err),
    }
}

pub async fn submit_blob(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BlobBody>,
) -> impl IntoResponse {
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let (status, value) = crud::submit_blob(&state, &key, &body).await;
    if status.is_success() {
        info!(key = %key, status = status.as_u16(), "blob submission settled");
    } else {
        error!(
            key = %key,
            status = status.as_u16(),
            error_code = value.get("errorCode").and_then(|v| v.as_str()).unwrap_or(""),
            "blob submission rejected"
        );
    }
    (status, Json(value))
}

pub async fn poster_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.poster.read().await.clone();
    let mode = state.backend.mode().to_string();
    let response = match snapshot.status {
        Some(status) => PosterStatusResponse {
            available: true,
            mode,
            address: status.address,
            balance: status.balance,
            refreshed_at: snapshot.refreshed_at,
            error_code: None,
            details: "poster status snapshot".to_string(),
        },
        None => PosterStatusResponse {
            available: false,
            mode,
            address: None,
            balance: None,
            refreshed_at: None,
            error_code: Some("POSTER_UNAVAILABLE".to_string()),
            details: "no poster status available in this backend mode yet".to_string(),
        },
    };
    (StatusCode::OK, Json(to_value(&response)))
}

pub async fn network_info(State(state): State<AppState>) -> impl IntoResponse {
    let response = NetworkInfoResponse {
        network: state.config.network_name.clone(),
        backend_mode: state.backend.mode().to_string(),
        max_blob_bytes: state.config.max_blob_bytes as u64,
        default_namespace_b64: state.config.default_namespace_b64.clone(),
        da_rpc_url: state.config.da_rpc_url.clone(),
    };
    (StatusCode::OK, Json(to_value(&response)))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let poster_ready = state.poster.read().await.status.is_some();
    let m = metrics_service::snapshot();
    let response = HealthResponse {
        ok: true,
        backend_mode: state.backend.mode().to_string(),
        poster_ready,
        metrics: HealthMetricsView {
            quotes_served: m.quotes_served,
            blobs_submitted: m.blobs_submitted,
            blobs_failed: m.blobs_failed,
            replays_served: m.replays_served,
            conflicts_rejected: m.conflicts_rejected,
            status_refresh_failures: m.status_refresh_failures,
            last_error_ts: m.last_error_ts,
        },
        reason: "healthy".to_string(),
    };
    (StatusCode::OK, Json(to_value(&response)))
}

fn error_quote(err: &AppError) -> (StatusCode, Json<Value>) {
    error!(error_code = err.code, details = %err.message, "quote rejected");
    let body = ErrorBody {
        error_code: err.code.to_string(),
        details: err.message.clone(),
        hint: None,
        refund_policy: Some(REFUND_POLICY.to_string()),
        quote: None,
        idempotency: None,
    };
    (err.status, Json(to_value(&body)))
}

fn to_value<T: serde::Serialize>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or_else(|_| json!({ "errorCode": "SERIALIZATION_ERROR" }))
}
