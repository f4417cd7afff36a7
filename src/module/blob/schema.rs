use super::model::CoinBalance;
use serde::{Deserialize, Serialize};

/// Disclosed on every submission response. Settlement is triggered
/// externally only for responses below the failure threshold, so a
/// failed response implies no charge; no explicit refund transaction
/// is ever issued by this service.
pub const REFUND_POLICY: &str = "charged only on success: settlement executes for 2xx responses; \
     failed submissions are never settled and no refund transaction is issued";

/// Body accepted by both `POST /v1/quote` and `POST /v1/blobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobBody {
    pub data: String,
    #[serde(default)]
    pub namespace_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub payload_bytes: u64,
    pub estimated_gas: u64,
    pub gas_price: f64,
    pub estimated_native_amount: f64,
    pub native_usd_rate: f64,
    pub rate_source: String,
    pub estimated_usd: f64,
    pub charged_usd: f64,
    pub charged_price_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyView {
    pub key: String,
    pub replayed: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub payload_bytes: u64,
    pub quote: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAcceptedBody {
    pub status: String,
    pub mode: String,
    pub tx_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    pub payload_bytes: u64,
    pub quote: Quote,
    pub refund_policy: String,
    pub idempotency: IdempotencyView,
}

/// Every failure response is self-describing: an error code, a human
/// readable `details` string, an optional `hint`, and the refund
/// policy so the caller can reason about whether settlement occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency: Option<IdempotencyView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterStatusResponse {
    pub available: bool,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<CoinBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfoResponse {
    pub network: String,
    pub backend_mode: String,
    pub max_blob_bytes: u64,
    pub default_namespace_b64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub da_rpc_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetricsView {
    pub quotes_served: u64,
    pub blobs_submitted: u64,
    pub blobs_failed: u64,
    pub replays_served: u64,
    pub conflicts_rejected: u64,
    pub status_refresh_failures: u64,
    pub last_error_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub backend_mode: String,
    pub poster_ready: bool,
    pub metrics: HealthMetricsView,
    pub reason: String,
}
