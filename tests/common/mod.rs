use axum::body::{to_bytes, Body};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use blob_gateway::app::{build_router, AppState};
use blob_gateway::config::environment::AppConfig;
use blob_gateway::service::backend::SubmitBackend;
use http::Request;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::util::ServiceExt;

/// In-process stand-in for the gas API, the rate source and the DA
/// node RPC, with knobs the tests can turn between calls.
#[derive(Clone)]
pub struct StubUpstream {
    pub base_url: String,
    pub gas_base: Arc<AtomicU64>,
    pub gas_price_milli: Arc<AtomicU64>,
    pub rate_milli: Arc<AtomicU64>,
    pub tx_code: Arc<AtomicU32>,
    pub fail_address: Arc<AtomicBool>,
    pub fail_balance: Arc<AtomicBool>,
}

pub async fn spawn_stub_upstream() -> StubUpstream {
    let stub = StubUpstream {
        base_url: String::new(),
        gas_base: Arc::new(AtomicU64::new(65_000)),
        gas_price_milli: Arc::new(AtomicU64::new(20)), // 0.02 utia per gas
        rate_milli: Arc::new(AtomicU64::new(5_000)),   // 5.0 usd per native unit
        tx_code: Arc::new(AtomicU32::new(0)),
        fail_address: Arc::new(AtomicBool::new(false)),
        fail_balance: Arc::new(AtomicBool::new(false)),
    };

    let router = Router::new()
        .route("/v1/estimate_gas", get(estimate_gas))
        .route("/v1/gas_price", get(gas_price))
        .route("/rate", get(rate))
        .route("/rpc", post(rpc))
        .with_state(stub.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub upstream");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub serve");
    });

    StubUpstream {
        base_url: format!("http://{addr}"),
        ..stub
    }
}

async fn estimate_gas(
    State(stub): State<StubUpstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let payload_bytes: u64 = params
        .get("payload_bytes")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let gas = stub.gas_base.load(Ordering::Relaxed) + 8 * payload_bytes;
    Json(json!({ "gas_estimate": gas }))
}

async fn gas_price(State(stub): State<StubUpstream>) -> Json<Value> {
    let price = stub.gas_price_milli.load(Ordering::Relaxed) as f64 / 1000.0;
    Json(json!({ "gas_price": price }))
}

async fn rate(State(stub): State<StubUpstream>) -> Json<Value> {
    let rate = stub.rate_milli.load(Ordering::Relaxed) as f64 / 1000.0;
    Json(json!({ "celestia": { "usd": rate } }))
}

async fn rpc(State(stub): State<StubUpstream>, Json(body): Json<Value>) -> Json<Value> {
    let method = body.get("method").and_then(Value::as_str).unwrap_or("");
    let result = match method {
        "state.AccountAddress" => {
            if stub.fail_address.load(Ordering::Relaxed) {
                return Json(rpc_error("keyring unavailable"));
            }
            json!("celestia1stubposter000000000000000000000000000")
        }
        "state.Balance" => {
            if stub.fail_balance.load(Ordering::Relaxed) {
                return Json(rpc_error("balance query failed"));
            }
            json!({ "denom": "utia", "amount": "123456789" })
        }
        "state.SubmitPayForBlob" => {
            let code = stub.tx_code.load(Ordering::Relaxed);
            json!({
                "txhash": "STUBTX0000000000000000000000000000000000000000000000000000000000",
                "height": 42,
                "code": code,
                "raw_log": if code == 0 { "" } else { "blob size over limit" },
            })
        }
        _ => return Json(rpc_error("method not found")),
    };
    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": message } })
}

/// Config with unroutable upstream URLs, for pure-pricing and
/// fallback-path tests.
pub fn offline_config() -> AppConfig {
    AppConfig {
        rust_env: "test".to_string(),
        api_host: "127.0.0.1".to_string(),
        api_port: 0,
        network_name: "mocha-4".to_string(),
        default_namespace_b64: "YmxvYmdhdGUwMQ==".to_string(),
        max_blob_bytes: 4096,
        idempotency_ttl_seconds: 3600,
        rate_cache_seconds: 60,
        fallback_native_usd: 4.5,
        price_markup: 0.1,
        price_fixed_usd: 0.005,
        price_min_usd: 0.01,
        gas_api_base_url: "http://127.0.0.1:1".to_string(),
        rate_api_url: "http://127.0.0.1:1/rate".to_string(),
        backend_mode: "mock".to_string(),
        da_rpc_url: None,
        da_auth_token: None,
        poster_bin: None,
        poster_timeout_ms: 2_000,
        poster_key_name: None,
        poster_signer_address: None,
        status_refresh_seconds: 30,
        sweep_interval_seconds: 60,
    }
}

pub fn test_config(stub: &StubUpstream) -> AppConfig {
    AppConfig {
        gas_api_base_url: stub.base_url.clone(),
        rate_api_url: format!("{}/rate", stub.base_url),
        da_rpc_url: Some(format!("{}/rpc", stub.base_url)),
        ..offline_config()
    }
}

pub fn build_state(config: AppConfig) -> AppState {
    let backend = SubmitBackend::from_config(&config).expect("backend from config");
    AppState::new(config, backend)
}

pub fn build_app(config: AppConfig) -> Router {
    build_router(build_state(config))
}

pub async fn post_json(
    app: axum::Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: &Value,
) -> (http::StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = request
        .body(Body::from(serde_json::to_vec(body).expect("serialize")))
        .expect("build request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload: Value = serde_json::from_slice(&bytes).expect("parse body");
    (status, payload)
}

pub async fn get_json(app: axum::Router, uri: &str) -> (http::StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload: Value = serde_json::from_slice(&bytes).expect("parse body");
    (status, payload)
}
