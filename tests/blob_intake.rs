mod common;

use common::{build_app, get_json, offline_config, post_json, spawn_stub_upstream, test_config};
use http::StatusCode;
use serde_json::json;
use std::sync::atomic::Ordering;

const HELLO_B64: &str = "aGVsbG8gd29ybGQ=";
const GOODBYE_B64: &str = "Z29vZGJ5ZSB3b3JsZA==";

#[tokio::test]
async fn submits_blob_and_replays_identical_response() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let (status, first) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "demo-001")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "submitted");
    assert_eq!(first["mode"], "mock");
    assert_eq!(first["payloadBytes"], 11);
    assert!(first["txReference"]
        .as_str()
        .is_some_and(|r| r.starts_with("mock-")));
    assert!(first.get("height").is_none());
    assert!(first["refundPolicy"].as_str().is_some_and(|p| !p.is_empty()));
    assert_eq!(first["idempotency"]["key"], "demo-001");
    assert_eq!(first["idempotency"]["replayed"], false);
    assert_eq!(first["idempotency"]["status"], "completed");

    let (status, replayed) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "demo-001")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let mut expected = first;
    expected["idempotency"]["replayed"] = json!(true);
    assert_eq!(replayed, expected);
}

#[tokio::test]
async fn rejects_key_reuse_with_different_payload() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let (status, _) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "reuse-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "reuse-1")],
        &json!({ "data": GOODBYE_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "IDEMPOTENCY_CONFLICT");
    assert!(body["hint"].as_str().is_some());
    assert_eq!(body["idempotency"]["status"], "completed");

    // The conflicting attempt must not disturb the original record.
    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "reuse-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idempotency"]["replayed"], true);
}

#[tokio::test]
async fn rejects_missing_or_malformed_idempotency_key() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let (status, body) = post_json(app.clone(), "/v1/blobs", &[], &json!({ "data": HELLO_B64 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "MISSING_IDEMPOTENCY_KEY");

    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "bad key!")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_IDEMPOTENCY_KEY");

    let long_key = "k".repeat(121);
    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", long_key.as_str())],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_IDEMPOTENCY_KEY");
}

#[tokio::test]
async fn oversize_payload_does_not_bind_the_key() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let oversize = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        vec![b'a'; 5000],
    );
    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "size-1")],
        &json!({ "data": oversize }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["errorCode"], "BLOB_TOO_LARGE");

    // The rejected request never reached the store, so the key is free.
    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "size-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idempotency"]["replayed"], false);
}

#[tokio::test]
async fn rejects_undecodable_and_empty_payloads() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "bad-data")],
        &json!({ "data": "not base64!!" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_DATA_B64");

    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "empty-data")],
        &json!({ "data": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "EMPTY_PAYLOAD");
}

#[tokio::test]
async fn rpc_backend_reports_transaction_reference_and_height() {
    let stub = spawn_stub_upstream().await;
    let mut config = test_config(&stub);
    config.backend_mode = "rpc".to_string();
    let app = build_app(config);

    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "rpc-ok-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "rpc");
    assert!(body["txReference"]
        .as_str()
        .is_some_and(|r| r.starts_with("STUBTX")));
    assert_eq!(body["height"], 42);
    assert_eq!(body["idempotency"]["status"], "completed");
}

#[tokio::test]
async fn network_size_rejection_is_terminal_for_the_key() {
    let stub = spawn_stub_upstream().await;
    stub.tx_code.store(11, Ordering::Relaxed);
    let mut config = test_config(&stub);
    config.backend_mode = "rpc".to_string();
    let app = build_app(config);

    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "rpc-big-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["errorCode"], "BLOB_TOO_LARGE_FOR_NETWORK");
    assert!(body["hint"].as_str().is_some());
    assert!(body["refundPolicy"].as_str().is_some());
    assert!(body.get("quote").is_some());
    assert_eq!(body["idempotency"]["status"], "failed");

    // A later retry replays the stored failure even after the network
    // would accept the blob.
    stub.tx_code.store(0, Ordering::Relaxed);
    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "rpc-big-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["errorCode"], "BLOB_TOO_LARGE_FOR_NETWORK");
    assert_eq!(body["idempotency"]["replayed"], true);
}

#[tokio::test]
async fn generic_backend_failure_maps_to_bad_gateway() {
    let stub = spawn_stub_upstream().await;
    stub.tx_code.store(5, Ordering::Relaxed);
    let mut config = test_config(&stub);
    config.backend_mode = "rpc".to_string();
    let app = build_app(config);

    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "rpc-fail-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["errorCode"], "UPSTREAM_SUBMIT_FAILED");
    assert_eq!(body["idempotency"]["status"], "failed");
}

#[tokio::test]
async fn pricing_outage_fails_the_submission_terminally() {
    let app = build_app(offline_config());

    let (status, body) = post_json(
        app.clone(),
        "/v1/blobs",
        &[("idempotency-key", "price-out-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["errorCode"], "PRICING_UPSTREAM_FAILED");
    assert_eq!(body["idempotency"]["status"], "failed");

    let (status, body) = post_json(
        app,
        "/v1/blobs",
        &[("idempotency-key", "price-out-1")],
        &json!({ "data": HELLO_B64 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["idempotency"]["replayed"], true);
}

#[tokio::test]
async fn exposes_poster_network_and_health_endpoints() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    // No refresh loop runs in tests, so the poster snapshot is empty.
    let (status, body) = get_json(app.clone(), "/v1/poster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(body["mode"], "mock");
    assert_eq!(body["errorCode"], "POSTER_UNAVAILABLE");

    let (status, body) = get_json(app.clone(), "/v1/network-info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"], "mocha-4");
    assert_eq!(body["backendMode"], "mock");
    assert_eq!(body["maxBlobBytes"], 4096);
    assert_eq!(body["defaultNamespaceB64"], "YmxvYmdhdGUwMQ==");

    let (status, body) = get_json(app, "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["backendMode"], "mock");
    assert_eq!(body["posterReady"], false);
    assert!(body["metrics"]["quotesServed"].as_u64().is_some());
}

#[tokio::test]
async fn quote_requests_share_the_parse_rules() {
    let stub = spawn_stub_upstream().await;
    let app = build_app(test_config(&stub));

    let oversize = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        vec![b'a'; 5000],
    );
    let (status, body) = post_json(app, "/v1/quote", &[], &json!({ "data": oversize })).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["errorCode"], "BLOB_TOO_LARGE");
    assert!(body.get("idempotency").is_none());
    assert!(body["refundPolicy"].as_str().is_some_and(|p| !p.is_empty()));
}

#[tokio::test]
async fn replay_survives_a_router_rebuild_only_within_one_state() {
    // Two independent states never share records: same key, same data,
    // both runs submit for real.
    let stub = spawn_stub_upstream().await;
    let first = build_app(test_config(&stub));
    let second = build_app(test_config(&stub));

    let request = json!({ "data": HELLO_B64 });
    let headers = [("idempotency-key", "isolated-1")];
    let (status, body) = post_json(first, "/v1/blobs", &headers, &request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idempotency"]["replayed"], false);

    let (status, body) = post_json(second, "/v1/blobs", &headers, &request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idempotency"]["replayed"], false);
}
