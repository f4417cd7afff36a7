use super::error::AppError;
use super::model::{BlobRequest, IdempotencyRecord, QuoteCacheEntry, RecordStatus};
use super::schema::{
    BlobBody, ErrorBody, IdempotencyView, Quote, SubmitAcceptedBody, REFUND_POLICY,
};
use crate::app::AppState;
use crate::service::backend::{SubmitError, SubmitErrorKind};
use crate::service::metrics_service;
use crate::service::parse_service::parse_blob_request;
use crate::service::pricing_service;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 120;

/// Process-wide store for idempotency records and key-bound quotes.
/// One mutex owns both maps, so `begin` is an atomic insert-if-absent:
/// two concurrent first-time requests with the same key can never both
/// start work.
#[derive(Debug, Default)]
pub struct BlobStore {
    inner: Mutex<BlobStoreInner>,
}

#[derive(Debug, Default)]
struct BlobStoreInner {
    records: HashMap<String, IdempotencyRecord>,
    quotes: HashMap<String, QuoteCacheEntry>,
}

#[derive(Debug)]
pub enum BeginOutcome {
    /// No live record existed; a `processing` record is now in place.
    Started,
    /// A live record with the same fingerprint is still processing.
    InFlight,
    /// The key is bound to a different fingerprint.
    Conflict { status: RecordStatus },
    /// A terminal record exists; its response is replayed verbatim.
    Replay {
        response_status: u16,
        response_body: Value,
    },
}

impl BlobStore {
    pub fn begin(
        &self,
        key: &str,
        fingerprint: &str,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<BeginOutcome, AppError> {
        let mut inner = self.lock()?;
        if inner
            .records
            .get(key)
            .is_some_and(|rec| rec.expires_at <= now)
        {
            inner.records.remove(key);
        }

        if let Some(existing) = inner.records.get(key) {
            if existing.fingerprint != fingerprint {
                return Ok(BeginOutcome::Conflict {
                    status: existing.status.clone(),
                });
            }
            return Ok(match existing.status {
                RecordStatus::Processing => BeginOutcome::InFlight,
                RecordStatus::Completed | RecordStatus::Failed => BeginOutcome::Replay {
                    response_status: existing.response_status,
                    response_body: existing.response_body.clone(),
                },
            });
        }

        inner.records.insert(
            key.to_string(),
            IdempotencyRecord {
                key: key.to_string(),
                fingerprint: fingerprint.to_string(),
                status: RecordStatus::Processing,
                response_status: 0,
                response_body: Value::Null,
                created_at: now,
                updated_at: now,
                expires_at: now + ttl_seconds.max(1),
            },
        );
        Ok(BeginOutcome::Started)
    }

    /// Transition a `processing` record to its terminal state. No-op if
    /// the record is missing or already terminal; a terminal record
    /// never reverts and its response never changes.
    pub fn finish(
        &self,
        key: &str,
        status: RecordStatus,
        response_status: u16,
        response_body: Value,
        now: i64,
    ) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(record) = inner.records.get_mut(key) {
            if record.status == RecordStatus::Processing {
                record.status = status;
                record.response_status = response_status;
                record.response_body = response_body;
                record.updated_at = now;
            }
        }
        Ok(())
    }

    /// Quote previously bound to this key, honored only while the
    /// entry is live and its fingerprint matches the current request.
    pub fn cached_quote(
        &self,
        key: &str,
        fingerprint: &str,
        now: i64,
    ) -> Result<Option<Quote>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .quotes
            .get(key)
            .filter(|entry| entry.expires_at > now && entry.fingerprint == fingerprint)
            .map(|entry| entry.quote.clone()))
    }

    pub fn store_quote(
        &self,
        key: &str,
        fingerprint: &str,
        quote: Quote,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.quotes.insert(
            key.to_string(),
            QuoteCacheEntry {
                fingerprint: fingerprint.to_string(),
                quote,
                expires_at: now + ttl_seconds.max(1),
            },
        );
        Ok(())
    }

    /// Periodic purge of everything past its TTL. Returns the number
    /// of records and quote entries removed.
    pub fn sweep_expired(&self, now: i64) -> Result<(usize, usize), AppError> {
        let mut inner = self.lock()?;
        let records_before = inner.records.len();
        inner.records.retain(|_, rec| rec.expires_at > now);
        let quotes_before = inner.quotes.len();
        inner.quotes.retain(|_, entry| entry.expires_at > now);
        Ok((
            records_before - inner.records.len(),
            quotes_before - inner.quotes.len(),
        ))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BlobStoreInner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::internal("STORE_LOCK_ERROR", "blob store lock poisoned"))
    }
}

/// Quote bound to an idempotency key sees an identical price on every
/// probe and on the eventual paid retry, even if upstream prices moved
/// in between. Anonymous calls always compute fresh and never cache.
pub async fn get_or_compute_quote(
    state: &AppState,
    req: &BlobRequest,
    key: Option<&str>,
) -> Result<Quote, AppError> {
    let now = Utc::now().timestamp();
    if let Some(key) = key {
        if let Some(quote) = state.store.cached_quote(key, &req.fingerprint, now)? {
            return Ok(quote);
        }
    }
    let quote = pricing_service::quote(state, req.payload_bytes)
        .await
        .map_err(|e| AppError::bad_gateway("PRICING_UPSTREAM_FAILED", e))?;
    if let Some(key) = key {
        state.store.store_quote(
            key,
            &req.fingerprint,
            quote.clone(),
            state.config.idempotency_ttl_seconds,
            now,
        )?;
    }
    Ok(quote)
}

/// Full submission state machine for one request under one
/// idempotency key: validate, bind the record atomically, price,
/// submit, record the outcome.
pub async fn submit_blob(state: &AppState, key: &str, body: &BlobBody) -> (StatusCode, Value) {
    if let Err(err) = validate_idempotency_key(key) {
        return error_response(&err, key_view(key, "rejected"));
    }

    let parsed = match parse_blob_request(
        body,
        &state.config.default_namespace_b64,
        state.config.max_blob_bytes,
    ) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err, key_view(key, "rejected")),
    };

    let now = Utc::now().timestamp();
    let outcome = match state.store.begin(
        key,
        &parsed.fingerprint,
        state.config.idempotency_ttl_seconds,
        now,
    ) {
        Ok(outcome) => outcome,
        Err(err) => return error_response(&err, key_view(key, "rejected")),
    };

    match outcome {
        BeginOutcome::Conflict { status } => {
            metrics_service::inc_conflicts_rejected();
            let err = AppError::conflict(
                "IDEMPOTENCY_CONFLICT",
                "Idempotency-Key already used with a different payload",
            );
            let mut body = error_body(&err, key_view(key, status.as_str()));
            body.hint = Some("use a fresh Idempotency-Key for new content".to_string());
            (err.status, to_value(&body))
        }
        BeginOutcome::InFlight => {
            let err = AppError::conflict(
                "SUBMISSION_IN_FLIGHT",
                "a submission with this Idempotency-Key is still processing",
            );
            let mut body = error_body(&err, key_view(key, RecordStatus::Processing.as_str()));
            body.hint = Some("retry after the in-flight submission settles".to_string());
            (err.status, to_value(&body))
        }
        BeginOutcome::Replay {
            response_status,
            mut response_body,
        } => {
            metrics_service::inc_replays_served();
            if let Some(flag) = response_body.pointer_mut("/idempotency/replayed") {
                *flag = json!(true);
            }
            (
                StatusCode::from_u16(response_status).unwrap_or(StatusCode::OK),
                response_body,
            )
        }
        BeginOutcome::Started => run_submission(state, key, &parsed).await,
    }
}

async fn run_submission(
    state: &AppState,
    key: &str,
    parsed: &BlobRequest,
) -> (StatusCode, Value) {
    let quote = match get_or_compute_quote(state, parsed, Some(key)).await {
        Ok(quote) => quote,
        Err(err) => return fail_submission(state, key, &err, None),
    };

    match state
        .backend
        .submit(&parsed.namespace, &parsed.data, Some(quote.gas_price))
        .await
    {
        Ok(result) => {
            let body = SubmitAcceptedBody {
                status: "submitted".to_string(),
                mode: result.mode.to_string(),
                tx_reference: result.tx_reference,
                height: result.height,
                payload_bytes: parsed.payload_bytes as u64,
                quote,
                refund_policy: REFUND_POLICY.to_string(),
                idempotency: key_view(key, RecordStatus::Completed.as_str()),
            };
            let value = to_value(&body);
            let now = Utc::now().timestamp();
            if let Err(err) = state.store.finish(
                key,
                RecordStatus::Completed,
                StatusCode::OK.as_u16(),
                value.clone(),
                now,
            ) {
                return fail_submission(state, key, &err, Some(body.quote));
            }
            metrics_service::inc_blobs_submitted();
            (StatusCode::OK, value)
        }
        Err(submit_err) => {
            let err = classify_submit_error(&submit_err);
            fail_submission(state, key, &err, Some(quote))
        }
    }
}

/// Backend-reported failures map to three classes: payload rejected as
/// too large (client-correctable), timeout/transport (operator
/// visible, distinct codes), and generic upstream failure.
fn classify_submit_error(err: &SubmitError) -> AppError {
    if err.is_blob_too_large() {
        return AppError::payload_too_large("BLOB_TOO_LARGE_FOR_NETWORK", err.message.clone());
    }
    match err.kind {
        SubmitErrorKind::Timeout => AppError {
            status: StatusCode::GATEWAY_TIMEOUT,
            code: "POSTER_TIMEOUT",
            message: err.message.clone(),
        },
        SubmitErrorKind::Transport => AppError::bad_gateway("POSTER_TRANSPORT_ERROR", err.message.clone()),
        SubmitErrorKind::Backend => AppError::bad_gateway("UPSTREAM_SUBMIT_FAILED", err.message.clone()),
    }
}

/// Record the failure terminally so retries with the same key replay
/// it, then answer with the same body.
fn fail_submission(
    state: &AppState,
    key: &str,
    err: &AppError,
    quote: Option<Quote>,
) -> (StatusCode, Value) {
    metrics_service::inc_blobs_failed();
    metrics_service::set_last_error_ts(Utc::now().timestamp());

    let mut body = error_body(err, key_view(key, RecordStatus::Failed.as_str()));
    body.quote = quote;
    if err.code == "BLOB_TOO_LARGE_FOR_NETWORK" {
        body.hint = Some("reduce the payload size and submit under a new key".to_string());
    }
    let value = to_value(&body);
    let now = Utc::now().timestamp();
    let _ = state.store.finish(
        key,
        RecordStatus::Failed,
        err.status.as_u16(),
        value.clone(),
        now,
    );
    (err.status, value)
}

fn validate_idempotency_key(key: &str) -> Result<(), AppError> {
    if key.trim().is_empty() {
        return Err(AppError::bad_request(
            "MISSING_IDEMPOTENCY_KEY",
            "Idempotency-Key header is required",
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::bad_request(
            "INVALID_IDEMPOTENCY_KEY",
            format!("Idempotency-Key exceeds {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        ));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::bad_request(
            "INVALID_IDEMPOTENCY_KEY",
            "Idempotency-Key contains invalid characters",
        ));
    }
    Ok(())
}

fn key_view(key: &str, status: &str) -> IdempotencyView {
    IdempotencyView {
        key: key.to_string(),
        replayed: false,
        status: status.to_string(),
    }
}

fn error_body(err: &AppError, idempotency: IdempotencyView) -> ErrorBody {
    ErrorBody {
        error_code: err.code.to_string(),
        details: err.message.clone(),
        hint: None,
        refund_policy: Some(REFUND_POLICY.to_string()),
        quote: None,
        idempotency: Some(idempotency),
    }
}

fn error_response(err: &AppError, idempotency: IdempotencyView) -> (StatusCode, Value) {
    (err.status, to_value(&error_body(err, idempotency)))
}

fn to_value<T: Serialize>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or_else(|_| json!({ "errorCode": "SERIALIZATION_ERROR" }))
}
