use super::schema::Quote;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated, canonicalized unit of work. `fingerprint` is a pure
/// function of (namespace, data); identical input always re-parses to
/// an identical fingerprint.
#[derive(Debug, Clone)]
pub struct BlobRequest {
    pub namespace: Vec<u8>,
    pub data: Vec<u8>,
    pub payload_bytes: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub fingerprint: String,
    pub status: RecordStatus,
    pub response_status: u16,
    pub response_body: Value,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct QuoteCacheEntry {
    pub fingerprint: String,
    pub quote: Quote,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinBalance {
    pub denom: String,
    pub amount: String,
}

/// Read-only snapshot of the backend signing identity. Refreshed
/// periodically; not authoritative between refreshes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosterStatus {
    pub address: Option<String>,
    pub balance: Option<CoinBalance>,
}

#[derive(Debug, Clone, Default)]
pub struct PosterSnapshot {
    pub status: Option<PosterStatus>,
    pub refreshed_at: Option<i64>,
}
