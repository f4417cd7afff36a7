use super::SubmitResult;
use crate::module::blob::model::{CoinBalance, PosterStatus};
use crate::service::hash_service::sha256_pair_hex;
use serde_json::json;

/// Deterministic content-addressed stand-in for a transaction id: the
/// same (namespace, data) pair always maps to the same reference, and
/// any byte change produces a different one. No external dependency.
pub fn submit(namespace: &[u8], data: &[u8]) -> SubmitResult {
    let reference = format!("mock-{}", sha256_pair_hex(namespace, data));
    SubmitResult {
        mode: "mock",
        tx_reference: reference,
        height: None,
        status_code: 0,
        raw: json!({ "simulated": true }),
    }
}

pub fn status() -> PosterStatus {
    PosterStatus {
        address: Some("celestia1mockposter0000000000000000000000000000".to_string()),
        balance: Some(CoinBalance {
            denom: "utia".to_string(),
            amount: "1000000000".to_string(),
        }),
    }
}
