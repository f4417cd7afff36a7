pub mod mock;
pub mod rpc;
pub mod subprocess;

use crate::config::environment::AppConfig;
use crate::module::blob::model::PosterStatus;
use serde_json::Value;

/// Tx code returned by the destination network when the total blob
/// size exceeds what fits in a block (celestia x/blob code 11). Must
/// classify as a client-correctable failure, not an upstream outage.
pub const BLOB_TOO_LARGE_CODE: u32 = 11;

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub mode: &'static str,
    pub tx_reference: String,
    pub height: Option<u64>,
    pub status_code: u32,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    /// The backend executed and reported a failure code.
    Backend,
    /// The subprocess exceeded its wall-clock budget and was killed.
    Timeout,
    /// The backend could not be reached or produced unreadable output.
    Transport,
}

#[derive(Debug, Clone)]
pub struct SubmitError {
    pub kind: SubmitErrorKind,
    pub message: String,
    pub code: Option<u32>,
    pub raw: Option<Value>,
}

impl SubmitError {
    pub fn backend(message: impl Into<String>, code: Option<u32>, raw: Option<Value>) -> Self {
        Self {
            kind: SubmitErrorKind::Backend,
            message: message.into(),
            code,
            raw,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SubmitErrorKind::Timeout,
            message: message.into(),
            code: None,
            raw: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SubmitErrorKind::Transport,
            message: message.into(),
            code: None,
            raw: None,
        }
    }

    pub fn is_blob_too_large(&self) -> bool {
        self.code == Some(BLOB_TOO_LARGE_CODE)
    }
}

/// Caps backend log output carried into error messages. Truncation
/// backs up to a char boundary so multi-byte text never splits.
pub fn trim_log(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() <= 400 {
        return trimmed.to_string();
    }
    let mut end = 400;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Polymorphic submission executor. The variant is fixed at startup by
/// configuration; callers depend only on `submit`/`status`.
#[derive(Debug)]
pub enum SubmitBackend {
    Mock,
    Rpc(rpc::RpcBackend),
    Subprocess(subprocess::SubprocessBackend),
}

impl SubmitBackend {
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        match config.backend_mode.as_str() {
            "mock" => Ok(Self::Mock),
            "rpc" => Ok(Self::Rpc(rpc::RpcBackend::from_config(config)?)),
            "subprocess" => Ok(Self::Subprocess(subprocess::SubprocessBackend::from_config(
                config,
            )?)),
            other => Err(format!(
                "unsupported BACKEND_MODE `{other}` (expected mock, rpc or subprocess)"
            )),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Rpc(_) => "rpc",
            Self::Subprocess(_) => "subprocess",
        }
    }

    pub async fn submit(
        &self,
        namespace: &[u8],
        data: &[u8],
        gas_price_hint: Option<f64>,
    ) -> Result<SubmitResult, SubmitError> {
        match self {
            Self::Mock => Ok(mock::submit(namespace, data)),
            Self::Rpc(backend) => backend.submit(namespace, data, gas_price_hint).await,
            Self::Subprocess(backend) => backend.submit(namespace, data, gas_price_hint).await,
        }
    }

    pub async fn status(&self) -> Result<PosterStatus, SubmitError> {
        match self {
            Self::Mock => Ok(mock::status()),
            Self::Rpc(backend) => backend.status().await,
            Self::Subprocess(backend) => backend.status().await,
        }
    }
}
