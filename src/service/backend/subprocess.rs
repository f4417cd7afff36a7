use super::{trim_log, SubmitError, SubmitResult};
use crate::config::environment::AppConfig;
use crate::module::blob::model::{CoinBalance, PosterStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

/// Single JSON line written to the helper's stdin.
#[derive(Debug, Serialize)]
struct PosterRequest {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer_address: Option<String>,
}

/// Single JSON object read back from the helper's stdout.
#[derive(Debug, Deserialize)]
struct PosterResponse {
    ok: bool,
    #[serde(default)]
    poster_address: Option<String>,
    #[serde(default)]
    balance: Option<CoinBalance>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    height: Option<u64>,
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    raw_log: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Delegated backend: a locally-managed signing process is spawned per
/// call, configured through `CELESTIA_GO_*` environment variables.
#[derive(Debug)]
pub struct SubprocessBackend {
    bin: String,
    wall_clock: Duration,
    env: Vec<(&'static str, String)>,
    key_name: Option<String>,
    signer_address: Option<String>,
}

impl SubprocessBackend {
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        let bin = config
            .poster_bin
            .clone()
            .ok_or_else(|| "POSTER_BIN is required for BACKEND_MODE=subprocess".to_string())?;

        let mut env: Vec<(&'static str, String)> = Vec::new();
        if let Some(url) = &config.da_rpc_url {
            env.push(("CELESTIA_GO_DA_URL", url.clone()));
        }
        if let Some(token) = &config.da_auth_token {
            env.push(("CELESTIA_GO_DA_AUTH_TOKEN", token.clone()));
        }
        env.push(("CELESTIA_GO_NETWORK", config.network_name.clone()));
        env.push((
            "CELESTIA_GO_POSTER_TIMEOUT_MS",
            config.poster_timeout_ms.max(1).to_string(),
        ));
        if let Some(key_name) = &config.poster_key_name {
            env.push(("CELESTIA_GO_KEY_NAME", key_name.clone()));
        }

        Ok(Self {
            bin,
            wall_clock: Duration::from_millis(config.poster_timeout_ms.max(1) as u64),
            env,
            key_name: config.poster_key_name.clone(),
            signer_address: config.poster_signer_address.clone(),
        })
    }

    pub async fn submit(
        &self,
        namespace: &[u8],
        data: &[u8],
        gas_price_hint: Option<f64>,
    ) -> Result<SubmitResult, SubmitError> {
        let response = self
            .run(PosterRequest {
                action: "submit",
                namespace_id_b64: Some(STANDARD.encode(namespace)),
                data_b64: Some(STANDARD.encode(data)),
                gas_price: gas_price_hint,
                key_name: self.key_name.clone(),
                signer_address: self.signer_address.clone(),
            })
            .await?;

        let tx_reference = response
            .tx_hash
            .clone()
            .ok_or_else(|| SubmitError::transport("poster response is missing tx_hash"))?;
        Ok(SubmitResult {
            mode: "subprocess",
            tx_reference,
            height: response.height.filter(|h| *h > 0),
            status_code: response.code.unwrap_or(0),
            raw: poster_raw(&response),
        })
    }

    pub async fn status(&self) -> Result<PosterStatus, SubmitError> {
        let response = self
            .run(PosterRequest {
                action: "status",
                namespace_id_b64: None,
                data_b64: None,
                gas_price: None,
                key_name: self.key_name.clone(),
                signer_address: self.signer_address.clone(),
            })
            .await?;
        Ok(PosterStatus {
            address: response.poster_address,
            balance: response.balance,
        })
    }

    async fn run(&self, request: PosterRequest) -> Result<PosterResponse, SubmitError> {
        let payload = serde_json::to_string(&request)
            .map_err(|e| SubmitError::transport(format!("poster request serialize: {e}")))?;

        let mut command = Command::new(&self.bin);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the child on timeout must terminate it.
            .kill_on_drop(true);
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| SubmitError::transport(format!("poster spawn failed: {e}")))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SubmitError::transport("poster stdin unavailable"))?;
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| SubmitError::transport(format!("poster stdin write failed: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| SubmitError::transport(format!("poster stdin write failed: {e}")))?;
        drop(stdin);

        let output = match timeout(self.wall_clock, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| SubmitError::transport(format!("poster wait failed: {e}")))?
            }
            Err(_) => {
                return Err(SubmitError::timeout(format!(
                    "poster killed after exceeding {}ms",
                    self.wall_clock.as_millis()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        // The helper may emit log lines before the response object; the
        // last well-formed JSON line wins.
        let response: PosterResponse = stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str(line.trim()).ok())
            .ok_or_else(|| {
                let stderr = String::from_utf8_lossy(&output.stderr);
                SubmitError::transport(format!(
                    "poster produced no JSON response (status={}): stdout={} stderr={}",
                    output.status,
                    trim_log(&stdout),
                    trim_log(&stderr)
                ))
            })?;

        if !output.status.success() || !response.ok {
            let message = response
                .error
                .clone()
                .or_else(|| response.raw_log.clone())
                .unwrap_or_else(|| format!("poster exited with status {}", output.status));
            return Err(SubmitError::backend(
                trim_log(&message),
                response.code.filter(|c| *c != 0),
                Some(poster_raw(&response)),
            ));
        }
        Ok(response)
    }
}

fn poster_raw(response: &PosterResponse) -> Value {
    serde_json::json!({
        "ok": response.ok,
        "poster_address": response.poster_address,
        "tx_hash": response.tx_hash,
        "height": response.height,
        "code": response.code,
        "raw_log": response.raw_log,
        "error": response.error,
    })
}
