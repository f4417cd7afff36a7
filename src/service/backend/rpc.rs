use super::{trim_log, SubmitError, SubmitResult};
use crate::config::environment::AppConfig;
use crate::module::blob::model::{CoinBalance, PosterStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

const METHOD_ADDRESS: &str = "state.AccountAddress";
const METHOD_BALANCE: &str = "state.Balance";
const METHOD_SUBMIT: &str = "state.SubmitPayForBlob";

/// Direct JSON-RPC 2.0 client against a long-lived DA node endpoint.
/// No explicit call timeout beyond the transport default.
#[derive(Debug)]
pub struct RpcBackend {
    url: String,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl RpcBackend {
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        let url = config
            .da_rpc_url
            .clone()
            .ok_or_else(|| "DA_RPC_URL is required for BACKEND_MODE=rpc".to_string())?;
        Ok(Self {
            url,
            auth_token: config.da_auth_token.clone(),
            http: reqwest::Client::new(),
        })
    }

    pub async fn submit(
        &self,
        namespace: &[u8],
        data: &[u8],
        gas_price_hint: Option<f64>,
    ) -> Result<SubmitResult, SubmitError> {
        let mut options = json!({});
        if let Some(gas_price) = gas_price_hint {
            options["gas_price"] = json!(gas_price);
        }
        let params = json!([STANDARD.encode(namespace), STANDARD.encode(data), options]);
        let result = self.call(METHOD_SUBMIT, params).await?;

        let code = result
            .get("code")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let raw_log = result
            .get("raw_log")
            .or_else(|| result.get("rawLog"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if code != 0 {
            return Err(SubmitError::backend(
                format!("da tx failed with code {code}: {}", trim_log(&raw_log)),
                Some(code),
                Some(result),
            ));
        }

        let tx_reference = result
            .get("txhash")
            .or_else(|| result.get("tx_hash"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                SubmitError::transport("da submit response is missing a tx hash")
            })?;
        let height = result.get("height").and_then(Value::as_u64).filter(|h| *h > 0);

        Ok(SubmitResult {
            mode: "rpc",
            tx_reference,
            height,
            status_code: code,
            raw: result,
        })
    }

    /// Issues the two status queries independently; partial status is
    /// acceptable, full failure is not.
    pub async fn status(&self) -> Result<PosterStatus, SubmitError> {
        let address = self.call(METHOD_ADDRESS, json!([])).await;
        let balance = self.call(METHOD_BALANCE, json!([])).await;

        if let (Err(addr_err), Err(_)) = (&address, &balance) {
            return Err(addr_err.clone());
        }

        Ok(PosterStatus {
            address: address.ok().and_then(|v| match v {
                Value::String(s) => Some(s),
                other => other.as_str().map(ToOwned::to_owned),
            }),
            balance: balance.ok().and_then(|v| {
                let denom = v.get("denom")?.as_str()?.to_string();
                let amount = v.get("amount")?.as_str()?.to_string();
                Some(CoinBalance { denom, amount })
            }),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SubmitError> {
        let body = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SubmitError::transport(format!("{method} request failed: {e}")))?;
        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| SubmitError::transport(format!("{method} decode failed: {e}")))?;

        if let Some(err) = payload.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error");
            return Err(SubmitError::backend(
                format!("{method} rejected (rpc code {code}): {message}"),
                None,
                Some(payload.clone()),
            ));
        }
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| SubmitError::transport(format!("{method} response has no result")))
    }
}
