use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rust_env: String,
    pub api_host: String,
    pub api_port: u16,
    pub network_name: String,
    pub default_namespace_b64: String,
    pub max_blob_bytes: usize,
    pub idempotency_ttl_seconds: i64,
    pub rate_cache_seconds: i64,
    pub fallback_native_usd: f64,
    pub price_markup: f64,
    pub price_fixed_usd: f64,
    pub price_min_usd: f64,
    pub gas_api_base_url: String,
    pub rate_api_url: String,
    pub backend_mode: String,
    pub da_rpc_url: Option<String>,
    pub da_auth_token: Option<String>,
    pub poster_bin: Option<String>,
    pub poster_timeout_ms: i64,
    pub poster_key_name: Option<String>,
    pub poster_signer_address: Option<String>,
    pub status_refresh_seconds: i64,
    pub sweep_interval_seconds: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        let config = Self {
            rust_env: read_optional_string("RUST_ENV", "development"),
            api_host: read_var("API_HOST")?,
            api_port: read_var("API_PORT")?
                .parse::<u16>()
                .map_err(|e| format!("invalid API_PORT: {e}"))?,
            network_name: read_optional_string("DA_NETWORK", "mocha-4"),
            // 10-byte v0 sub-namespace id, expanded to full width by the parser.
            default_namespace_b64: read_optional_string("DEFAULT_NAMESPACE_B64", "YmxvYmdhdGUwMQ=="),
            max_blob_bytes: read_optional_usize("MAX_BLOB_BYTES", 1_000_000)?,
            idempotency_ttl_seconds: read_optional_i64("IDEMPOTENCY_TTL_SECONDS", 3600)?,
            rate_cache_seconds: read_optional_i64("RATE_CACHE_SECONDS", 60)?,
            fallback_native_usd: read_optional_f64("FALLBACK_NATIVE_USD", 5.0)?,
            price_markup: read_optional_f64("PRICE_MARKUP", 0.1)?,
            price_fixed_usd: read_optional_f64("PRICE_FIXED_USD", 0.005)?,
            price_min_usd: read_optional_f64("PRICE_MIN_USD", 0.01)?,
            gas_api_base_url: read_optional_string("GAS_API_BASE_URL", "http://127.0.0.1:8084"),
            rate_api_url: read_optional_string(
                "RATE_API_URL",
                "https://api.coingecko.com/api/v3/simple/price?ids=celestia&vs_currencies=usd",
            ),
            backend_mode: read_optional_string("BACKEND_MODE", "mock"),
            da_rpc_url: env::var("DA_RPC_URL").ok(),
            da_auth_token: env::var("DA_AUTH_TOKEN").ok(),
            poster_bin: env::var("POSTER_BIN").ok(),
            poster_timeout_ms: read_optional_i64("POSTER_TIMEOUT_MS", 120_000)?,
            poster_key_name: env::var("POSTER_KEY_NAME").ok(),
            poster_signer_address: env::var("POSTER_SIGNER_ADDRESS").ok(),
            status_refresh_seconds: read_optional_i64("STATUS_REFRESH_SECONDS", 30)?,
            sweep_interval_seconds: read_optional_i64("SWEEP_INTERVAL_SECONDS", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// A malformed default namespace would otherwise surface as a 400
    /// on every request that omits `namespace_id`.
    pub fn validate(&self) -> Result<(), String> {
        crate::service::parse_service::decode_namespace(&self.default_namespace_b64)
            .map(|_| ())
            .map_err(|e| format!("invalid DEFAULT_NAMESPACE_B64: {}", e.message))
    }
}

fn read_var(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("missing required env var: {key}"))
}

fn read_optional_i64(key: &str, default: i64) -> Result<i64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<i64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_usize(key: &str, default: usize) -> Result<usize, String> {
    match env::var(key) {
        Ok(v) => v.parse::<usize>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_f64(key: &str, default: f64) -> Result<f64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<f64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_dotenv_layers() {
    for path in [".env", "../.env", "../../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
