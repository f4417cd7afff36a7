use crate::app::AppState;
use crate::config::environment::AppConfig;
use crate::module::blob::schema::Quote;
use serde_json::Value;
use std::time::Instant;
use tracing::warn;

const UTIA_PER_TIA: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct RateSample {
    pub rate: f64,
    pub fetched_at: Instant,
}

/// Reference signals a quote is derived from. The USD rate records
/// where it came from so fallbacks stay observable in the response.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSignals {
    pub estimated_gas: u64,
    pub gas_price: f64,
    pub native_usd_rate: f64,
    pub rate_source: &'static str,
}

/// Price a payload from live upstream signals. The two gas reads are
/// uncached and fail the quote; the USD rate degrades silently to the
/// cached or configured fallback value.
pub async fn quote(state: &AppState, payload_bytes: usize) -> Result<Quote, String> {
    let (gas, gas_price, (rate, rate_source)) = tokio::join!(
        fetch_gas_estimate(state, payload_bytes),
        fetch_gas_price(state),
        resolve_usd_rate(state),
    );
    let signals = PriceSignals {
        estimated_gas: gas?,
        gas_price: gas_price?,
        native_usd_rate: rate,
        rate_source,
    };
    Ok(build_quote(&state.config, payload_bytes as u64, &signals))
}

/// Pure pricing core: charged = max(min, ceil4(estimated*(1+markup)+fixed)).
/// Rounding is always upward so the gateway never undercharges.
pub fn build_quote(config: &AppConfig, payload_bytes: u64, signals: &PriceSignals) -> Quote {
    let estimated_native_amount =
        (signals.estimated_gas as f64 * signals.gas_price) / UTIA_PER_TIA;
    let estimated_usd = estimated_native_amount * signals.native_usd_rate;
    let marked_up = estimated_usd * (1.0 + config.price_markup) + config.price_fixed_usd;
    let charged_usd = ceil4(marked_up).max(config.price_min_usd);

    Quote {
        payload_bytes,
        estimated_gas: signals.estimated_gas,
        gas_price: signals.gas_price,
        estimated_native_amount,
        native_usd_rate: signals.native_usd_rate,
        rate_source: signals.rate_source.to_string(),
        estimated_usd,
        charged_usd,
        charged_price_string: format!("{charged_usd:.4}"),
    }
}

/// Round up to 4 decimal places. Values already on a 4-decimal tick
/// must pass through unchanged, so scaling noise within epsilon of an
/// integer snaps to it instead of ceiling a full tick upward.
pub fn ceil4(value: f64) -> f64 {
    let scaled = value * 10_000.0;
    let nearest = scaled.round();
    let ticks = if (scaled - nearest).abs() < 1e-9 {
        nearest
    } else {
        scaled.ceil()
    };
    ticks / 10_000.0
}

async fn fetch_gas_estimate(state: &AppState, payload_bytes: usize) -> Result<u64, String> {
    let url = format!(
        "{}/v1/estimate_gas?payload_bytes={payload_bytes}",
        state.config.gas_api_base_url.trim_end_matches('/')
    );
    let payload = fetch_json(state, &url).await?;
    payload
        .get("gas_estimate")
        .and_then(Value::as_u64)
        .ok_or_else(|| "gas estimate response is missing gas_estimate".to_string())
}

async fn fetch_gas_price(state: &AppState) -> Result<f64, String> {
    let url = format!(
        "{}/v1/gas_price",
        state.config.gas_api_base_url.trim_end_matches('/')
    );
    let payload = fetch_json(state, &url).await?;
    payload
        .get("gas_price")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| "gas price response is missing a usable gas_price".to_string())
}

/// Cached for `rate_cache_seconds`; any fetch failure or implausible
/// value falls back to the configured static rate without failing the
/// request.
async fn resolve_usd_rate(state: &AppState) -> (f64, &'static str) {
    let max_age = state.config.rate_cache_seconds.max(0) as u64;
    {
        let cached = state.rate_cache.read().await;
        if let Some(sample) = cached.as_ref() {
            if sample.fetched_at.elapsed().as_secs() < max_age {
                return (sample.rate, "cached");
            }
        }
    }

    match fetch_usd_rate(state).await {
        Ok(rate) if rate.is_finite() && rate > 0.0 => {
            let mut cached = state.rate_cache.write().await;
            *cached = Some(RateSample {
                rate,
                fetched_at: Instant::now(),
            });
            (rate, "live")
        }
        Ok(rate) => {
            warn!(rate, "implausible usd rate, using fallback");
            (state.config.fallback_native_usd, "fallback")
        }
        Err(e) => {
            warn!(error = %e, "usd rate fetch failed, using fallback");
            (state.config.fallback_native_usd, "fallback")
        }
    }
}

async fn fetch_usd_rate(state: &AppState) -> Result<f64, String> {
    let payload = fetch_json(state, &state.config.rate_api_url).await?;
    payload
        .pointer("/celestia/usd")
        .and_then(Value::as_f64)
        .ok_or_else(|| "rate response is missing celestia.usd".to_string())
}

async fn fetch_json(state: &AppState, url: &str) -> Result<Value, String> {
    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| format!("GET {url} failed: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("GET {url} returned {}", response.status()));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| format!("GET {url} decode failed: {e}"))
}
