use crate::app::AppState;
use crate::service::metrics_service;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Best-effort periodic refresh of the backend signing identity. A
/// failed refresh keeps the previous snapshot and doubles the wait up
/// to eight base intervals.
pub async fn run_status_refresh(state: AppState, mut shutdown: watch::Receiver<bool>) {
    info!("poster status refresh loop started");
    let base = Duration::from_secs(state.config.status_refresh_seconds.max(1) as u64);
    let mut wait = base;
    loop {
        match state.backend.status().await {
            Ok(status) => {
                let mut snapshot = state.poster.write().await;
                snapshot.status = Some(status);
                snapshot.refreshed_at = Some(Utc::now().timestamp());
                wait = base;
            }
            Err(e) => {
                metrics_service::inc_status_refresh_failures();
                warn!(error = %e.message, "poster status refresh failed, keeping previous snapshot");
                wait = (wait * 2).min(base * 8);
            }
        }

        tokio::select! {
            _ = sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("poster status refresh loop stopped");
                return;
            }
        }
    }
}

/// Periodic purge of expired idempotency records and quote entries.
pub async fn run_expiry_sweep(state: AppState, mut shutdown: watch::Receiver<bool>) {
    info!("expiry sweep loop started");
    let interval = Duration::from_secs(state.config.sweep_interval_seconds.max(1) as u64);
    loop {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("expiry sweep loop stopped");
                return;
            }
        }

        match state.store.sweep_expired(Utc::now().timestamp()) {
            Ok((records, quotes)) if records > 0 || quotes > 0 => {
                debug!(records, quotes, "swept expired entries");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e.message, "expiry sweep failed"),
        }
    }
}
