use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

static QUOTES_SERVED: AtomicU64 = AtomicU64::new(0);
static BLOBS_SUBMITTED: AtomicU64 = AtomicU64::new(0);
static BLOBS_FAILED: AtomicU64 = AtomicU64::new(0);
static REPLAYS_SERVED: AtomicU64 = AtomicU64::new(0);
static CONFLICTS_REJECTED: AtomicU64 = AtomicU64::new(0);
static STATUS_REFRESH_FAILURES: AtomicU64 = AtomicU64::new(0);
static LAST_ERROR_TS: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub quotes_served: u64,
    pub blobs_submitted: u64,
    pub blobs_failed: u64,
    pub replays_served: u64,
    pub conflicts_rejected: u64,
    pub status_refresh_failures: u64,
    pub last_error_ts: i64,
}

pub fn inc_quotes_served() {
    QUOTES_SERVED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_blobs_submitted() {
    BLOBS_SUBMITTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_blobs_failed() {
    BLOBS_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_replays_served() {
    REPLAYS_SERVED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_conflicts_rejected() {
    CONFLICTS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_status_refresh_failures() {
    STATUS_REFRESH_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn set_last_error_ts(ts: i64) {
    LAST_ERROR_TS.store(ts, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        quotes_served: QUOTES_SERVED.load(Ordering::Relaxed),
        blobs_submitted: BLOBS_SUBMITTED.load(Ordering::Relaxed),
        blobs_failed: BLOBS_FAILED.load(Ordering::Relaxed),
        replays_served: REPLAYS_SERVED.load(Ordering::Relaxed),
        conflicts_rejected: CONFLICTS_REJECTED.load(Ordering::Relaxed),
        status_refresh_failures: STATUS_REFRESH_FAILURES.load(Ordering::Relaxed),
        last_error_ts: LAST_ERROR_TS.load(Ordering::Relaxed),
    }
}
