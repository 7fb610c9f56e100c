//! Prometheus metrics for the coffer server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Metrics carry no user or file names, only aggregate counts, but the
//! endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use coffer_service::SweepReport;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static LOCK_TIMEOUTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "coffer_lock_timeouts_total",
        "Requests that failed because a store lock was not released in time",
    )
    .expect("metric creation failed")
});

pub static LOGINS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("coffer_logins_total", "Login attempts by result"),
        &["result"],
    )
    .expect("metric creation failed")
});

pub static SESSIONS_REMOVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "coffer_sessions_removed_total",
        "Expired sessions removed by the maintenance sweep",
    )
    .expect("metric creation failed")
});

pub static CSRF_REMOVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "coffer_csrf_tokens_removed_total",
        "Expired CSRF tokens removed by the maintenance sweep",
    )
    .expect("metric creation failed")
});

pub static FILES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("coffer_files_uploaded_total", "Files uploaded")
        .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("coffer_bytes_uploaded_total", "Bytes of file content uploaded")
        .expect("metric creation failed")
});

pub static FILES_DOWNLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("coffer_files_downloaded_total", "Files downloaded")
        .expect("metric creation failed")
});

pub static ACCESS_DENIED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "coffer_access_denied_total",
        "Requests refused by a file access check or CSRF check",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(LOCK_TIMEOUTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(LOGINS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SESSIONS_REMOVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CSRF_REMOVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILES_DOWNLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACCESS_DENIED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_login(success: bool) {
    let result = if success { "success" } else { "failure" };
    LOGINS.with_label_values(&[result]).inc();
}

/// Passed to the maintenance task so each sweep lands in the counters.
pub fn record_sweep(report: &SweepReport) {
    SESSIONS_REMOVED.inc_by(report.sessions_removed as u64);
    CSRF_REMOVED.inc_by(report.csrf_removed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_record_sweep() {
        let before = SESSIONS_REMOVED.get();
        record_sweep(&SweepReport {
            sessions_removed: 3,
            csrf_removed: 0,
        });
        assert_eq!(SESSIONS_REMOVED.get(), before + 3);
    }
}
