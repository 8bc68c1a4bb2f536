use std::net::SocketAddr;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "studyroom_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "studyroom_http_request_duration_seconds";

// ── Booking workflow ────────────────────────────────────────────

/// Counter: booking admission attempts. Labels: outcome.
pub const BOOKING_ATTEMPTS_TOTAL: &str = "studyroom_booking_attempts_total";

/// Histogram: number of slots returned per suggestion request.
pub const SUGGESTIONS_RETURNED: &str = "studyroom_suggestions_returned";

/// Counter: notifications the notifier failed to deliver.
pub const NOTIFY_FAILURES_TOTAL: &str = "studyroom_notify_failures_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "studyroom_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "studyroom_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "studyroom_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map an admission result to a short label for metrics.
pub fn booking_outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "confirmed",
        Err(EngineError::Conflict(_)) => "conflict",
        Err(e) if e.is_validation() => "invalid",
        Err(EngineError::NotFound(_)) => "not_found",
        Err(EngineError::WalError(_)) => "storage_error",
        Err(_) => "rejected",
    }
}
