//! Prometheus metrics for the order service.
//!
//! Counters and histograms are recorded through the `metrics` facade and
//! are no-ops until [`init_metrics`] installs the Prometheus exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Latency buckets for order processing, 1ms to 60s.
const PROCESSING_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0, 60.0,
];

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(listen_addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .set_buckets(&PROCESSING_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %listen_addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Submission Metrics
// ============================================================================

/// Record the outcome of a submission (`accepted`, `replayed` or an error code).
pub fn record_order_submitted(outcome: &str) {
    counter!("orders_submitted_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an idempotent replay.
pub fn record_idempotency_replay() {
    counter!("idempotency_replays_total").increment(1);
}

// ============================================================================
// Worker Metrics
// ============================================================================

/// Record how a delivery was settled.
///
/// # Arguments
///
/// * `outcome` - e.g. `executed`, `requeued`, `failed`, `dead_lettered`, `skipped`
pub fn record_order_processed(outcome: &str) {
    counter!("orders_processed_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record the wall time spent handling one delivery.
pub fn record_processing_duration(seconds: f64) {
    histogram!("order_processing_duration_seconds").record(seconds);
}

/// Record a message routed to the dead-letter queue.
pub fn record_dead_letter(reason: &str) {
    counter!("broker_dead_letters_total", "reason" => reason.to_string()).increment(1);
}

// ============================================================================
// Cancellation Metrics
// ============================================================================

/// Record the outcome of a cancel request (`cancelled` or an error code).
pub fn record_order_cancelled(outcome: &str) {
    counter!("orders_cancelled_total", "outcome" => outcome.to_string()).increment(1);
}
