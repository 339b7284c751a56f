//! Observability module for logging and metrics.
//!
//! Structured logging goes through `tracing`; metrics through the
//! `metrics` facade with an optional Prometheus exporter.

mod logging;
mod metrics;

pub use logging::{env_filter, init_logging};
pub use metrics::{
    MetricsError, init_metrics, record_dead_letter, record_idempotency_replay,
    record_order_cancelled, record_order_processed, record_order_submitted,
    record_processing_duration,
};
