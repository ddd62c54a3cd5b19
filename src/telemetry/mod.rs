//! Telemetry module for LQ-CORE.
//!
//! Structured logging, per-item load spans, and queue metrics. Metrics go
//! through the `metrics` facade and are mirrored in a local store so the CLI
//! can print a summary without an exporter.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    metrics_snapshot, record_in_flight, record_item_failed, record_item_loaded,
    record_queue_depth, HistogramSummary, MetricsSnapshot,
};
pub use spans::{LoadSpan, SpanExt};
