//! Span helpers for item loads.

use tracing::{info_span, Span};

use crate::items::ItemType;

/// Extension trait for recording outcomes into spans.
pub trait SpanExt {
    /// Record `status` and, on failure, `error.message`.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for item load spans.
pub struct LoadSpan;

impl LoadSpan {
    /// `status`, `error.message`, `latency_ms` and `bytes` are filled in
    /// when the load finishes.
    pub fn new(ticket: u64, src: &str, item_type: ItemType) -> Span {
        info_span!(
            "item_load",
            ticket,
            src = %src,
            item_type = item_type.as_str(),
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty,
        )
    }
}
