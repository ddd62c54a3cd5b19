//! Queue metrics.
//!
//! Every recording goes to the `metrics` facade, so an installed recorder
//! sees it, and to a process-wide store that backs [`metrics_snapshot`].

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::items::ItemType;
use crate::loaders::ErrorKind;

pub const ITEMS_LOADED: &str = "lq_items_loaded_total";
pub const ITEMS_FAILED: &str = "lq_items_failed_total";
pub const ITEM_LATENCY: &str = "lq_item_latency_ms";
pub const IN_FLIGHT: &str = "lq_in_flight";
pub const QUEUE_DEPTH: &str = "lq_queue_depth";

/// Summary statistics for a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Point-in-time copy of the local store. Keys carry their labels,
/// e.g. `lq_items_failed_total{kind="timeout"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
}

impl MetricsSnapshot {
    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }
}

fn store() -> &'static Mutex<MetricsSnapshot> {
    static STORE: OnceLock<Mutex<MetricsSnapshot>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(MetricsSnapshot::default()))
}

fn labeled(name: &str, label: &str, value: &str) -> String {
    format!("{name}{{{label}=\"{value}\"}}")
}

/// Gauges are labeled with the queue id so several queues in one process
/// keep separate values.
pub fn record_in_flight(queue: u64, count: usize) {
    set_queue_gauge(IN_FLIGHT, queue, count);
}

pub fn record_queue_depth(queue: u64, depth: usize) {
    set_queue_gauge(QUEUE_DEPTH, queue, depth);
}

fn set_queue_gauge(name: &'static str, queue: u64, value: usize) {
    let queue = queue.to_string();
    metrics::gauge!(name, "queue" => queue.clone()).set(value as f64);
    store()
        .lock()
        .gauges
        .insert(labeled(name, "queue", &queue), value as f64);
}

pub fn record_item_loaded(item_type: ItemType, latency: Duration) {
    let latency_ms = latency.as_secs_f64() * 1000.0;
    metrics::counter!(ITEMS_LOADED, "item_type" => item_type.as_str()).increment(1);
    metrics::histogram!(ITEM_LATENCY, "item_type" => item_type.as_str()).record(latency_ms);

    let mut store = store().lock();
    *store.counters.entry(ITEMS_LOADED.to_string()).or_default() += 1;
    *store
        .counters
        .entry(labeled(ITEMS_LOADED, "item_type", item_type.as_str()))
        .or_default() += 1;
    store
        .histograms
        .entry(ITEM_LATENCY.to_string())
        .or_default()
        .record(latency_ms);
}

pub fn record_item_failed(item_type: ItemType, kind: ErrorKind) {
    metrics::counter!(
        ITEMS_FAILED,
        "item_type" => item_type.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);

    let mut store = store().lock();
    *store.counters.entry(ITEMS_FAILED.to_string()).or_default() += 1;
    *store
        .counters
        .entry(labeled(ITEMS_FAILED, "kind", kind.as_str()))
        .or_default() += 1;
}

/// Copy of everything recorded in this process so far.
pub fn metrics_snapshot() -> MetricsSnapshot {
    store().lock().clone()
}
