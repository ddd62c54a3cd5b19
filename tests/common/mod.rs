//! Shared fixtures for queue integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use lq_core::loaders::{AssetValue, LoadError, LoadedContent, Loader, ProgressReporter};
use lq_core::scheduler::EntryState;
use lq_core::{LoadItem, LoadQueue, LoaderRegistry, QueueConfig, QueueEvent};

const DEADLINE: Duration = Duration::from_secs(5);

/// Loader whose loads block until the test releases them by src.
#[derive(Default)]
pub struct GatedLoader {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
}

/// Decrements the active count even when the load future is dropped.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GatedLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn gate(&self, src: &str) -> Arc<Notify> {
        Arc::clone(self.gates.lock().entry(src.to_string()).or_default())
    }

    /// Let the load of `src` finish. May be called before it starts.
    pub fn release(&self, src: &str) {
        self.gate(src).notify_one();
    }

    /// Make the load of `src` fail with a decode error once released.
    pub fn fail(&self, src: &str) {
        self.failing.lock().insert(src.to_string());
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self, count: usize) {
        let deadline = Instant::now() + DEADLINE;
        while self.started.lock().len() < count {
            assert!(Instant::now() < deadline, "expected {count} loads to start");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait::async_trait]
impl Loader for GatedLoader {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn load(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<LoadedContent, LoadError> {
        let src = item.src.clone();
        let gate = self.gate(&src);
        self.started.lock().push(src.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        gate.notified().await;
        progress.report(0.5);
        self.finished.lock().push(src.clone());

        if self.failing.lock().contains(&src) {
            Err(LoadError::decode(&src, "scripted failure"))
        } else {
            Ok(LoadedContent::new(AssetValue::Text(src)))
        }
    }
}

/// Registry that routes every item to `loader`.
pub fn gated_registry(loader: &Arc<GatedLoader>) -> Arc<LoaderRegistry> {
    let registry = LoaderRegistry::new();
    let loader = Arc::clone(loader);
    registry.register(
        Arc::new(|_: &LoadItem| true),
        Arc::new(move |_: &LoadItem| -> Arc<dyn Loader> { loader.clone() }),
    );
    Arc::new(registry)
}

pub fn gated_queue(config: QueueConfig) -> (LoadQueue, Arc<GatedLoader>) {
    let loader = GatedLoader::new();
    let queue = LoadQueue::new(gated_registry(&loader), config);
    (queue, loader)
}

pub fn items(srcs: &[&str]) -> Vec<LoadItem> {
    srcs.iter().map(|s| LoadItem::new(*s)).collect()
}

/// Records every event as a short line: `start:a`, `load:a`, `error:a`,
/// or the event kind for queue-level events. Progress events are skipped.
pub fn record(queue: &LoadQueue) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    queue.events().on_any(move |event| {
        let line = match event {
            QueueEvent::FileStart { item } => format!("start:{}", item.key()),
            QueueEvent::FileLoad { item, .. } => format!("load:{}", item.key()),
            QueueEvent::Error { item, .. } => format!("error:{}", item.key()),
            QueueEvent::FileProgress { .. } | QueueEvent::Progress { .. } => return,
            other => other.kind().to_string(),
        };
        sink.lock().push(line);
    });
    log
}

pub fn lines(log: &Mutex<Vec<String>>) -> Vec<String> {
    log.lock().clone()
}

pub fn position(log: &Mutex<Vec<String>>, line: &str) -> Option<usize> {
    log.lock().iter().position(|l| l == line)
}

/// Poll the queue until the entry for `key` reaches `state`.
pub async fn wait_for_state(queue: &LoadQueue, key: &str, state: EntryState) {
    let deadline = Instant::now() + DEADLINE;
    loop {
        let snap = queue.snapshot().await.unwrap();
        if snap.state_of(key) == Some(state) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "{key} never reached {state:?}, last {:?}",
            snap.state_of(key)
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Give the driver a moment to act on anything already queued.
pub async fn settle_briefly() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
