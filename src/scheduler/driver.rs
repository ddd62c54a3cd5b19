//! Queue driver: the single task that owns all queue state.
//!
//! Commands from [`LoadQueue`](super::LoadQueue) handles and reports from
//! running loaders arrive on one inbox, so every state change happens in one
//! total order and listeners see events in that order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::entry::{EntryState, QueueEntry, QueueSnapshot};
use super::queue::QueueConfig;
use crate::events::{EventHub, QueueEvent};
use crate::items::{ItemType, LoadItem};
use crate::loaders::{
    AssetValue, ItemLoader, LoadError, LoadedContent, LoaderEvent, LoaderRegistry, LoaderReport,
    ReportSink, Ticket,
};
use crate::telemetry;

pub(super) enum Command {
    Submit { items: Vec<LoadItem>, load_now: bool },
    Start,
    SetPaused(bool),
    SetMaxConnections(usize),
    Cancel(String),
    Remove(String),
    RemoveAll,
    Reset,
    Close,
    Snapshot(oneshot::Sender<QueueSnapshot>),
    Result {
        key: String,
        reply: oneshot::Sender<Option<Arc<LoadedContent>>>,
    },
    Item {
        key: String,
        reply: oneshot::Sender<Option<Arc<LoadItem>>>,
    },
    WhenSettled(oneshot::Sender<()>),
}

pub(super) enum Message {
    Command(Command),
    Loader(LoaderReport),
}

/// Sink that forwards loader reports into the inbox without keeping it open.
pub(super) fn report_sink(inbox: &mpsc::UnboundedSender<Message>) -> ReportSink {
    let weak = inbox.downgrade();
    Arc::new(move |report| {
        if let Some(tx) = weak.upgrade() {
            let _ = tx.send(Message::Loader(report));
        }
    })
}

type Outcome = Result<Arc<LoadedContent>, Arc<LoadError>>;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

pub(super) struct Driver {
    /// Process-unique id, used as the `queue` metrics label.
    id: u64,
    config: QueueConfig,
    registry: Arc<LoaderRegistry>,
    events: Arc<EventHub>,
    sink: ReportSink,
    entries: Vec<QueueEntry>,
    next_ticket: Ticket,
    max_connections: usize,
    paused: bool,
    halted: bool,
    /// A load cycle started and has not completed yet.
    cycle_active: bool,
    in_flight: usize,
    settle_waiters: Vec<oneshot::Sender<()>>,
}

impl Driver {
    pub fn new(
        config: QueueConfig,
        registry: Arc<LoaderRegistry>,
        events: Arc<EventHub>,
        sink: ReportSink,
    ) -> Self {
        let max_connections = config.max_connections.max(1);
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            config,
            registry,
            events,
            sink,
            entries: Vec::new(),
            next_ticket: 1,
            max_connections,
            paused: false,
            halted: false,
            cycle_active: false,
            in_flight: 0,
            settle_waiters: Vec::new(),
        }
    }

    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Command(command) => self.handle_command(command),
                Message::Loader(report) => self.handle_report(report),
            }
            self.notify_settled();
        }
        tracing::debug!(entries = self.entries.len(), "load queue driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { items, load_now } => {
                self.enqueue(items);
                // Deferred submissions pause the queue until `load()`.
                self.paused = !load_now;
                if load_now {
                    self.halted = false;
                    self.open_cycle();
                }
                self.pump();
            }
            Command::Start => {
                self.paused = false;
                self.halted = false;
                self.open_cycle();
                self.pump();
            }
            Command::SetPaused(paused) => {
                self.paused = paused;
                if !paused {
                    self.halted = false;
                    self.open_cycle();
                }
                self.pump();
            }
            Command::SetMaxConnections(n) => {
                self.max_connections = n.max(1);
                self.pump();
            }
            Command::Cancel(key) => self.cancel_matching(&key),
            Command::Remove(key) => self.remove_matching(&key),
            Command::RemoveAll => self.clear(),
            Command::Reset => {
                self.clear();
                self.max_connections = self.config.max_connections.max(1);
                self.paused = false;
            }
            Command::Close => self.close(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Result { key, reply } => {
                let result = self.find(&key).and_then(|e| e.result.clone());
                let _ = reply.send(result);
            }
            Command::Item { key, reply } => {
                let item = self.find(&key).map(|e| Arc::clone(&e.item));
                let _ = reply.send(item);
            }
            Command::WhenSettled(reply) => self.settle_waiters.push(reply),
        }
    }

    fn handle_report(&mut self, report: LoaderReport) {
        let Some(idx) = self.index_of(report.ticket) else {
            tracing::trace!(ticket = report.ticket, "report for discarded entry ignored");
            return;
        };
        if self.entries[idx].state != EntryState::Loading {
            return;
        }

        match report.event {
            LoaderEvent::Progress(fraction) => {
                let entry = &mut self.entries[idx];
                let Some(loader) = entry.loader.as_mut() else { return };
                if !loader.apply(LoaderEvent::Progress(fraction)) {
                    return;
                }
                entry.progress = loader.progress();
                let event = QueueEvent::FileProgress {
                    item: Arc::clone(&entry.item),
                    progress: entry.progress,
                };
                self.events.emit(&event);
                self.emit_progress();
            }
            LoaderEvent::Finished(outcome) => {
                let Some(mut loader) = self.entries[idx].loader.take() else { return };
                loader.apply(LoaderEvent::Finished(outcome));
                self.in_flight = self.in_flight.saturating_sub(1);
                telemetry::record_in_flight(self.id, self.in_flight);

                let latency = loader.elapsed().unwrap_or_default();
                let outcome = match (loader.result(), loader.error()) {
                    (Some(content), _) => Ok(Arc::clone(content)),
                    (None, Some(error)) => Err(Arc::clone(error)),
                    (None, None) => Err(Arc::new(LoadError::Canceled)),
                };
                self.finish_entry(idx, outcome, latency);
                self.pump();
            }
        }
    }

    fn enqueue(&mut self, items: Vec<LoadItem>) {
        for item in items {
            let item = item.normalized(self.config.base_path.as_deref());
            let maintain_order = item.maintain_order.unwrap_or(
                self.config.maintain_script_order
                    && item.resolved_type() == ItemType::Javascript,
            );
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            tracing::debug!(ticket, src = %item.src, item_type = %item.resolved_type(), "item queued");
            self.entries.push(QueueEntry::new(ticket, item, maintain_order));
        }
        telemetry::record_queue_depth(self.id, self.pending_count());
    }

    fn can_start(&self) -> bool {
        !self.paused && !self.halted && self.in_flight < self.max_connections
    }

    /// Emit `loadstart` for an explicit start request, even when nothing is
    /// left to load, so that `complete` follows.
    fn open_cycle(&mut self) {
        if self.cycle_active || self.paused || self.halted {
            return;
        }
        self.cycle_active = true;
        tracing::info!(entries = self.entries.len(), "load cycle started");
        self.events.emit(&QueueEvent::LoadStart);
    }

    /// Start pending entries in insertion order while slots are free.
    fn pump(&mut self) {
        while self.can_start() {
            let Some(idx) = self
                .entries
                .iter()
                .position(|e| e.state == EntryState::Pending)
            else {
                break;
            };
            self.open_cycle();
            self.start_entry(idx);
        }
        self.check_complete();
    }

    fn start_entry(&mut self, idx: usize) {
        let item = Arc::clone(&self.entries[idx].item);
        let loader = match self.registry.create(&item) {
            Ok(loader) => loader,
            Err(err) => {
                self.finish_entry(idx, Err(Arc::new(err)), Duration::ZERO);
                return;
            }
        };

        let timeout = item
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.load_timeout);
        let item_loader =
            ItemLoader::new(self.entries[idx].ticket, Arc::clone(&item), loader, timeout);
        self.launch(idx, item_loader);
    }

    /// Hand `item_loader` the report sink and mark the entry loading. A loader
    /// that refuses to start fails the entry so it is never picked again.
    fn launch(&mut self, idx: usize, mut item_loader: ItemLoader) {
        let item = Arc::clone(&self.entries[idx].item);
        if let Err(err) = item_loader.load(Arc::clone(&self.sink)) {
            let ticket = self.entries[idx].ticket;
            tracing::warn!(ticket, error = %err, "loader refused to start");
            self.finish_entry(idx, Err(Arc::new(err.into())), Duration::ZERO);
            return;
        }
        let entry = &mut self.entries[idx];
        tracing::debug!(
            ticket = entry.ticket,
            src = %item.src,
            loader = item_loader.loader_name(),
            "item started"
        );
        entry.state = EntryState::Loading;
        entry.loader = Some(item_loader);
        self.in_flight += 1;
        telemetry::record_in_flight(self.id, self.in_flight);
        telemetry::record_queue_depth(self.id, self.pending_count());
        self.events.emit(&QueueEvent::FileStart { item });
    }

    fn finish_entry(&mut self, idx: usize, outcome: Outcome, latency: Duration) {
        let entry = &mut self.entries[idx];
        let item_type = entry.item.resolved_type();
        entry.progress = 1.0;
        let mut children = Vec::new();

        match outcome {
            Ok(content) => {
                entry.state = EntryState::Loaded;
                tracing::debug!(ticket = entry.ticket, src = %entry.item.src, "item loaded");
                telemetry::record_item_loaded(item_type, latency);
                if let AssetValue::Manifest(items) = content.value() {
                    children = items.clone();
                }
                entry.result = Some(content);
            }
            Err(error) => {
                entry.state = EntryState::Error;
                tracing::warn!(
                    ticket = entry.ticket,
                    src = %entry.item.src,
                    error = %error,
                    "item failed"
                );
                telemetry::record_item_failed(item_type, error.kind());
                entry.error = Some(error);
                if self.config.stop_on_error {
                    self.halted = true;
                    tracing::warn!("stop on error: queue halted");
                }
            }
        }

        if !children.is_empty() {
            self.enqueue(children);
        }
        self.release_reports();
        self.emit_progress();
    }

    /// Deliver terminal outcomes, holding ordered entries behind earlier ones.
    fn release_reports(&mut self) {
        let mut blocked = false;
        let mut ready = Vec::new();
        for entry in self.entries.iter_mut() {
            if entry.reported {
                continue;
            }
            match entry.state {
                EntryState::Pending | EntryState::Loading => {
                    if entry.maintain_order {
                        blocked = true;
                    }
                }
                EntryState::Canceled => entry.reported = true,
                EntryState::Loaded | EntryState::Error => {
                    if entry.maintain_order && blocked {
                        continue;
                    }
                    entry.reported = true;
                    let item = Arc::clone(&entry.item);
                    match (&entry.result, &entry.error) {
                        (Some(content), _) => ready.push(QueueEvent::FileLoad {
                            item,
                            content: Arc::clone(content),
                        }),
                        (None, Some(error)) => ready.push(QueueEvent::Error {
                            item,
                            error: Arc::clone(error),
                        }),
                        (None, None) => {}
                    }
                }
            }
        }
        for event in ready {
            self.events.emit(&event);
        }
    }

    fn emit_progress(&self) {
        let (loaded, total, progress) = self.aggregate();
        self.events.emit(&QueueEvent::Progress {
            loaded,
            total,
            progress,
        });
    }

    fn check_complete(&mut self) {
        if !self.cycle_active {
            return;
        }
        let done = self
            .entries
            .iter()
            .all(|e| e.state.is_terminal() && e.reported);
        if done {
            self.cycle_active = false;
            let failed = self
                .entries
                .iter()
                .filter(|e| e.state == EntryState::Error)
                .count();
            tracing::info!(entries = self.entries.len(), failed, "load cycle complete");
            self.events.emit(&QueueEvent::Complete);
        }
    }

    /// Mark an entry canceled. Returns false if it was already final.
    fn cancel_entry(&mut self, idx: usize) -> bool {
        let entry = &mut self.entries[idx];
        match entry.state {
            EntryState::Pending => {}
            EntryState::Loading => {
                if let Some(mut loader) = entry.loader.take() {
                    loader.cancel();
                }
                self.in_flight = self.in_flight.saturating_sub(1);
            }
            _ => return false,
        }
        entry.state = EntryState::Canceled;
        entry.reported = true;
        tracing::debug!(ticket = entry.ticket, src = %entry.item.src, "item canceled");
        true
    }

    fn cancel_matching(&mut self, key: &str) {
        let mut changed = false;
        for idx in 0..self.entries.len() {
            if self.entries[idx].matches(key) {
                changed |= self.cancel_entry(idx);
            }
        }
        if changed {
            telemetry::record_in_flight(self.id, self.in_flight);
            self.release_reports();
            self.emit_progress();
            self.pump();
        }
    }

    fn remove_matching(&mut self, key: &str) {
        let before = self.entries.len();
        for idx in 0..self.entries.len() {
            if self.entries[idx].matches(key) {
                self.cancel_entry(idx);
            }
        }
        self.entries.retain(|e| !e.matches(key));
        if self.entries.len() == before {
            return;
        }
        tracing::debug!(key, removed = before - self.entries.len(), "items removed");
        telemetry::record_in_flight(self.id, self.in_flight);
        telemetry::record_queue_depth(self.id, self.pending_count());

        if self.entries.is_empty() {
            self.cycle_active = false;
            return;
        }
        self.release_reports();
        self.emit_progress();
        self.pump();
    }

    /// Drop every entry without emitting anything.
    fn clear(&mut self) {
        for idx in 0..self.entries.len() {
            self.cancel_entry(idx);
        }
        self.entries.clear();
        self.in_flight = 0;
        self.halted = false;
        self.cycle_active = false;
        telemetry::record_in_flight(self.id, 0);
        telemetry::record_queue_depth(self.id, 0);
    }

    /// Cancel everything in flight and pause.
    fn close(&mut self) {
        self.paused = true;
        let mut changed = false;
        for idx in 0..self.entries.len() {
            if self.entries[idx].state == EntryState::Loading {
                changed |= self.cancel_entry(idx);
            }
        }
        tracing::info!(canceled = changed, "load queue closed");
        if changed {
            telemetry::record_in_flight(self.id, self.in_flight);
            self.release_reports();
            self.emit_progress();
        }
        self.check_complete();
    }

    fn is_settled(&self) -> bool {
        self.in_flight == 0 && (self.paused || self.halted || self.pending_count() == 0)
    }

    fn notify_settled(&mut self) {
        if self.settle_waiters.is_empty() || !self.is_settled() {
            return;
        }
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn index_of(&self, ticket: Ticket) -> Option<usize> {
        self.entries.iter().position(|e| e.ticket == ticket)
    }

    /// Most recent entry matching `key`.
    fn find(&self, key: &str) -> Option<&QueueEntry> {
        self.entries.iter().rev().find(|e| e.matches(key))
    }

    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Pending)
            .count()
    }

    fn aggregate(&self) -> (usize, usize, f64) {
        let total = self.entries.len();
        if total == 0 {
            return (0, 0, 0.0);
        }
        let loaded = self.entries.iter().filter(|e| e.state.is_terminal()).count();
        let sum: f64 = self.entries.iter().map(QueueEntry::weight).sum();
        (loaded, total, sum / total as f64)
    }

    fn snapshot(&self) -> QueueSnapshot {
        let (loaded, total, progress) = self.aggregate();
        QueueSnapshot {
            entries: self.entries.iter().map(QueueEntry::snapshot).collect(),
            progress,
            loaded,
            total,
            in_flight: self.in_flight,
            max_connections: self.max_connections,
            paused: self.paused,
            halted: self.halted,
        }
    }
}
