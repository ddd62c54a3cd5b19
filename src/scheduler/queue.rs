//! Load queue handle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::driver::{report_sink, Command, Driver, Message};
use super::entry::QueueSnapshot;
use crate::events::{EventHub, EventKind, QueueEvent, Subscription};
use crate::items::{ItemType, LoadItem};
use crate::loaders::{LoadedContent, LoaderRegistry};

/// Default per-item load timeout.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(8000);

/// Configuration for a load queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Maximum entries loading at once.
    pub max_connections: usize,
    /// Stop starting new entries after the first error.
    pub stop_on_error: bool,
    /// Javascript items without an explicit flag report in submission order.
    pub maintain_script_order: bool,
    /// Timeout for items that do not set their own.
    pub load_timeout: Duration,
    /// Prefix for relative item sources.
    pub base_path: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            stop_on_error: false,
            maintain_script_order: true,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            base_path: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("load queue driver has stopped")]
    Closed,
}

/// Handle to a load queue.
///
/// All queue state lives on a driver task spawned by [`LoadQueue::new`];
/// handles are cheap to clone. Mutations return as soon as the command is
/// queued, queries wait for the driver's answer. The driver stops once every
/// handle is dropped, so a listener that captures a handle keeps it alive.
#[derive(Clone)]
pub struct LoadQueue {
    inbox: mpsc::UnboundedSender<Message>,
    events: Arc<EventHub>,
    registry: Arc<LoaderRegistry>,
}

impl LoadQueue {
    /// Create a queue and spawn its driver. Must be called inside a tokio runtime.
    pub fn new(registry: Arc<LoaderRegistry>, config: QueueConfig) -> Self {
        let (inbox, rx) = mpsc::unbounded_channel();
        let events = Arc::new(EventHub::new());
        let driver = Driver::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&events),
            report_sink(&inbox),
        );
        tokio::spawn(driver.run(rx));
        Self {
            inbox,
            events,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<LoaderRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn once<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.events.once(kind, listener)
    }

    pub fn off(&self, subscription: Subscription) -> bool {
        self.events.off(subscription)
    }

    fn send(&self, command: Command) -> Result<(), QueueError> {
        self.inbox
            .send(Message::Command(command))
            .map_err(|_| QueueError::Closed)
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| QueueError::Closed)
    }

    /// Queue one item. With `load_now == false` the queue pauses until [`load`](Self::load).
    pub fn load_file(&self, item: LoadItem, load_now: bool) -> Result<(), QueueError> {
        self.load_manifest([item], load_now)
    }

    /// Queue many items in order.
    pub fn load_manifest<I>(&self, items: I, load_now: bool) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = LoadItem>,
    {
        self.send(Command::Submit {
            items: items.into_iter().collect(),
            load_now,
        })
    }

    /// Queue a manifest document; its children are queued once it loads.
    pub fn load_manifest_file(&self, src: impl Into<String>, load_now: bool) -> Result<(), QueueError> {
        self.load_file(LoadItem::new(src).with_type(ItemType::Manifest), load_now)
    }

    /// Start or resume pumping. Also clears a stop-on-error halt.
    pub fn load(&self) -> Result<(), QueueError> {
        self.send(Command::Start)
    }

    /// Pausing stops new starts; in-flight entries continue.
    pub fn set_paused(&self, paused: bool) -> Result<(), QueueError> {
        self.send(Command::SetPaused(paused))
    }

    /// Applies to later starts only; running loads are never aborted.
    pub fn set_max_connections(&self, max_connections: usize) -> Result<(), QueueError> {
        self.send(Command::SetMaxConnections(max_connections))
    }

    /// Cancel entries matching an id or src. They stay in the queue as canceled.
    pub fn cancel(&self, key: impl Into<String>) -> Result<(), QueueError> {
        self.send(Command::Cancel(key.into()))
    }

    /// Cancel and discard entries matching an id or src, results included.
    pub fn remove(&self, key: impl Into<String>) -> Result<(), QueueError> {
        self.send(Command::Remove(key.into()))
    }

    /// Cancel and discard every entry without emitting events.
    pub fn remove_all(&self) -> Result<(), QueueError> {
        self.send(Command::RemoveAll)
    }

    /// Back to the freshly constructed state. Subscriptions are kept.
    pub fn reset(&self) -> Result<(), QueueError> {
        self.send(Command::Reset)
    }

    /// Cancel every in-flight load and pause.
    pub fn close(&self) -> Result<(), QueueError> {
        self.send(Command::Close)
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        self.ask(Command::Snapshot).await
    }

    /// Aggregate progress in `0.0..=1.0`.
    pub async fn progress(&self) -> Result<f64, QueueError> {
        Ok(self.snapshot().await?.progress)
    }

    /// Result of the most recent entry matching `key`, once loaded.
    pub async fn get_result(
        &self,
        key: impl Into<String>,
    ) -> Result<Option<Arc<LoadedContent>>, QueueError> {
        let key = key.into();
        self.ask(|reply| Command::Result { key, reply }).await
    }

    pub async fn get_item(&self, key: impl Into<String>) -> Result<Option<Arc<LoadItem>>, QueueError> {
        let key = key.into();
        self.ask(|reply| Command::Item { key, reply }).await
    }

    /// Wait until nothing is loading and nothing more starts without caller action.
    pub async fn wait_settled(&self) -> Result<(), QueueError> {
        self.ask(Command::WhenSettled).await
    }
}
