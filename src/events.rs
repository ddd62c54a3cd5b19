//! Typed publish/subscribe for queue events.
//!
//! Listeners subscribe per [`EventKind`] (or to everything) and get a
//! [`Subscription`] back for removal. One-shot listeners remove themselves
//! before they run.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::items::LoadItem;
use crate::loaders::{LoadError, LoadedContent};

/// Event type keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LoadStart,
    FileStart,
    FileProgress,
    FileLoad,
    Progress,
    Error,
    Complete,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::LoadStart,
        Self::FileStart,
        Self::FileProgress,
        Self::FileLoad,
        Self::Progress,
        Self::Error,
        Self::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadStart => "loadstart",
            Self::FileStart => "filestart",
            Self::FileProgress => "fileprogress",
            Self::FileLoad => "fileload",
            Self::Progress => "progress",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Queue-level notification.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A load cycle started.
    LoadStart,
    FileStart {
        item: Arc<LoadItem>,
    },
    FileProgress {
        item: Arc<LoadItem>,
        progress: f64,
    },
    FileLoad {
        item: Arc<LoadItem>,
        content: Arc<LoadedContent>,
    },
    /// Aggregate progress across all entries.
    Progress {
        loaded: usize,
        total: usize,
        progress: f64,
    },
    Error {
        item: Arc<LoadItem>,
        error: Arc<LoadError>,
    },
    /// Every entry of the cycle reached a final state.
    Complete,
}

impl QueueEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::LoadStart => EventKind::LoadStart,
            Self::FileStart { .. } => EventKind::FileStart,
            Self::FileProgress { .. } => EventKind::FileProgress,
            Self::FileLoad { .. } => EventKind::FileLoad,
            Self::Progress { .. } => EventKind::Progress,
            Self::Error { .. } => EventKind::Error,
            Self::Complete => EventKind::Complete,
        }
    }

    /// The item this event is about, if any.
    pub fn item(&self) -> Option<&Arc<LoadItem>> {
        match self {
            Self::FileStart { item }
            | Self::FileProgress { item, .. }
            | Self::FileLoad { item, .. }
            | Self::Error { item, .. } => Some(item),
            _ => None,
        }
    }
}

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Handle returned by [`EventHub::on`] and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct ListenerEntry {
    id: u64,
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    once: bool,
    listener: Listener,
}

/// Subscriber table with synchronous fan-out.
pub struct EventHub {
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, kind: Option<EventKind>, once: bool, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(ListenerEntry {
            id,
            kind,
            once,
            listener,
        });
        Subscription(id)
    }

    /// Listen to every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.add(Some(kind), false, Arc::new(listener))
    }

    /// Listen to the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.add(Some(kind), true, Arc::new(listener))
    }

    /// Listen to every event regardless of kind.
    pub fn on_any<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.add(None, false, Arc::new(listener))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != subscription.0);
        listeners.len() != before
    }

    /// Remove all listeners of `kind`, or every listener when `None`.
    pub fn remove_all(&self, kind: Option<EventKind>) {
        let mut listeners = self.listeners.lock();
        match kind {
            Some(kind) => listeners.retain(|l| l.kind != Some(kind)),
            None => listeners.clear(),
        }
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners
            .lock()
            .iter()
            .any(|l| l.kind.map_or(true, |k| k == kind))
    }

    /// Deliver `event` to matching listeners in subscription order.
    ///
    /// Listeners run outside the table lock.
    pub fn emit(&self, event: &QueueEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let targets = listeners
                .iter()
                .filter(|l| l.kind.map_or(true, |k| k == kind))
                .map(|l| Arc::clone(&l.listener))
                .collect();
            listeners.retain(|l| !(l.once && l.kind == Some(kind)));
            targets
        };
        for listener in targets {
            listener(event);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
