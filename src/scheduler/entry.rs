//! Queue entry type and lifecycle state.

use std::sync::Arc;

use serde::Serialize;

use crate::items::{ItemType, LoadItem};
use crate::loaders::{ItemLoader, LoadError, LoadedContent, Ticket};

/// Lifecycle of a queue entry. Transitions only move forward:
/// `pending -> loading -> loaded | error | canceled` (pending may cancel directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Loading,
    Loaded,
    Error,
    Canceled,
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Error | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }
}

/// A submitted item with its lifecycle state.
pub(crate) struct QueueEntry {
    pub ticket: Ticket,
    pub item: Arc<LoadItem>,
    pub state: EntryState,
    /// Completion events wait for earlier ordered entries.
    pub maintain_order: bool,
    /// Present only while loading.
    pub loader: Option<ItemLoader>,
    pub progress: f64,
    pub result: Option<Arc<LoadedContent>>,
    pub error: Option<Arc<LoadError>>,
    /// Terminal outcome has been delivered to listeners.
    pub reported: bool,
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("ticket", &self.ticket)
            .field("src", &self.item.src)
            .field("state", &self.state)
            .field("maintain_order", &self.maintain_order)
            .finish()
    }
}

impl QueueEntry {
    pub fn new(ticket: Ticket, item: LoadItem, maintain_order: bool) -> Self {
        Self {
            ticket,
            item: Arc::new(item),
            state: EntryState::Pending,
            maintain_order,
            loader: None,
            progress: 0.0,
            result: None,
            error: None,
            reported: false,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.item.matches(key)
    }

    /// Contribution to aggregate progress.
    pub fn weight(&self) -> f64 {
        match self.state {
            EntryState::Pending => 0.0,
            EntryState::Loading => self.progress,
            _ => 1.0,
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.item.key().to_string(),
            src: self.item.src.clone(),
            item_type: self.item.resolved_type(),
            state: self.state,
            progress: self.weight(),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub id: String,
    pub src: String,
    pub item_type: ItemType,
    pub state: EntryState,
    pub progress: f64,
    pub error: Option<String>,
}

/// Point-in-time view of the whole queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<EntrySnapshot>,
    pub progress: f64,
    pub loaded: usize,
    pub total: usize,
    pub in_flight: usize,
    pub max_connections: usize,
    pub paused: bool,
    pub halted: bool,
}

impl QueueSnapshot {
    /// State of the most recent entry matching `key` by id or src.
    pub fn state_of(&self, key: &str) -> Option<EntryState> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.id == key || e.src == key)
            .map(|e| e.state)
    }

    pub fn count(&self, state: EntryState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }
}
