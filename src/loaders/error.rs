//! Load error types for LQ-CORE.
//!
//! Loader failures are terminal for the item: nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::items::ItemType;

/// Failures raised by a [`Transport`](super::Transport) while fetching bytes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset path not allowed: {0}")]
    PathNotAllowed(PathBuf),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for metrics and event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unsupported,
    Transport,
    Decode,
    Timeout,
    Canceled,
    Lifecycle,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::Lifecycle => "lifecycle",
        }
    }
}

/// Errors that end a single item's load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No loader registered for {src} ({item_type})")]
    Unsupported { src: String, item_type: ItemType },

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to decode {src}: {reason}")]
    Decode { src: String, reason: String },

    #[error("Load timeout after {0}ms")]
    Timeout(u64),

    #[error("Load canceled")]
    Canceled,

    #[error("Loader misuse: {0}")]
    Lifecycle(#[from] LoaderStateError),
}

impl LoadError {
    pub fn decode(src: &str, reason: impl ToString) -> Self {
        Self::Decode {
            src: src.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Canceled => ErrorKind::Canceled,
            Self::Lifecycle(_) => ErrorKind::Lifecycle,
        }
    }

    /// Canceled loads are never reported through the error channel.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Misuse of an [`ItemLoader`](super::ItemLoader) lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoaderStateError {
    #[error("Loader already started")]
    AlreadyStarted,
}
