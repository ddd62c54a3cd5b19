//! LQ-CORE asset load queue
//!
//! Loads an ordered list of heterogeneous assets (text, JSON, binary media,
//! manifests of further assets) through pluggable per-type loaders, with a
//! concurrency limit, optional strict result ordering, stop-on-error and
//! event-based progress reporting.
//!
//! # Layout
//!
//! - [`items`]: what to load (`LoadItem`, `ItemType`, manifests)
//! - [`loaders`]: how to load one item (`Loader`, `ItemLoader`, transports, registry)
//! - [`scheduler`]: the `LoadQueue` and its driver task
//! - [`events`]: typed listeners for queue events
//! - [`telemetry`], [`config`], [`cli`]: logging, metrics, configuration, commands
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lq_core::{EventKind, FileTransport, LoadItem, LoadQueue, LoaderRegistry, QueueConfig};
//!
//! # async fn demo() -> Result<(), lq_core::QueueError> {
//! let registry = Arc::new(LoaderRegistry::with_defaults(Arc::new(FileTransport::new("public"))));
//! let queue = LoadQueue::new(registry, QueueConfig::default());
//! queue.on(EventKind::Complete, |_| println!("done"));
//! queue.load_manifest([LoadItem::new("hero.png"), LoadItem::new("level.json")], true)?;
//! queue.wait_settled().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod events;
pub mod items;
pub mod loaders;
pub mod scheduler;
pub mod telemetry;

pub use events::{EventHub, EventKind, QueueEvent, Subscription};
pub use items::{ItemType, LoadItem, Manifest, ManifestError, Method};
pub use loaders::{
    AssetValue, FileTransport, FormatLoader, ItemLoader, LoadError, LoadedContent, Loader,
    LoaderRegistry, MemoryTransport, ProgressReporter, Transport, TransportError,
};
pub use scheduler::{EntryState, LoadQueue, QueueConfig, QueueError, QueueSnapshot};
