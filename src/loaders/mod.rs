//! Loader module for LQ-CORE.
//!
//! Defines the loader capability contract, the per-item loader state machine,
//! byte transports, built-in format decoding, and the loader registry.

mod content;
mod error;
mod format;
mod loader;
mod registry;
mod transport;

pub use content::{AssetValue, LoadedContent};
pub use error::{ErrorKind, LoadError, LoaderStateError, TransportError};
pub use format::{Format, FormatLoader};
pub use loader::{
    ItemLoader, Loader, LoaderEvent, LoaderReport, LoaderStatus, ProgressReporter, ReportSink,
    Ticket,
};
pub use registry::{LoaderFactory, LoaderPredicate, LoaderRegistry, PluginHandle};
pub use transport::{FileTransport, MemoryTransport, Transport, DEFAULT_READ_CHUNK};
