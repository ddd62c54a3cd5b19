//! Load scheduling module for LQ-CORE.
//!
//! Manages the entry lifecycle, concurrency limit, strict-order event release,
//! and stop-on-error containment.

mod driver;
mod entry;
mod queue;

pub use entry::{EntrySnapshot, EntryState, QueueSnapshot};
pub use queue::{LoadQueue, QueueConfig, QueueError, DEFAULT_LOAD_TIMEOUT};
