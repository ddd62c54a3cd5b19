//! Load item descriptors for LQ-CORE.
//!
//! Handles item types, source path resolution, and manifest parsing.

mod item;
pub mod manifest;

pub use item::{ItemType, LoadItem, Method};
pub use manifest::{Manifest, ManifestEntry, ManifestError};
