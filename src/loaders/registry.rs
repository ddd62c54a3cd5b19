//! Loader registry: maps items to the loader that handles them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::LoadError;
use super::format::FormatLoader;
use super::loader::Loader;
use super::transport::Transport;
use crate::items::{ItemType, LoadItem};

/// Decides whether a registration handles an item.
pub type LoaderPredicate = Arc<dyn Fn(&LoadItem) -> bool + Send + Sync>;
/// Builds a fresh loader for an accepted item.
pub type LoaderFactory = Arc<dyn Fn(&LoadItem) -> Arc<dyn Loader> + Send + Sync>;

/// Handle to a registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginHandle(u64);

impl PluginHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Registration {
    handle: PluginHandle,
    predicate: LoaderPredicate,
    factory: LoaderFactory,
}

/// Caller-owned, thread-safe table of (predicate, factory) pairs.
///
/// Predicates are evaluated newest first so later registrations override
/// earlier ones, including the built-in defaults.
pub struct LoaderRegistry {
    entries: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registry with the built-in [`FormatLoader`] for every item type.
    pub fn with_defaults(transport: Arc<dyn Transport>) -> Self {
        let registry = Self::new();
        for item_type in ItemType::ALL {
            let transport = Arc::clone(&transport);
            registry.register_type(
                item_type,
                Arc::new(move |_item: &LoadItem| -> Arc<dyn Loader> {
                    Arc::new(FormatLoader::for_type(item_type, Arc::clone(&transport)))
                }),
            );
        }
        registry
    }

    /// Register a loader and return its handle.
    pub fn register(&self, predicate: LoaderPredicate, factory: LoaderFactory) -> PluginHandle {
        let handle = PluginHandle(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.write().push(Registration {
            handle,
            predicate,
            factory,
        });
        handle
    }

    /// Register a loader for every item whose resolved type is `item_type`.
    pub fn register_type(&self, item_type: ItemType, factory: LoaderFactory) -> PluginHandle {
        self.register(
            Arc::new(move |item: &LoadItem| item.resolved_type() == item_type),
            factory,
        )
    }

    /// Remove a registration. Returns false if the handle is unknown.
    pub fn unregister(&self, handle: PluginHandle) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|r| r.handle != handle);
        entries.len() != before
    }

    /// First factory, newest registration first, that accepts `item`.
    pub fn resolve(&self, item: &LoadItem) -> Result<LoaderFactory, LoadError> {
        self.entries
            .read()
            .iter()
            .rev()
            .find(|r| (r.predicate)(item))
            .map(|r| Arc::clone(&r.factory))
            .ok_or_else(|| LoadError::Unsupported {
                src: item.src.clone(),
                item_type: item.resolved_type(),
            })
    }

    /// Resolve and instantiate a loader for `item`.
    pub fn create(&self, item: &LoadItem) -> Result<Arc<dyn Loader>, LoadError> {
        // Factory runs outside the table lock so it may consult the registry.
        let factory = self.resolve(item)?;
        Ok(factory(item))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
