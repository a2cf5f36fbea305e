//! Per-key-type storage.
//!
//! Every key type gets its own [`ResourceStore`], a map from key value to a
//! shared [`ResourceSlot`]. The map lock is held only long enough to fetch or
//! insert a slot; the state machine of a single entry lives behind the slot's
//! async mutex so that one slow load never blocks unrelated keys.

use std::fmt;
use std::sync::Arc;

use bainangua_core::{LoaderError, ResourceKey, describe_key};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::outcome::Unloader;

/// Lifecycle of one cache entry.
pub(crate) enum EntryState<V> {
    /// Freshly inserted; no load has started yet.
    Empty,
    /// A loader function is running. Other requesters wait on the slot lock.
    Loading,
    /// Loaded and referenced `refcount` times.
    Ready {
        resource: V,
        refcount: u32,
        unloader: Option<Unloader>,
    },
    /// The last reference is being released.
    Unloading,
    /// The load failed. Requesters already queued on the slot observe this.
    Failed(LoaderError),
    /// Detached from the store. Queued requesters retry with a fresh slot.
    Removed,
}

impl<V> EntryState<V> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Ready { .. } => "ready",
            Self::Unloading => "unloading",
            Self::Failed(_) => "failed",
            Self::Removed => "removed",
        }
    }
}

impl<V> fmt::Debug for EntryState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { refcount, .. } => write!(f, "ready({refcount})"),
            other => f.write_str(other.label()),
        }
    }
}

pub(crate) struct ResourceSlot<V> {
    pub(crate) state: tokio::sync::Mutex<EntryState<V>>,
}

impl<V> ResourceSlot<V> {
    fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(EntryState::Empty),
        }
    }
}

/// All entries of one key type.
pub struct ResourceStore<K: ResourceKey> {
    entries: Mutex<FxHashMap<K, Arc<ResourceSlot<K::Resource>>>>,
}

impl<K: ResourceKey> Default for ResourceStore<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<K: ResourceKey> ResourceStore<K> {
    /// Number of entries currently present, whatever their state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Descriptions of every key still present.
    #[must_use]
    pub fn outstanding(&self) -> Vec<String> {
        self.entries.lock().keys().map(describe_key).collect()
    }

    /// Returns the slot for `key`, inserting an empty one if needed.
    pub(crate) fn slot(&self, key: &K) -> Arc<ResourceSlot<K::Resource>> {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get(key) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(ResourceSlot::new());
        entries.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    pub(crate) fn existing_slot(&self, key: &K) -> Option<Arc<ResourceSlot<K::Resource>>> {
        self.entries.lock().get(key).cloned()
    }

    /// Detaches `slot` from the map. A newer slot under the same key is left
    /// alone.
    pub(crate) fn remove(&self, key: &K, slot: &Arc<ResourceSlot<K::Resource>>) {
        let mut entries = self.entries.lock();
        if entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            entries.remove(key);
        }
    }
}

impl<K: ResourceKey> fmt::Debug for ResourceStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("len", &self.len())
            .finish()
    }
}
