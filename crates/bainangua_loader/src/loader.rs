//! Resource Loader
//!
//! The cache front end: typed `load_resource` / `unload_resource` with
//! reference counting, in-flight de-duplication and recursive dependency
//! loading.
//!
//! # Overview
//!
//! [`ResourceLoader`] is a cheap handle (an `Arc` inside) that loader functions
//! receive by value. A loader function may call back into the handle to load
//! the keys it depends on, and may move a clone into its unloader so the
//! teardown can release those keys later.
//!
//! Each entry moves through `Empty -> Loading -> Ready(n) -> Unloading ->
//! Removed`. A failed load goes to `Failed` and is detached from its store at
//! once, so nothing of the failed key remains and the next request retries.
//! All transitions of one entry are serialized by that entry's async lock;
//! different keys never wait on each other.
//!
//! # Usage
//!
//! ```rust,ignore
//! let loader = ResourceLoader::new(context, MyLoaders);
//! let module = loader.load_resource(ShaderFileKey::new("shaders/tri.vert.spv")).await?;
//! // ...
//! loader.unload_resource(&ShaderFileKey::new("shaders/tri.vert.spv")).await?;
//! assert_eq!(loader.measure_load(), 0);
//! ```
//!
//! # Caveats
//!
//! - A dependency cycle (a loader that requests, directly or indirectly, the
//!   key it is loading) waits on its own entry forever.
//! - An unloader holding a `ResourceLoader` clone keeps the loader alive while
//!   the entry is loaded. Unload every key before dropping the last handle.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bainangua_core::{LoaderError, ResourceKey, Result, describe_key};
use futures::FutureExt;
use log::{debug, error, trace, warn};
use tokio::sync::MutexGuard;

use crate::directory::{LoaderDirectory, LoadsKey, StoreSet};
use crate::outcome::{LoaderOutcome, Unloader};
use crate::store::{EntryState, ResourceSlot, ResourceStore};

struct LoaderShared<D: LoaderDirectory> {
    context: D::Context,
    directory: D,
    stores: D::Stores,
}

impl<D: LoaderDirectory> Drop for LoaderShared<D> {
    fn drop(&mut self) {
        let outstanding = self.stores.outstanding();
        if !outstanding.is_empty() {
            warn!(
                "ResourceLoader dropped with {} outstanding entries: {}",
                outstanding.len(),
                outstanding.join(", ")
            );
        }
    }
}

/// Shared handle to a resource cache.
///
/// Cloning is cheap; every clone refers to the same stores.
pub struct ResourceLoader<D: LoaderDirectory> {
    shared: Arc<LoaderShared<D>>,
}

impl<D: LoaderDirectory> Clone for ResourceLoader<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: LoaderDirectory> fmt::Debug for ResourceLoader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("measure_load", &self.measure_load())
            .finish_non_exhaustive()
    }
}

impl<D: LoaderDirectory> ResourceLoader<D> {
    /// Creates a loader with empty stores.
    #[must_use]
    pub fn new(context: D::Context, directory: D) -> Self {
        Self::with_stores(context, directory, D::Stores::default())
    }

    /// Creates a loader over storage built with
    /// [`create_loader_storage`](crate::create_loader_storage).
    #[must_use]
    pub fn with_stores(context: D::Context, directory: D, stores: D::Stores) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                context,
                directory,
                stores,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &D::Context {
        &self.shared.context
    }

    #[inline]
    #[must_use]
    pub fn directory(&self) -> &D {
        &self.shared.directory
    }

    /// Number of entries across all stores, in any state.
    ///
    /// Zero means every load has been balanced by an unload and every
    /// dependency has been released.
    #[must_use]
    pub fn measure_load(&self) -> usize {
        self.shared.stores.measure_load()
    }

    /// Descriptions of every entry still present. Useful for leak reports.
    #[must_use]
    pub fn outstanding(&self) -> Vec<String> {
        self.shared.stores.outstanding()
    }

    /// Returns `true` if `key` has an entry, whether loading or loaded.
    #[must_use]
    pub fn contains_key<K>(&self, key: &K) -> bool
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        D::store(&self.shared.stores).contains(key)
    }

    /// Returns the loaded resource for `key` without taking a reference.
    ///
    /// Waits for an in-flight transition of the entry to settle.
    pub async fn peek_resource<K>(&self, key: &K) -> Option<K::Resource>
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        let slot = D::store(&self.shared.stores).existing_slot(key)?;
        let state = slot.state.lock().await;
        match &*state {
            EntryState::Ready { resource, .. } => Some(resource.clone()),
            _ => None,
        }
    }

    /// Current reference count of `key`, if it is loaded.
    pub async fn reference_count<K>(&self, key: &K) -> Option<u32>
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        let slot = D::store(&self.shared.stores).existing_slot(key)?;
        let state = slot.state.lock().await;
        match &*state {
            EntryState::Ready { refcount, .. } => Some(*refcount),
            _ => None,
        }
    }

    /// Loads `key`, or takes another reference to it if it is already loaded.
    ///
    /// Concurrent requests for the same key share one invocation of the loader
    /// function. Every successful call must be balanced by one
    /// [`unload_resource`](Self::unload_resource).
    ///
    /// # Errors
    ///
    /// - [`LoaderError::LoadFailure`] if the loader function failed or panicked.
    /// - [`LoaderError::DependencyLoadFailure`] if a key it requested failed.
    pub fn load_resource<K>(&self, key: K) -> impl Future<Output = Result<K::Resource>> + Send + '_
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        async move {
            let store = D::store(&self.shared.stores);
            loop {
                let slot = store.slot(&key);
                let mut state = slot.state.lock().await;
                match &mut *state {
                    EntryState::Ready {
                        resource, refcount, ..
                    } => {
                        *refcount += 1;
                        trace!("{key:?}: reference taken ({refcount})");
                        return Ok(resource.clone());
                    }
                    EntryState::Failed(err) => return Err(err.clone()),
                    // Unloaded while this request was queued.
                    EntryState::Removed => continue,
                    EntryState::Empty | EntryState::Loading | EntryState::Unloading => {}
                }

                *state = EntryState::Loading;
                let transition = Transition::new(store, &key, &slot, state);
                debug!("Loading {key:?}");

                match self.run_loader(&key).await {
                    Ok(LoaderOutcome { resource, unloader }) => {
                        transition.finish(EntryState::Ready {
                            resource: resource.clone(),
                            refcount: 1,
                            unloader,
                        });
                        trace!("{key:?}: ready");
                        return Ok(resource);
                    }
                    Err(cause) => {
                        let err = LoaderError::load_failed(describe_key(&key), cause);
                        error!("{err}");
                        transition.finish(EntryState::Failed(err.clone()));
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn run_loader<K>(&self, key: &K) -> Result<LoaderOutcome<K::Resource>>
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        let routine = panic::catch_unwind(AssertUnwindSafe(|| D::load(self.clone(), key.clone())))
            .map_err(|payload| LoaderError::panicked(&*payload))?;
        AssertUnwindSafe(routine)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(LoaderError::panicked(&*payload)))
    }

    /// Releases one reference to `key`. The last release runs the unloader
    /// captured at load time and removes the entry.
    ///
    /// # Errors
    ///
    /// - [`LoaderError::DoubleUnload`] if `key` holds no references.
    /// - [`LoaderError::UnloadFailure`] if the unloader failed or panicked. The
    ///   entry is removed regardless.
    pub fn unload_resource<'a, K>(&'a self, key: &'a K) -> impl Future<Output = Result<()>> + Send + 'a
    where
        D: LoadsKey<K>,
        K: ResourceKey,
    {
        async move {
            let store = D::store(&self.shared.stores);
            loop {
                let Some(slot) = store.existing_slot(key) else {
                    warn!("Unload of {key:?} without a matching load");
                    return Err(LoaderError::DoubleUnload {
                        key: describe_key(key),
                    });
                };
                let mut state = slot.state.lock().await;

                match std::mem::replace(&mut *state, EntryState::Unloading) {
                    EntryState::Ready {
                        resource,
                        refcount,
                        unloader,
                    } if refcount > 1 => {
                        *state = EntryState::Ready {
                            resource,
                            refcount: refcount - 1,
                            unloader,
                        };
                        trace!("{key:?}: reference released ({})", refcount - 1);
                        return Ok(());
                    }
                    EntryState::Ready {
                        resource, unloader, ..
                    } => {
                        let transition = Transition::new(store, key, &slot, state);
                        drop(resource);
                        debug!("Unloading {key:?}");

                        let result = match unloader {
                            Some(unloader) => run_unloader(unloader).await,
                            None => Ok(()),
                        };
                        transition.finish(EntryState::Removed);

                        return result.map_err(|cause| {
                            let err = LoaderError::unload_failed(describe_key(key), cause);
                            error!("{err}");
                            err
                        });
                    }
                    // Detached between lookup and lock; look again.
                    previous @ (EntryState::Removed | EntryState::Failed(_)) => {
                        *state = previous;
                    }
                    previous => {
                        *state = previous;
                        warn!("Unload of {key:?} without a matching load");
                        return Err(LoaderError::DoubleUnload {
                            key: describe_key(key),
                        });
                    }
                }
            }
        }
    }
}

async fn run_unloader(unloader: Unloader) -> Result<()> {
    AssertUnwindSafe(unloader)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(LoaderError::panicked(&*payload)))
}

/// Holds an entry's lock across a load or unload.
///
/// Dropping it without [`finish`](Self::finish), which happens when the
/// caller's future is cancelled, detaches the entry so it cannot be left in
/// `Loading` or `Unloading`.
struct Transition<'a, K: ResourceKey> {
    store: &'a ResourceStore<K>,
    key: &'a K,
    slot: &'a Arc<ResourceSlot<K::Resource>>,
    state: MutexGuard<'a, EntryState<K::Resource>>,
    armed: bool,
}

impl<'a, K: ResourceKey> Transition<'a, K> {
    fn new(
        store: &'a ResourceStore<K>,
        key: &'a K,
        slot: &'a Arc<ResourceSlot<K::Resource>>,
        state: MutexGuard<'a, EntryState<K::Resource>>,
    ) -> Self {
        Self {
            store,
            key,
            slot,
            state,
            armed: true,
        }
    }

    fn finish(mut self, next: EntryState<K::Resource>) {
        let detach = matches!(next, EntryState::Failed(_) | EntryState::Removed);
        *self.state = next;
        if detach {
            self.store.remove(self.key, self.slot);
        }
        self.armed = false;
    }
}

impl<K: ResourceKey> Drop for Transition<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                "{:?}: {} interrupted, entry discarded",
                self.key,
                self.state.label()
            );
            *self.state = EntryState::Removed;
            self.store.remove(self.key, self.slot);
        }
    }
}
