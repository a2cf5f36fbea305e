use std::fmt;
use std::future::Future;

use bainangua_core::Result;
use futures::FutureExt;
use futures::future::BoxFuture;

/// Deferred teardown captured at load time.
///
/// Futures are lazy, so nothing runs until the cache polls the unloader after
/// the last reference is released.
pub type Unloader = BoxFuture<'static, Result<()>>;

/// What a loader function returns.
pub type LoaderRoutine<V> = BoxFuture<'static, Result<LoaderOutcome<V>>>;

/// A loaded resource plus the action that releases it.
pub struct LoaderOutcome<V> {
    pub resource: V,
    pub unloader: Option<Unloader>,
}

impl<V> LoaderOutcome<V> {
    /// A resource that needs no teardown.
    #[inline]
    pub fn new(resource: V) -> Self {
        Self {
            resource,
            unloader: None,
        }
    }

    /// Attaches the teardown. It usually unloads the dependency keys the
    /// loader acquired, in reverse order.
    #[must_use]
    pub fn with_unloader<F>(mut self, unloader: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.unloader = Some(unloader.boxed());
        self
    }
}

impl<V: fmt::Debug> fmt::Debug for LoaderOutcome<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOutcome")
            .field("resource", &self.resource)
            .field("has_unloader", &self.unloader.is_some())
            .finish()
    }
}
