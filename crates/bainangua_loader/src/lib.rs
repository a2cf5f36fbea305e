//! Typed, reference-counted asynchronous resource cache.
//!
//! Resources are requested by key. The key's type picks the store and the
//! loader function; the loader runs once per key no matter how many requests
//! arrive concurrently, and may itself request further keys. Releasing the
//! last reference runs the teardown captured at load time, which in turn
//! releases those dependencies.
//!
//! See [`ResourceLoader`] for the request API and [`loader_directory!`] for
//! registering loader functions.

pub mod directory;
pub mod loader;
pub mod outcome;
pub mod store;

pub use bainangua_core::{LoaderError, ResourceKey, Result, SingleResourceKey, describe_key};
pub use directory::{LoaderDirectory, LoadsKey, StoreSet, create_loader_storage};
pub use loader::ResourceLoader;
pub use outcome::{LoaderOutcome, LoaderRoutine, Unloader};
pub use store::ResourceStore;
