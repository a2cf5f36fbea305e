//! Loader Directory
//!
//! Binds every key type to its loader function and its store.
//!
//! # Overview
//!
//! A directory is a zero-sized marker type. The set of keys it accepts is the
//! set of [`LoadsKey`] impls it has, so asking a loader for a key type that is
//! not registered is a compile error rather than a runtime lookup failure.
//! The storage for all key types is the associated [`StoreSet`], one
//! [`ResourceStore`] field per key type.
//!
//! # Usage
//!
//! ```rust,ignore
//! bainangua_loader::loader_directory! {
//!     pub struct GameLoaders {
//!         context: GameContext,
//!         stores: GameStores,
//!         shaders: ShaderFileKey => shader_loader,
//!         textures: TextureKey => texture_loader,
//!     }
//! }
//!
//! let loader = ResourceLoader::new(context, GameLoaders);
//! ```

use bainangua_core::ResourceKey;

use crate::loader::ResourceLoader;
use crate::outcome::LoaderRoutine;
use crate::store::ResourceStore;

/// Storage for every key type a directory serves.
pub trait StoreSet: Default + Send + Sync + 'static {
    /// Total number of entries across all stores.
    fn measure_load(&self) -> usize;

    /// Descriptions of every entry still present.
    fn outstanding(&self) -> Vec<String>;
}

/// Ties a context type to a [`StoreSet`].
pub trait LoaderDirectory: Sized + Send + Sync + 'static {
    /// Shared, read-only value handed to every loader function.
    type Context: Send + Sync + 'static;
    type Stores: StoreSet;
}

/// Registers the loader function for key type `K`.
pub trait LoadsKey<K: ResourceKey>: LoaderDirectory {
    /// The partition holding entries of type `K`.
    fn store(stores: &Self::Stores) -> &ResourceStore<K>;

    /// Builds the resource for `key`. The loader handle lets the function
    /// request dependencies and capture them in its unloader.
    fn load(loader: ResourceLoader<Self>, key: K) -> LoaderRoutine<K::Resource>;
}

/// Creates empty storage for `directory`.
#[must_use]
pub fn create_loader_storage<D: LoaderDirectory>(_directory: &D) -> D::Stores {
    D::Stores::default()
}

/// Declares a loader directory.
///
/// Generates the marker struct, a stores struct with one
/// [`ResourceStore`] field per key type, and the [`LoaderDirectory`],
/// [`StoreSet`] and [`LoadsKey`] impls. Each loader path must name a
/// function `fn(ResourceLoader<Dir>, Key) -> LoaderRoutine<Key::Resource>`.
/// Listing the same key type twice produces conflicting impls.
#[macro_export]
macro_rules! loader_directory {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            context: $context:ty,
            stores: $stores:ident,
            $($field:ident : $key:ty => $loader:path),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        #[derive(Debug, Default)]
        $vis struct $stores {
            $(pub $field: $crate::ResourceStore<$key>,)*
        }

        impl $crate::StoreSet for $stores {
            fn measure_load(&self) -> usize {
                0 $(+ self.$field.len())*
            }

            fn outstanding(&self) -> ::std::vec::Vec<::std::string::String> {
                #[allow(unused_mut)]
                let mut all = ::std::vec::Vec::new();
                $(all.extend(self.$field.outstanding());)*
                all
            }
        }

        impl $crate::LoaderDirectory for $name {
            type Context = $context;
            type Stores = $stores;
        }

        $(
            impl $crate::LoadsKey<$key> for $name {
                fn store(stores: &$stores) -> &$crate::ResourceStore<$key> {
                    &stores.$field
                }

                fn load(
                    loader: $crate::ResourceLoader<Self>,
                    key: $key,
                ) -> $crate::LoaderRoutine<<$key as $crate::ResourceKey>::Resource> {
                    $loader(loader, key)
                }
            }
        )*
    };
}
