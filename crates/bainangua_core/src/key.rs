//! Resource keys.
//!
//! A key identifies one cache entry. Its Rust type selects the store partition
//! and the loader function; its value selects the entry inside that partition.
//! Two keys name the same entry iff they have the same concrete type and
//! compare equal.

use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A lookup value tagged with the type of resource it produces.
pub trait ResourceKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// The value handed back by `load_resource` for this key.
    type Resource: Clone + Send + Sync + 'static;
}

/// Generic key pairing a plain value `K` with a resource type `V`.
///
/// Equality and hashing only look at `key`; `V` exists purely at the type
/// level so that `SingleResourceKey<i32, A>` and `SingleResourceKey<i32, B>`
/// are different key types with separate stores.
pub struct SingleResourceKey<K, V> {
    pub key: K,
    marker: PhantomData<fn() -> V>,
}

impl<K, V> SingleResourceKey<K, V> {
    #[inline]
    #[must_use]
    pub const fn new(key: K) -> Self {
        Self {
            key,
            marker: PhantomData,
        }
    }
}

impl<K, V> From<K> for SingleResourceKey<K, V> {
    fn from(key: K) -> Self {
        Self::new(key)
    }
}

impl<K: Clone, V> Clone for SingleResourceKey<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<K: Copy, V> Copy for SingleResourceKey<K, V> {}

impl<K: PartialEq, V> PartialEq for SingleResourceKey<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V> Eq for SingleResourceKey<K, V> {}

impl<K: Hash, V> Hash for SingleResourceKey<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: Debug, V> Debug for SingleResourceKey<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{:?}>", short_type_name::<V>(), self.key)
    }
}

impl<K, V> ResourceKey for SingleResourceKey<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Resource = V;
}

/// Human readable description of a key, used in logs and error messages.
#[must_use]
pub fn describe_key<K: ResourceKey>(key: &K) -> String {
    format!("{key:?}")
}

// `alloc::vec::Vec<u8>` -> `Vec<u8>`
fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (index, ch) in full.char_indices() {
        match ch {
            ':' => segment_start = index + 1,
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&full[segment_start..index]);
                out.push(ch);
                segment_start = index + 1;
            }
            _ => {}
        }
    }
    out.push_str(&full[segment_start..]);
    out
}
