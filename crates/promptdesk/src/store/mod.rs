//! Pluggable key-value persistence.
//!
//! Transcript logic only talks to [`KeyValueStore`]; swapping the bundled
//! [`MemoryStore`] or [`FileStore`] for a networked store needs no change
//! above this seam. Writes are last-write-wins with no schema versioning.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// String-keyed, string-valued store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Prefix this store applies to keys, if any.
    fn namespace(&self) -> Option<&str> {
        None
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn namespace(&self) -> Option<&str> {
        (**self).namespace()
    }
}

/// Wraps a store and prefixes every key with `"{namespace}:"`.
#[derive(Debug)]
pub struct Namespaced<S> {
    inner: S,
    namespace: String,
}

impl<S: KeyValueStore> Namespaced<S> {
    /// Prefix every key with `namespace`.
    pub fn new(inner: S, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: KeyValueStore> KeyValueStore for Namespaced<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(&self.key(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(&self.key(key))
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }
}
