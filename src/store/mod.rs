//! Key/value persistence for reconciled state.
//!
//! The engine only needs string get/set/has/delete. [`FileStore`] keeps a
//! JSON object on disk, [`MemoryStore`] is process-local, and [`ScopedStore`]
//! prefixes keys with a per-working-tree scope so several trees can share one
//! backing store without seeing each other's records.

mod file;
mod memory;

#[cfg(test)]
mod tests;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use std::path::Path;

/// String-keyed persistence without transactions or schema versioning.
pub trait RecordStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

/// Wraps a store and prefixes every key with a fixed scope.
#[derive(Debug)]
pub struct ScopedStore<S> {
    inner: S,
    prefix: String,
}

impl<S: RecordStore> ScopedStore<S> {
    pub fn new(inner: S, scope: &str) -> Self {
        Self {
            inner,
            prefix: format!("locksync:{}:", scope),
        }
    }

    /// Scope keys to the working tree rooted at `repo_root`.
    pub fn for_repo(inner: S, repo_root: &Path) -> Self {
        let root = repo_root
            .canonicalize()
            .unwrap_or_else(|_| repo_root.to_path_buf());
        Self::new(inner, &crate::paths::normalize(&root.to_string_lossy()))
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<S: RecordStore> RecordStore for ScopedStore<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(&self.scoped(key), value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(&self.scoped(key))
    }
}
