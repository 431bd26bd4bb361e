//! JSON-file backed record store.

use super::RecordStore;
use crate::error::{LockSyncError, Result};
use crate::fs::atomic_write_file;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Stores all records as one JSON object of string values.
///
/// The file is read lazily on first access and rewritten atomically on every
/// mutation. An unreadable or unparseable file is treated as empty; the next
/// write replaces it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    "[store] failed to read '{}', starting empty: {}",
                    self.path.display(),
                    e
                );
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(
                "[store] '{}' is not a valid record file, starting empty: {}",
                self.path.display(),
                e
            );
            BTreeMap::new()
        })
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> T {
        let mut guard = self.entries.lock();
        let entries = guard.get_or_insert_with(|| self.load());
        f(entries)
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            LockSyncError::PersistenceError(format!("failed to serialize records: {}", e))
        })?;
        atomic_write_file(&self.path, &json)
    }
}

impl RecordStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
            self.write(entries)
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            if entries.remove(key).is_some() {
                self.write(entries)
            } else {
                Ok(())
            }
        })
    }
}
