//! Persisted copy of the lock table.
//!
//! The snapshot records which process wrote it. A snapshot written by the
//! current process (the host reloaded its code) is trusted. Anything else
//! is stale and the table is rebuilt from the backend.

use crate::error::{LockSyncError, Result};
use crate::store::RecordStore;
use crate::vcs::LockEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store key of the lock snapshot.
pub const SNAPSHOT_KEY: &str = "lfs-locked-files";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLock {
    pub path: String,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedLockSnapshot {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub locks: Vec<PersistedLock>,
}

/// Who wrote (or is reading) a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub host: Option<String>,
}

impl ProcessIdentity {
    pub fn new(pid: u32, host: Option<String>) -> Self {
        Self { pid, host }
    }

    /// Identity of the running process.
    pub fn current() -> Self {
        let host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());
        Self::new(std::process::id(), host)
    }

    fn wrote(&self, snapshot: &PersistedLockSnapshot) -> bool {
        self.pid == snapshot.pid && self.host == snapshot.host
    }
}

/// Result of reading the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLoad {
    Absent,
    /// Present but unparseable.
    Corrupt(String),
    /// Written by another process.
    ForeignProcess { pid: u32 },
    Trusted(Vec<LockEntry>),
}

impl SnapshotLoad {
    pub fn is_trusted(&self) -> bool {
        matches!(self, SnapshotLoad::Trusted(_))
    }
}

pub fn load_snapshot(store: &dyn RecordStore, identity: &ProcessIdentity) -> SnapshotLoad {
    let Some(raw) = store.get(SNAPSHOT_KEY) else {
        return SnapshotLoad::Absent;
    };

    let snapshot: PersistedLockSnapshot = match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("[snapshot] ignoring unreadable lock snapshot: {}", e);
            return SnapshotLoad::Corrupt(e.to_string());
        }
    };

    if !identity.wrote(&snapshot) {
        tracing::debug!(
            "[snapshot] written by pid {} (saved {}), rebuilding",
            snapshot.pid,
            snapshot.saved_at
        );
        return SnapshotLoad::ForeignProcess { pid: snapshot.pid };
    }

    SnapshotLoad::Trusted(
        snapshot
            .locks
            .into_iter()
            .map(|l| LockEntry::new(l.path, l.owner))
            .collect(),
    )
}

pub fn save_snapshot(
    store: &dyn RecordStore,
    identity: &ProcessIdentity,
    entries: &[LockEntry],
) -> Result<()> {
    let snapshot = PersistedLockSnapshot {
        pid: identity.pid,
        host: identity.host.clone(),
        saved_at: Utc::now(),
        locks: entries
            .iter()
            .map(|e| PersistedLock {
                path: e.path.clone(),
                owner: e.owner.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string(&snapshot).map_err(|e| {
        LockSyncError::PersistenceError(format!("failed to serialize lock snapshot: {}", e))
    })?;
    store.set(SNAPSHOT_KEY, &json)
}
