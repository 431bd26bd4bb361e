//! Lock and modification reconciliation engine.
//!
//! [`LockEngine`] owns the lock table and the modified-path set. A background
//! worker polls the backend and stages results on an [`UpdateQueue`]; the
//! consumer thread applies at most one staged update per [`LockEngine::tick`].
//! Direct lock and unlock requests run synchronously on the consumer thread
//! and update the tables immediately.

pub mod fingerprint;
pub mod handle;
pub mod notify;
pub mod queue;
pub mod reconcile;
pub mod snapshot;
pub mod tables;


pub use fingerprint::Fingerprint;
pub use notify::{LogNotifier, Notice, Notifier};
pub use queue::UpdateQueue;
pub use reconcile::{CycleReport, CycleScope};
pub use snapshot::{ProcessIdentity, SnapshotLoad};
pub use tables::{LockRecord, LockTable, ModifiedPathSet};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{LockSyncError, Result};
use crate::paths::{build_glob_set, build_glob_set_lenient, normalize};
use crate::store::RecordStore;
use crate::vcs::{LockBackend, LockCall, LockEntry, LockSupport};
use globset::GlobSet;
use handle::ExclusiveHandle;
use parking_lot::{Mutex, RwLock};
use reconcile::{Reconciler, Worker, WorkerSignal, collect_modified};
use snapshot::{load_snapshot, save_snapshot};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tables::RecordTables;

/// Engine behaviour derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub local_owner: Option<String>,
    pub lfs_enabled: bool,
    pub prevent_edits_on_remote_lock: bool,
    pub auto_lock_globs: Vec<String>,
    pub poll_interval: Duration,
    pub volatile_backoff: Duration,
    pub ancestor_floor_len: usize,
    pub identity: ProcessIdentity,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            local_owner: config.username.clone(),
            lfs_enabled: config.lfs_enabled,
            prevent_edits_on_remote_lock: config.prevent_edits_on_remote_lock,
            auto_lock_globs: config.auto_lock_globs.clone(),
            poll_interval: config.poll_interval(),
            volatile_backoff: config.volatile_backoff(),
            ancestor_floor_len: config.ancestor_floor_len,
            identity: ProcessIdentity::current(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A lock as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockView {
    pub path: String,
    pub owner: String,
    /// Held by the configured local owner.
    pub local: bool,
}

/// How [`LockEngine::restore`] populated the lock table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The snapshot was written by this process and was loaded as is.
    Restored { locks: usize },
    /// The snapshot could not be trusted; the table was queried afresh.
    Rebuilt { reason: SnapshotLoad },
}

/// State shared between the consumer and the worker.
pub(crate) struct EngineState {
    pub(crate) backend: Arc<dyn LockBackend>,
    store: Arc<dyn RecordStore>,
    tables: Mutex<RecordTables>,
    identity: ProcessIdentity,
    local_owner: Option<String>,
    prevent_edits: bool,
    pub(crate) floor: usize,
    volatile: AtomicBool,
    lfs_available: AtomicBool,
    lockable: RwLock<GlobSet>,
}

impl EngineState {
    fn is_local(&self, owner: &str) -> bool {
        self.local_owner.as_deref() == Some(owner)
    }

    pub(crate) fn lfs_available(&self) -> bool {
        self.lfs_available.load(Ordering::SeqCst)
    }

    pub(crate) fn is_volatile(&self) -> bool {
        self.volatile.load(Ordering::SeqCst)
    }

    pub(crate) fn lock_fingerprint(&self) -> Fingerprint {
        self.tables.lock().locks.fingerprint()
    }

    pub(crate) fn modified_fingerprint(&self) -> Fingerprint {
        self.tables.lock().modified.fingerprint()
    }

    /// Replace the lock table with `entries` if it still matches `captured`.
    pub(crate) fn apply_locks(&self, captured: Fingerprint, entries: Vec<LockEntry>) -> Result<()> {
        self.swap_locks(LockTable::from_entries(entries), Some(captured))
    }

    /// Replace the modified set with `candidate` if it still matches `captured`.
    pub(crate) fn apply_modified(
        &self,
        captured: Fingerprint,
        candidate: ModifiedPathSet,
    ) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.modified.fingerprint() != captured {
            tracing::warn!("[reconcile] modified set changed during query, discarding update");
            return Ok(());
        }
        tables.modified = candidate;
        Ok(())
    }

    fn set_modified(&self, modified: ModifiedPathSet) {
        self.tables.lock().modified = modified;
    }

    /// Replace the lock table unconditionally.
    fn install_locks(&self, entries: Vec<LockEntry>) -> Result<()> {
        self.swap_locks(LockTable::from_entries(entries), None)
    }

    fn swap_locks(&self, mut candidate: LockTable, guard: Option<Fingerprint>) -> Result<()> {
        let incoming = candidate.fingerprint();
        let previous = {
            let mut tables = self.tables.lock();
            let live = tables.locks.fingerprint();
            if let Some(captured) = guard
                && live != captured
            {
                tracing::warn!("[reconcile] lock table changed during query, discarding update");
                return Ok(());
            }
            if live == incoming {
                None
            } else {
                candidate.adopt_handles(&mut tables.locks);
                Some(std::mem::replace(&mut tables.locks, candidate))
            }
        };
        let Some(previous) = previous else {
            // Unchanged table: files that appeared since the last apply may
            // still need a guard.
            self.attach_handles();
            return Ok(());
        };
        tracing::info!(
            "[reconcile] lock table updated ({} -> {} locks)",
            previous.len(),
            incoming.len()
        );
        // Superseded handles close here, outside the table lock.
        drop(previous);

        self.attach_handles();
        self.persist_locks()
    }

    /// Open handles for remotely locked files that do not have one yet.
    fn attach_handles(&self) {
        if !self.prevent_edits {
            return;
        }
        let wanted: Vec<(String, String)> = self
            .tables
            .lock()
            .locks
            .iter()
            .filter(|r| !r.has_handle() && !self.is_local(&r.owner))
            .map(|r| (r.path.clone(), r.owner.clone()))
            .collect();
        if wanted.is_empty() {
            return;
        }

        let root = self.backend.repo_root();
        let opened: Vec<(String, String, ExclusiveHandle)> = wanted
            .into_iter()
            .filter_map(|(path, owner)| match ExclusiveHandle::acquire(&root.join(&path)) {
                Ok(handle) => Some((path, owner, handle)),
                Err(e) => {
                    tracing::debug!("[engine] no edit guard for {}: {}", path, e);
                    None
                }
            })
            .collect();

        let mut tables = self.tables.lock();
        for (path, owner, handle) in opened {
            tables.locks.attach_handle(&path, &owner, handle);
        }
    }

    pub(crate) fn persist_locks(&self) -> Result<()> {
        let entries = self.tables.lock().locks.entries();
        save_snapshot(&*self.store, &self.identity, &entries)
    }

    fn clear_locks(&self) -> Result<()> {
        let removed = self.tables.lock().locks.take_all();
        drop(removed);
        self.persist_locks()
    }

    /// Final flush on shutdown: persist the table, then release handles.
    pub(crate) fn finish(&self) {
        if let Err(e) = self.persist_locks() {
            tracing::warn!("[engine] final snapshot failed: {}", e);
        }
        let released = self.tables.lock().locks.release_handles();
        tracing::debug!("[engine] released {} edit guard(s)", released);
    }
}

#[derive(Debug, Clone, Copy)]
enum Direct {
    Lock,
    Unlock,
}

impl Direct {
    fn name(self) -> &'static str {
        match self {
            Direct::Lock => "lock",
            Direct::Unlock => "unlock",
        }
    }

    fn failure(self, paths: &[String], reason: String) -> Notice {
        let paths = paths.to_vec();
        match self {
            Direct::Lock => Notice::LockFailed { paths, reason },
            Direct::Unlock => Notice::UnlockFailed { paths, reason },
        }
    }
}

/// The reconciliation engine for one working tree.
///
/// Construct it on the consumer thread: `tick`, direct lock actions, `refresh`
/// and `discard_changes` refuse to run anywhere else.
pub struct LockEngine {
    state: Arc<EngineState>,
    queue: Arc<UpdateQueue<EngineState>>,
    notifier: Arc<dyn Notifier>,
    signal: Arc<WorkerSignal>,
    cancel: CancelToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    consumer: ThreadId,
    auto_lock: GlobSet,
    lfs_enabled: bool,
    poll_interval: Duration,
    volatile_backoff: Duration,
}

impl LockEngine {
    pub fn new(
        backend: Arc<dyn LockBackend>,
        store: Arc<dyn RecordStore>,
        settings: EngineSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let auto_lock = build_glob_set(&settings.auto_lock_globs)?;
        let state = Arc::new(EngineState {
            backend,
            store,
            tables: Mutex::new(RecordTables::default()),
            identity: settings.identity,
            local_owner: settings.local_owner,
            prevent_edits: settings.prevent_edits_on_remote_lock,
            floor: settings.ancestor_floor_len,
            volatile: AtomicBool::new(false),
            lfs_available: AtomicBool::new(settings.lfs_enabled),
            lockable: RwLock::new(GlobSet::empty()),
        });

        Ok(Self {
            state,
            queue: Arc::new(UpdateQueue::new()),
            notifier,
            signal: Arc::new(WorkerSignal::default()),
            cancel: CancelToken::new(),
            worker: Mutex::new(None),
            consumer: thread::current().id(),
            auto_lock,
            lfs_enabled: settings.lfs_enabled,
            poll_interval: settings.poll_interval,
            volatile_backoff: settings.volatile_backoff,
        })
    }

    fn ensure_consumer(&self, operation: &'static str) -> Result<()> {
        if thread::current().id() == self.consumer {
            return Ok(());
        }
        self.notifier.notify(&Notice::WrongThread { operation });
        Err(LockSyncError::WrongThread(operation.to_string()))
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.state.clone(), self.queue.clone())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Populate the tables at startup.
    ///
    /// A snapshot written by this same process is loaded directly. Any other
    /// snapshot (absent, unreadable, or from another process) forces a full
    /// rebuild from the backend.
    pub fn restore(&self) -> Result<RestoreOutcome> {
        self.ensure_consumer("restore")?;
        self.probe_lfs();
        self.refresh_lockable_patterns();

        match load_snapshot(&*self.state.store, &self.state.identity) {
            SnapshotLoad::Trusted(entries) => {
                let locks = entries.len();
                if self.state.lfs_available() {
                    self.state.install_locks(entries)?;
                }
                self.rebuild_modified();
                tracing::info!("[engine] restored {} lock(s) from snapshot", locks);
                Ok(RestoreOutcome::Restored { locks })
            }
            reason => {
                tracing::info!("[engine] rebuilding lock table: {:?}", reason);
                self.rebuild_locks()?;
                self.rebuild_modified();
                Ok(RestoreOutcome::Rebuilt { reason })
            }
        }
    }

    /// Start the background worker. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() || self.cancel.is_cancelled() {
            return Ok(());
        }
        let handle = Worker::new(
            self.reconciler(),
            self.signal.clone(),
            self.cancel.clone(),
            self.poll_interval,
            self.volatile_backoff,
        )
        .spawn()?;
        *worker = Some(handle);
        Ok(())
    }

    /// Stop the worker, wait for its final flush and release all handles.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.signal.interrupt();

        match self.worker.lock().take() {
            Some(handle) => {
                if handle.join().is_err() {
                    tracing::error!("[engine] reconciliation worker panicked");
                    self.state.finish();
                }
            }
            None => self.state.finish(),
        }
    }

    /// Apply at most one staged update. Returns true if one was applied.
    pub fn tick(&self) -> bool {
        if self.ensure_consumer("tick").is_err() {
            return false;
        }
        self.queue.drain_one(&self.state)
    }

    /// Run one full cycle on this thread and apply everything it staged.
    pub fn poll_once(&self) -> Result<CycleReport> {
        self.ensure_consumer("poll_once")?;
        let report = self.reconciler().run_cycle(CycleScope::Full, &self.cancel);
        while self.queue.drain_one(&self.state) {}
        Ok(report)
    }

    /// Rebuild everything now, dropping staged updates it supersedes.
    pub fn refresh(&self) -> Result<()> {
        self.ensure_consumer("refresh")?;
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!("[engine] refresh dropped {} staged update(s)", dropped);
        }
        self.probe_lfs();
        self.refresh_lockable_patterns();
        self.rebuild_modified();
        self.rebuild_locks()
    }

    /// Ask the worker for a full cycle without waiting for its interval.
    pub fn request_poll(&self) {
        self.signal.wake(CycleScope::Full);
    }

    /// A file changed on disk; re-poll the modified set.
    pub fn on_file_modified(&self) {
        self.signal.wake(CycleScope::ModifiedOnly);
    }

    /// Enter or leave a period where file state churns and polling is paused.
    pub fn set_volatile(&self, volatile: bool) {
        let was = self.state.volatile.swap(volatile, Ordering::SeqCst);
        if volatile && !was {
            if let Err(e) = self.state.persist_locks() {
                tracing::warn!("[engine] snapshot before volatile mode failed: {}", e);
            }
        } else if !volatile && was {
            self.request_poll();
        }
    }

    pub fn pending_updates(&self) -> usize {
        self.queue.len()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_locked(&self, path: &str) -> bool {
        self.state.tables.lock().locks.contains(&normalize(path))
    }

    pub fn is_locked_by_local_owner(&self, path: &str) -> bool {
        self.lock_owner(path)
            .is_some_and(|owner| self.state.is_local(&owner))
    }

    pub fn lock_owner(&self, path: &str) -> Option<String> {
        self.state
            .tables
            .lock()
            .locks
            .owner(&normalize(path))
            .map(str::to_string)
    }

    /// True for a modified file and for every directory containing one.
    pub fn is_modified(&self, path: &str) -> bool {
        self.state.tables.lock().modified.contains(&normalize(path))
    }

    /// True if the file type may be locked at all.
    pub fn is_lockable(&self, path: &str) -> bool {
        self.state.lockable.read().is_match(normalize(path))
    }

    pub fn lfs_available(&self) -> bool {
        self.state.lfs_available()
    }

    /// All locks, sorted by path.
    pub fn locks(&self) -> Vec<LockView> {
        let entries = self.state.tables.lock().locks.entries();
        entries
            .into_iter()
            .map(|e| LockView {
                local: self.state.is_local(&e.owner),
                path: e.path,
                owner: e.owner,
            })
            .collect()
    }

    /// Modified files (not their synthesized directories), sorted.
    pub fn modified_paths(&self) -> Vec<String> {
        self.state
            .tables
            .lock()
            .modified
            .files()
            .map(str::to_string)
            .collect()
    }

    // =========================================================================
    // Direct actions
    // =========================================================================

    pub fn acquire_lock(&self, paths: &[String]) -> bool {
        self.acquire_lock_with(paths, &CancelToken::new())
    }

    /// Lock `paths`, blocking until the backend answers or `cancel` fires.
    pub fn acquire_lock_with(&self, paths: &[String], cancel: &CancelToken) -> bool {
        let Some(paths) = self.prepare_direct("acquire_lock", paths) else {
            return false;
        };
        if paths.is_empty() {
            return true;
        }
        let Some(owner) = self.state.local_owner.clone() else {
            self.notifier.notify(&Notice::NoLocalOwner { action: "lock" });
            return false;
        };

        match self.state.backend.lock(&paths, cancel) {
            LockCall::Succeeded => {
                let replaced: Vec<LockRecord> = {
                    let mut tables = self.state.tables.lock();
                    paths
                        .iter()
                        .filter_map(|p| tables.locks.insert(LockRecord::new(p.clone(), owner.clone())))
                        .collect()
                };
                drop(replaced);
                tracing::info!("[engine] locked {}", paths.join(", "));
                self.persist_after(Direct::Lock);
                true
            }
            call => {
                self.direct_failed(Direct::Lock, &paths, call);
                false
            }
        }
    }

    pub fn release_lock(&self, paths: &[String]) -> bool {
        self.release_lock_with(paths, &CancelToken::new())
    }

    /// Unlock `paths`, blocking until the backend answers or `cancel` fires.
    pub fn release_lock_with(&self, paths: &[String], cancel: &CancelToken) -> bool {
        let Some(paths) = self.prepare_direct("release_lock", paths) else {
            return false;
        };
        if paths.is_empty() {
            return true;
        }

        match self.state.backend.unlock(&paths, cancel) {
            LockCall::Succeeded => {
                let removed: Vec<LockRecord> = {
                    let mut tables = self.state.tables.lock();
                    paths.iter().filter_map(|p| tables.locks.remove(p)).collect()
                };
                drop(removed);
                tracing::info!("[engine] unlocked {}", paths.join(", "));
                self.persist_after(Direct::Unlock);
                true
            }
            call => {
                self.direct_failed(Direct::Unlock, &paths, call);
                false
            }
        }
    }

    /// Lock a just-saved file if it matches the auto-lock globs and nobody
    /// holds it yet. Returns true if a lock was taken.
    pub fn on_file_saved(&self, path: &str) -> bool {
        if self.ensure_consumer("on_file_saved").is_err() {
            return false;
        }
        let path = normalize(path);
        if self.state.local_owner.is_none()
            || !self.state.lfs_available()
            || !self.auto_lock.is_match(&path)
            || self.is_locked(&path)
        {
            return false;
        }
        tracing::info!("[engine] auto-locking {}", path);
        self.acquire_lock(&[path])
    }

    /// Throw away local changes under `paths`.
    ///
    /// Paths expand to the modified files at or beneath them. Tracked files
    /// are restored from the repository, untracked files are deleted. Returns
    /// the files that were discarded.
    pub fn discard_changes(&self, paths: &[String]) -> Result<Vec<String>> {
        self.ensure_consumer("discard_changes")?;
        let targets: BTreeSet<String> = {
            let tables = self.state.tables.lock();
            paths
                .iter()
                .map(|p| normalize(p))
                .flat_map(|p| tables.modified.files_within(&p))
                .collect()
        };
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let untracked: HashSet<String> = self.state.backend.untracked_files()?.into_iter().collect();
        let (created, tracked): (Vec<String>, Vec<String>) =
            targets.iter().cloned().partition(|p| untracked.contains(p));

        self.state.backend.revert(&tracked)?;

        let root = self.state.backend.repo_root();
        for path in &created {
            match std::fs::remove_file(root.join(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(LockSyncError::UserError(format!(
                        "failed to delete '{}': {}",
                        path, e
                    )));
                }
            }
        }
        tracing::info!(
            "[engine] discarded {} tracked and {} untracked file(s)",
            tracked.len(),
            created.len()
        );

        self.rebuild_modified();
        Ok(targets.into_iter().collect())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Shared preconditions of direct actions. None means refuse.
    fn prepare_direct(&self, operation: &'static str, paths: &[String]) -> Option<Vec<String>> {
        self.ensure_consumer(operation).ok()?;
        if !self.state.lfs_available() {
            self.notifier.notify(&Notice::LocksUnavailable);
            return None;
        }
        let mut seen = HashSet::new();
        Some(
            paths
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty() && seen.insert(p.clone()))
                .collect(),
        )
    }

    fn persist_after(&self, action: Direct) {
        if let Err(e) = self.state.persist_locks() {
            tracing::warn!("[engine] snapshot after {} failed: {}", action.name(), e);
        }
    }

    fn direct_failed(&self, action: Direct, paths: &[String], call: LockCall) {
        match call {
            LockCall::Succeeded => {}
            LockCall::Refused(reason) => {
                tracing::warn!("[engine] {} refused: {}", action.name(), reason);
                self.notifier.notify(&action.failure(paths, reason));
            }
            LockCall::Ambiguous(reason) => {
                tracing::error!(
                    "[engine] {} failed for an unknown reason, re-reading locks: {}",
                    action.name(),
                    reason
                );
                self.notifier.notify(&action.failure(paths, reason));
                if let Err(e) = self.rebuild_locks() {
                    tracing::warn!("[engine] lock re-read failed: {}", e);
                    self.request_poll();
                }
            }
            LockCall::Cancelled => {
                self.notifier.notify(&Notice::Cancelled {
                    action: action.name(),
                    paths: paths.to_vec(),
                });
                // The server may have acted before the process was killed.
                self.request_poll();
            }
        }
    }

    fn probe_lfs(&self) {
        if !self.lfs_enabled {
            self.state.lfs_available.store(false, Ordering::SeqCst);
            return;
        }
        match self.state.backend.probe() {
            LockSupport::Available => self.state.lfs_available.store(true, Ordering::SeqCst),
            LockSupport::Missing => {
                if self.state.lfs_available.swap(false, Ordering::SeqCst) {
                    self.notifier.notify(&Notice::LocksUnavailable);
                }
                if let Err(e) = self.state.clear_locks() {
                    tracing::warn!("[engine] failed to clear locks: {}", e);
                }
            }
            LockSupport::Unknown => {
                tracing::debug!("[engine] lock support probe inconclusive, keeping previous state")
            }
        }
    }

    fn refresh_lockable_patterns(&self) {
        let patterns = if self.state.lfs_available() {
            self.state.backend.lockable_patterns().unwrap_or_else(|e| {
                tracing::warn!("[engine] lockable pattern query failed: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        *self.state.lockable.write() = build_glob_set_lenient(&patterns);
    }

    /// Replace the lock table with a fresh listing.
    fn rebuild_locks(&self) -> Result<()> {
        if !self.state.lfs_available() {
            return self.state.clear_locks();
        }
        let listing = self.state.backend.list_locks()?;
        if listing.skipped > 0 {
            tracing::warn!("[engine] {} lock line(s) could not be parsed", listing.skipped);
        }
        self.state.install_locks(listing.entries)
    }

    fn rebuild_modified(&self) {
        let modified = collect_modified(self.state.backend.as_ref(), self.state.floor);
        self.state.set_modified(modified);
    }
}

impl Drop for LockEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
