//! Background reconciliation.
//!
//! The worker queries the backend and stages results on the update queue. It
//! never touches the tables directly: every staged action re-checks the
//! fingerprint captured before its query when the consumer applies it.

use super::EngineState;
use super::queue::UpdateQueue;
use super::tables::ModifiedPathSet;
use crate::cancel::CancelToken;
use crate::error::{LockSyncError, Result};
use crate::vcs::LockBackend;
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What one cycle queries. `Full` covers everything `ModifiedOnly` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CycleScope {
    ModifiedOnly,
    Full,
}

/// What a cycle staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub modified_staged: bool,
    pub locks_staged: bool,
}

/// Query changed and untracked files. Failed queries are logged and
/// contribute nothing.
pub(crate) fn collect_modified(backend: &dyn LockBackend, floor: usize) -> ModifiedPathSet {
    let mut files = backend.changed_files().unwrap_or_else(|e| {
        tracing::warn!("[reconcile] changed-file query failed: {}", e);
        Vec::new()
    });
    match backend.untracked_files() {
        Ok(untracked) => files.extend(untracked),
        Err(e) => tracing::warn!("[reconcile] untracked-file query failed: {}", e),
    }
    ModifiedPathSet::from_files(files, floor)
}

/// Runs reconciliation cycles against one engine state.
#[derive(Clone)]
pub(crate) struct Reconciler {
    pub(crate) state: Arc<EngineState>,
    queue: Arc<UpdateQueue<EngineState>>,
}

impl Reconciler {
    pub(crate) fn new(state: Arc<EngineState>, queue: Arc<UpdateQueue<EngineState>>) -> Self {
        Self { state, queue }
    }

    /// Query and stage one cycle. Never applies anything itself.
    pub(crate) fn run_cycle(&self, scope: CycleScope, cancel: &CancelToken) -> CycleReport {
        let mut report = CycleReport::default();
        if cancel.is_cancelled() {
            return report;
        }

        report.modified_staged = self.stage_modified();

        if scope == CycleScope::Full && !cancel.is_cancelled() {
            report.locks_staged = self.stage_locks();
        }

        tracing::debug!("[reconcile] {:?} cycle staged {:?}", scope, report);
        report
    }

    fn stage_modified(&self) -> bool {
        let captured = self.state.modified_fingerprint();
        let candidate = collect_modified(self.state.backend.as_ref(), self.state.floor);
        self.queue.enqueue("modified paths", move |state: &EngineState| {
            state.apply_modified(captured, candidate)
        });
        true
    }

    fn stage_locks(&self) -> bool {
        if !self.state.lfs_available() {
            return false;
        }

        let captured = self.state.lock_fingerprint();
        match self.state.backend.list_locks() {
            Ok(listing) => {
                if listing.skipped > 0 {
                    tracing::warn!(
                        "[reconcile] {} lock line(s) could not be parsed",
                        listing.skipped
                    );
                }
                self.queue.enqueue("lock table", move |state: &EngineState| {
                    state.apply_locks(captured, listing.entries)
                });
                true
            }
            Err(e) => {
                // Staging an empty table here would drop every known lock.
                tracing::warn!("[reconcile] lock query failed, keeping current table: {}", e);
                false
            }
        }
    }
}

/// Wakes the worker early, optionally asking for a particular cycle.
#[derive(Default)]
pub(crate) struct WorkerSignal {
    pending: Mutex<Option<CycleScope>>,
    condvar: Condvar,
}

impl WorkerSignal {
    pub(crate) fn wake(&self, scope: CycleScope) {
        let mut pending = self.pending.lock();
        *pending = Some(pending.map_or(scope, |current| current.max(scope)));
        self.condvar.notify_one();
    }

    /// Wake a waiting worker without requesting a cycle.
    pub(crate) fn interrupt(&self) {
        let _pending = self.pending.lock();
        self.condvar.notify_all();
    }

    /// Sleep up to `timeout`. Returns the requested scope if woken by
    /// [`wake`](Self::wake).
    pub(crate) fn wait(&self, timeout: Duration, cancel: &CancelToken) -> Option<CycleScope> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while pending.is_none() && !cancel.is_cancelled() {
            if self.condvar.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        pending.take()
    }
}

/// The background thread running [`Reconciler`] cycles.
pub(crate) struct Worker {
    reconciler: Reconciler,
    signal: Arc<WorkerSignal>,
    cancel: CancelToken,
    interval: Duration,
    volatile_backoff: Duration,
}

impl Worker {
    pub(crate) fn new(
        reconciler: Reconciler,
        signal: Arc<WorkerSignal>,
        cancel: CancelToken,
        interval: Duration,
        volatile_backoff: Duration,
    ) -> Self {
        Self {
            reconciler,
            signal,
            cancel,
            interval,
            volatile_backoff,
        }
    }

    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("locksync-reconcile".to_string())
            .spawn(move || self.run())
            .map_err(|e| {
                LockSyncError::UserError(format!("failed to start reconciliation worker: {}", e))
            })
    }

    fn run(self) {
        tracing::info!("[reconcile] worker started (interval {:?})", self.interval);
        let mut scope = CycleScope::Full;

        while !self.cancel.is_cancelled() {
            if self.reconciler.state.is_volatile() {
                if let Some(requested) = self.signal.wait(self.volatile_backoff, &self.cancel) {
                    scope = scope.max(requested);
                }
                continue;
            }

            let cycle = catch_unwind(AssertUnwindSafe(|| {
                self.reconciler.run_cycle(scope, &self.cancel)
            }));
            if cycle.is_err() {
                tracing::error!("[reconcile] cycle panicked, continuing");
            }

            scope = self
                .signal
                .wait(self.interval, &self.cancel)
                .unwrap_or(CycleScope::Full);
        }

        self.reconciler.state.finish();
        tracing::info!("[reconcile] worker stopped");
    }
}
