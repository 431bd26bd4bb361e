//! Shared test fixtures: throwaway git repositories and in-memory fakes of
//! the backend, the command runner and the notifier.

use crate::cancel::CancelToken;
use crate::config::BackendKind;
use crate::engine::{Notice, Notifier};
use crate::error::{LockSyncError, Result};
use crate::vcs::{CommandRunner, LockBackend, LockCall, LockEntry, LockListing, LockSupport, QueryOutcome};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // The working directory is process-global; serialize tests that change it.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// A repository with one commit containing `README.md`.
pub(crate) fn create_test_repo() -> TempDir {
    create_test_repo_with(&[])
}

/// A repository whose first commit contains README.md plus `files`.
pub(crate) fn create_test_repo_with(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);
    git(path, &["config", "core.autocrlf", "false"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    for (name, content) in files {
        let file = path.join(name);
        if let Some(dir) = file.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(file, content).unwrap();
    }
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
}

// =============================================================================
// ScriptedRunner
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Script {
    stdout: Vec<String>,
    stderr: Vec<String>,
    hang: bool,
}

/// A [`CommandRunner`] that answers from canned replies keyed by the
/// space-joined argument list. Unknown commands print nothing.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, args: &str, stdout: &[&str]) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(args.to_string()).or_default().stdout =
            stdout.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn respond_err(&self, args: &str, stderr: &[&str]) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(args.to_string()).or_default().stderr =
            stderr.iter().map(|s| s.to_string()).collect();
    }

    /// Make `args` run until aborted.
    pub(crate) fn hang(&self, args: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(args.to_string()).or_default().hang = true;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        args: &[&str],
        abort: &mut dyn FnMut(Duration) -> bool,
        on_output: &mut dyn FnMut(&str),
        on_error: &mut dyn FnMut(&str) -> bool,
    ) -> Result<QueryOutcome> {
        let key = args.join(" ");
        self.calls.lock().unwrap().push(key.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default();

        if script.hang {
            // Simulated clock: each poll advances 100ms.
            let mut elapsed = Duration::ZERO;
            while !abort(elapsed) {
                elapsed += Duration::from_millis(100);
                assert!(elapsed < Duration::from_secs(3600), "{} never aborted", key);
            }
            return Ok(QueryOutcome::Aborted);
        }

        let mut failed = false;
        for line in &script.stderr {
            failed |= on_error(line);
        }
        if failed {
            return Ok(QueryOutcome::Failed);
        }
        for line in &script.stdout {
            on_output(line);
        }
        Ok(QueryOutcome::Completed)
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }
}

// =============================================================================
// FakeBackend
// =============================================================================

#[derive(Debug)]
struct FakeState {
    locks: Vec<LockEntry>,
    changed: Vec<String>,
    untracked: Vec<String>,
    patterns: Vec<String>,
    support: LockSupport,
    lock_reply: LockCall,
    unlock_reply: LockCall,
    listing_fails: bool,
    list_calls: usize,
    lock_requests: Vec<Vec<String>>,
    reverted: Vec<String>,
}

/// An in-memory [`LockBackend`] for engine tests. A successful lock adds
/// the paths to the remote listing under `user`.
pub(crate) struct FakeBackend {
    root: PathBuf,
    user: String,
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new(root: &Path, user: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            user: user.to_string(),
            state: Mutex::new(FakeState {
                locks: Vec::new(),
                changed: Vec::new(),
                untracked: Vec::new(),
                patterns: Vec::new(),
                support: LockSupport::Available,
                lock_reply: LockCall::Succeeded,
                unlock_reply: LockCall::Succeeded,
                listing_fails: false,
                list_calls: 0,
                lock_requests: Vec::new(),
                reverted: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_locks(&self, locks: &[(&str, &str)]) {
        self.state().locks = locks
            .iter()
            .map(|(path, owner)| LockEntry::new(*path, *owner))
            .collect();
    }

    pub(crate) fn set_changed(&self, files: &[&str]) {
        self.state().changed = files.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn set_untracked(&self, files: &[&str]) {
        self.state().untracked = files.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn set_patterns(&self, patterns: &[&str]) {
        self.state().patterns = patterns.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn set_support(&self, support: LockSupport) {
        self.state().support = support;
    }

    pub(crate) fn reply_to_lock(&self, reply: LockCall) {
        self.state().lock_reply = reply;
    }

    pub(crate) fn reply_to_unlock(&self, reply: LockCall) {
        self.state().unlock_reply = reply;
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        self.state().listing_fails = fail;
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub(crate) fn lock_requests(&self) -> Vec<Vec<String>> {
        self.state().lock_requests.clone()
    }

    pub(crate) fn reverted(&self) -> Vec<String> {
        self.state().reverted.clone()
    }
}

impl LockBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GitLfs
    }

    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn probe(&self) -> LockSupport {
        self.state().support
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        Ok(self.state().changed.clone())
    }

    fn untracked_files(&self) -> Result<Vec<String>> {
        Ok(self.state().untracked.clone())
    }

    fn list_locks(&self) -> Result<LockListing> {
        let mut state = self.state();
        state.list_calls += 1;
        if state.listing_fails {
            return Err(LockSyncError::Timeout {
                command: "git lfs locks".to_string(),
                timeout: Duration::from_secs(5),
            });
        }
        Ok(LockListing {
            entries: state.locks.clone(),
            skipped: 0,
        })
    }

    fn lockable_patterns(&self) -> Result<Vec<String>> {
        Ok(self.state().patterns.clone())
    }

    fn lock(&self, paths: &[String], cancel: &CancelToken) -> LockCall {
        let mut state = self.state();
        state.lock_requests.push(paths.to_vec());
        if cancel.is_cancelled() {
            return LockCall::Cancelled;
        }
        let reply = state.lock_reply.clone();
        if reply == LockCall::Succeeded {
            state.locks.retain(|l| !paths.contains(&l.path));
            for path in paths {
                state.locks.push(LockEntry::new(path.clone(), self.user.clone()));
            }
        }
        reply
    }

    fn unlock(&self, paths: &[String], cancel: &CancelToken) -> LockCall {
        let mut state = self.state();
        if cancel.is_cancelled() {
            return LockCall::Cancelled;
        }
        let reply = state.unlock_reply.clone();
        if reply == LockCall::Succeeded {
            state.locks.retain(|l| !paths.contains(&l.path));
        }
        reply
    }

    fn revert(&self, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        state.reverted.extend(paths.iter().cloned());
        state.changed.retain(|c| !paths.contains(c));
        Ok(())
    }
}

// =============================================================================
// RecordingNotifier
// =============================================================================

/// Keeps every notice for later assertions.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
