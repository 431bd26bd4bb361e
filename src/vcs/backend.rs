//! The interface the engine uses to talk to one version-control tool.

use crate::cancel::CancelToken;
use crate::config::BackendKind;
use crate::error::Result;
use std::path::Path;

/// One `(path, owner)` pair reported by the remote lock listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub path: String,
    pub owner: String,
}

impl LockEntry {
    pub fn new(path: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
        }
    }
}

/// Result of a lock listing: parsed entries plus the number of lines dropped
/// because they could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockListing {
    pub entries: Vec<LockEntry>,
    pub skipped: usize,
}

/// Whether lock tracking is usable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSupport {
    Available,
    /// The tool answered that the locking extension is not installed.
    Missing,
    /// The probe itself failed or timed out; keep the previous verdict.
    Unknown,
}

/// Outcome of a direct lock or unlock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCall {
    /// Every requested path was (un)locked.
    Succeeded,
    /// Rejected for a recognised reason; local and remote state still agree.
    Refused(String),
    /// Failed for an unrecognised reason; remote state may have diverged.
    Ambiguous(String),
    /// Cancelled by the caller; the subprocess was terminated.
    Cancelled,
}

/// A version-control tool that can report modified files and file locks.
pub trait LockBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Absolute repository root; all reported paths are relative to it.
    fn repo_root(&self) -> &Path;

    /// Check that lock support is installed.
    fn probe(&self) -> LockSupport;

    /// Tracked files with uncommitted changes that still exist on disk.
    fn changed_files(&self) -> Result<Vec<String>>;

    /// Untracked, non-ignored files.
    fn untracked_files(&self) -> Result<Vec<String>>;

    /// Current remote lock listing.
    fn list_locks(&self) -> Result<LockListing>;

    /// Patterns of files that may be locked (e.g. `*.psd`).
    fn lockable_patterns(&self) -> Result<Vec<String>>;

    fn lock(&self, paths: &[String], cancel: &CancelToken) -> LockCall;

    fn unlock(&self, paths: &[String], cancel: &CancelToken) -> LockCall;

    /// Restore tracked files to their committed content.
    fn revert(&self, paths: &[String]) -> Result<()>;
}
