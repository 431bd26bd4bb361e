//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for one working tree.
///
/// This struct represents the contents of `.locksync/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Backend settings
    // =========================================================================
    /// Which tool answers queries.
    #[serde(default)]
    pub backend: BackendKind,

    /// Command line used to run git (e.g. `git` or `wsl git`).
    #[serde(default = "default_git_program")]
    pub git_program: String,

    /// Lock owner name of the local user. Without it no lock is considered
    /// local and auto-lock is disabled.
    #[serde(default)]
    pub username: Option<String>,

    /// Whether lock tracking is enabled at all.
    #[serde(default = "default_true")]
    pub lfs_enabled: bool,

    // =========================================================================
    // Lock policy
    // =========================================================================
    /// Hold a shared handle on files locked by someone else.
    #[serde(default = "default_true")]
    pub prevent_edits_on_remote_lock: bool,

    /// Files matching these globs are locked when saved.
    #[serde(default = "default_auto_lock_globs")]
    pub auto_lock_globs: Vec<String>,

    // =========================================================================
    // Polling
    // =========================================================================
    /// Sleep between reconciliation cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Sleep used instead of a cycle while file state is volatile.
    #[serde(default = "default_volatile_backoff_ms")]
    pub volatile_backoff_ms: u64,

    #[serde(default = "default_diff_timeout_ms")]
    pub diff_timeout_ms: u64,

    #[serde(default = "default_untracked_timeout_ms")]
    pub untracked_timeout_ms: u64,

    #[serde(default = "default_lock_list_timeout_ms")]
    pub lock_list_timeout_ms: u64,

    #[serde(default = "default_lock_types_timeout_ms")]
    pub lock_types_timeout_ms: u64,

    #[serde(default = "default_lfs_probe_timeout_ms")]
    pub lfs_probe_timeout_ms: u64,

    /// Ancestor directories shorter than this are not marked modified.
    #[serde(default = "default_ancestor_floor_len")]
    pub ancestor_floor_len: usize,

    /// Stderr lines containing any of these are logged, not treated as failures.
    #[serde(default = "default_benign_stderr_patterns")]
    pub benign_stderr_patterns: Vec<String>,

    // =========================================================================
    // Persistence
    // =========================================================================
    /// Record store location, relative to the repository root.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            git_program: default_git_program(),
            username: None,
            lfs_enabled: default_true(),
            prevent_edits_on_remote_lock: default_true(),
            auto_lock_globs: default_auto_lock_globs(),
            poll_interval_ms: default_poll_interval_ms(),
            volatile_backoff_ms: default_volatile_backoff_ms(),
            diff_timeout_ms: default_diff_timeout_ms(),
            untracked_timeout_ms: default_untracked_timeout_ms(),
            lock_list_timeout_ms: default_lock_list_timeout_ms(),
            lock_types_timeout_ms: default_lock_types_timeout_ms(),
            lfs_probe_timeout_ms: default_lfs_probe_timeout_ms(),
            ancestor_floor_len: default_ancestor_floor_len(),
            benign_stderr_patterns: default_benign_stderr_patterns(),
            state_file: default_state_file(),
        }
    }
}
