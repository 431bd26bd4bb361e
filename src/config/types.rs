//! Configuration types and defaults for locksync.

use serde::{Deserialize, Serialize};

/// Which external tool answers lock and modification queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// `git` for modifications, `git lfs` for locks.
    #[default]
    GitLfs,
}

impl BackendKind {
    /// Parse a backend name from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "git_lfs" => Some(Self::GitLfs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitLfs => "git_lfs",
        }
    }
}

/// Default globs for files that are locked automatically when saved.
pub fn default_auto_lock_globs() -> Vec<String> {
    vec!["*.unity".to_string()]
}

/// Default stderr substrings that do not make a query fail.
pub fn default_benign_stderr_patterns() -> Vec<String> {
    vec!["warning".to_string(), "line endings".to_string()]
}

pub(crate) fn default_git_program() -> String {
    "git".to_string()
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    10_000
}
pub(crate) fn default_volatile_backoff_ms() -> u64 {
    100
}
pub(crate) fn default_diff_timeout_ms() -> u64 {
    5_000
}
pub(crate) fn default_untracked_timeout_ms() -> u64 {
    500
}
pub(crate) fn default_lock_list_timeout_ms() -> u64 {
    5_000
}
pub(crate) fn default_lock_types_timeout_ms() -> u64 {
    2_000
}
pub(crate) fn default_lfs_probe_timeout_ms() -> u64 {
    10_000
}
pub(crate) fn default_ancestor_floor_len() -> usize {
    1
}
pub(crate) fn default_state_file() -> String {
    ".locksync/state.json".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}
