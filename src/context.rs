//! Repository context resolution for locksync.
//!
//! Finds the git repository root from any working directory and derives the
//! paths locksync keeps its own files under (`<root>/.locksync/`).

use crate::config::Config;
use crate::error::{LockSyncError, Result};
use crate::vcs::{CommandRunner, GitRunner, discover_root};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the repository root holding config and state.
pub const STATE_DIR: &str = ".locksync";

/// Time budget for `git rev-parse --show-toplevel`.
pub const ROOT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved paths for one working tree. All paths are absolute.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Absolute path to the repository root.
    pub repo_root: PathBuf,

    /// Absolute path to `{repo_root}/.locksync/`.
    pub state_dir: PathBuf,

    /// Directory the command was invoked from; user paths are relative to it.
    pub cwd: PathBuf,
}

impl RepoContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            LockSyncError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve the context from a specific directory using plain `git`.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Result<Self> {
        let cwd = cwd.as_ref();
        Self::resolve_with(cwd, &GitRunner::new(cwd))
    }

    /// Resolve the context asking `runner` for the repository root.
    pub fn resolve_with(cwd: &Path, runner: &dyn CommandRunner) -> Result<Self> {
        let reported = discover_root(runner, ROOT_QUERY_TIMEOUT)?;
        let repo_root = reported.canonicalize().unwrap_or(reported);
        let state_dir = repo_root.join(STATE_DIR);

        Ok(Self {
            repo_root,
            state_dir,
            cwd: cwd.to_path_buf(),
        })
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Load the config for this tree; a missing file yields defaults.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Convert user-supplied paths to canonical repository-relative form.
    pub fn repo_paths(&self, inputs: &[String]) -> Result<Vec<String>> {
        inputs
            .iter()
            .map(|input| crate::paths::to_repo_relative(&self.repo_root, &self.cwd, input))
            .collect()
    }
}
