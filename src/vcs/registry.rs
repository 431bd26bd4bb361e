//! Backend selection.
//!
//! Exactly one backend is active per engine. It is chosen from configuration
//! at startup.

use super::backend::LockBackend;
use super::lfs::{GitLfsBackend, QueryTimeouts};
use super::runner::{CommandRunner, GitRunner};
use crate::config::{BackendKind, Config};
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

/// Build the runner for the configured git command line, rooted at `repo_root`.
pub fn git_runner(config: &Config, repo_root: &Path) -> Result<GitRunner> {
    GitRunner::from_command_line(&config.git_program, repo_root)
}

/// Build the backend named by `config.backend`.
pub fn select_backend(config: &Config, repo_root: &Path) -> Result<Arc<dyn LockBackend>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(git_runner(config, repo_root)?);
    Ok(backend_with_runner(config, repo_root, runner))
}

/// Same as [`select_backend`] with an explicit command runner.
pub fn backend_with_runner(
    config: &Config,
    repo_root: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Arc<dyn LockBackend> {
    match config.backend {
        BackendKind::GitLfs => Arc::new(GitLfsBackend::new(
            runner,
            repo_root.to_path_buf(),
            QueryTimeouts::from_config(config),
            config.benign_stderr_patterns.clone(),
        )),
    }
}
