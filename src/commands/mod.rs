//! Command implementations for locksync.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the engine wiring every command shares.

mod discard;
mod lock;
mod refresh;
mod status;
mod watch;

use crate::cli::{Cli, Command};
use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::{EngineSettings, LockEngine, Notice, Notifier};
use locksync::error::{LockSyncError, Result};
use locksync::store::{FileStore, ScopedStore};
use locksync::vcs::select_backend;
use std::sync::Arc;

/// Dispatch a command to its implementation.
///
/// Resolves the repository from `--repo` (or the current directory) first;
/// every command needs it.
pub fn dispatch(cli: Cli) -> Result<()> {
    let ctx = match &cli.repo {
        Some(dir) => {
            let dir = std::path::absolute(dir).map_err(|e| {
                LockSyncError::UserError(format!("invalid repository path '{}': {}", dir.display(), e))
            })?;
            RepoContext::resolve_from(dir)?
        }
        None => RepoContext::resolve()?,
    };
    let config = ctx.load_config()?;

    match cli.command {
        Command::Status(args) => status::cmd_status(&ctx, &config, args),
        Command::Lock(args) => lock::cmd_lock(&ctx, &config, args),
        Command::Unlock(args) => lock::cmd_unlock(&ctx, &config, args),
        Command::Refresh => refresh::cmd_refresh(&ctx, &config),
        Command::Watch(args) => watch::cmd_watch(&ctx, &config, args),
        Command::Discard(args) => discard::cmd_discard(&ctx, &config, args),
    }
}

/// Prints notices to stderr so they show up next to command output.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::debug!("[notice] {:?}", notice);
        eprintln!("warning: {}", notice);
    }
}

/// Build an engine for `ctx` backed by the configured state file.
pub(crate) fn open_engine(
    ctx: &RepoContext,
    config: &Config,
    settings: EngineSettings,
) -> Result<LockEngine> {
    let backend = select_backend(config, &ctx.repo_root)?;
    let store = ScopedStore::for_repo(
        FileStore::new(config.state_path(&ctx.repo_root)),
        &ctx.repo_root,
    );
    LockEngine::new(backend, Arc::new(store), settings, Arc::new(StderrNotifier))
}
