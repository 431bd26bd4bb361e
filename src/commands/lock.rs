//! Implementation of the `locksync lock` and `locksync unlock` commands.

use crate::cli::LockArgs;
use locksync::cancel::CancelToken;
use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::EngineSettings;
use locksync::error::{LockSyncError, Result};
use std::time::Duration;

pub fn cmd_lock(ctx: &RepoContext, config: &Config, args: LockArgs) -> Result<()> {
    run(ctx, config, args, true)
}

pub fn cmd_unlock(ctx: &RepoContext, config: &Config, args: LockArgs) -> Result<()> {
    run(ctx, config, args, false)
}

fn run(ctx: &RepoContext, config: &Config, args: LockArgs, lock: bool) -> Result<()> {
    if lock && config.username.is_none() {
        return Err(LockSyncError::UserError(format!(
            "no username configured\n\nSet `username` in {} to the name git-lfs reports for your locks.",
            ctx.config_path().display()
        )));
    }

    let paths = ctx.repo_paths(&args.paths)?;
    let engine = super::open_engine(ctx, config, EngineSettings::from_config(config))?;
    engine.restore()?;

    let cancel = CancelToken::with_timeout(Duration::from_millis(args.timeout_ms));
    let (ok, verb) = if lock {
        (engine.acquire_lock_with(&paths, &cancel), "Locked")
    } else {
        (engine.release_lock_with(&paths, &cancel), "Unlocked")
    };
    engine.shutdown();

    if !ok {
        let action = if lock { "lock" } else { "unlock" };
        return Err(LockSyncError::LockError(format!(
            "could not {} {}",
            action,
            paths.join(", ")
        )));
    }
    for path in &paths {
        println!("{} {}", verb, path);
    }
    Ok(())
}
