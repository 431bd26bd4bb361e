//! Implementation of the `locksync discard` command.

use crate::cli::DiscardArgs;
use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::EngineSettings;
use locksync::error::{LockSyncError, Result};

pub fn cmd_discard(ctx: &RepoContext, config: &Config, args: DiscardArgs) -> Result<()> {
    if !args.force {
        return Err(LockSyncError::UserError(
            "discarding changes cannot be undone\n\nRe-run with --force to confirm.".to_string(),
        ));
    }

    let paths = ctx.repo_paths(&args.paths)?;
    let engine = super::open_engine(ctx, config, EngineSettings::from_config(config))?;
    engine.restore()?;

    let discarded = engine.discard_changes(&paths)?;
    engine.shutdown();

    if discarded.is_empty() {
        println!("Nothing to discard.");
    }
    for path in &discarded {
        println!("Discarded {}", path);
    }
    Ok(())
}
