//! Implementation of the `locksync refresh` command.

use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::EngineSettings;
use locksync::error::Result;

/// Rebuild lock and modification state from scratch and print it.
///
/// Staged updates and any saved snapshot are ignored.
pub fn cmd_refresh(ctx: &RepoContext, config: &Config) -> Result<()> {
    let engine = super::open_engine(ctx, config, EngineSettings::from_config(config))?;
    engine.refresh()?;
    super::status::print_summary(&engine);
    engine.shutdown();
    Ok(())
}
