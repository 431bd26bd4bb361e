//! Implementation of the `locksync status` command.
//!
//! Queries the backend once and prints either the whole picture (locks and
//! modified files) or the state of the requested paths.

use crate::cli::StatusArgs;
use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::{EngineSettings, LockEngine, LockView};
use locksync::error::Result;

/// Execute the `locksync status` command.
pub fn cmd_status(ctx: &RepoContext, config: &Config, args: StatusArgs) -> Result<()> {
    let engine = super::open_engine(ctx, config, EngineSettings::from_config(config))?;
    engine.restore()?;

    if args.paths.is_empty() {
        print_summary(&engine);
    } else {
        for path in ctx.repo_paths(&args.paths)? {
            println!("{}", describe_path(&engine, &path));
        }
    }

    engine.shutdown();
    Ok(())
}

/// Print every lock and every modified file.
pub(crate) fn print_summary(engine: &LockEngine) {
    if !engine.lfs_available() {
        println!("Locks: unavailable (git-lfs not installed)");
    } else {
        let locks = engine.locks();
        println!("Locks ({}):", locks.len());
        for view in &locks {
            println!("  {}", format_lock(view));
        }
    }
    println!();

    let modified = engine.modified_paths();
    println!("Modified ({}):", modified.len());
    for path in &modified {
        println!("  {}", path);
    }
}

/// One line per lock: `path  owner`, with `(you)` for the local owner.
pub(crate) fn format_lock(view: &LockView) -> String {
    if view.local {
        format!("{}  {} (you)", view.path, view.owner)
    } else {
        format!("{}  {}", view.path, view.owner)
    }
}

fn describe_path(engine: &LockEngine, path: &str) -> String {
    let mut parts = Vec::new();
    match engine.lock_owner(path) {
        Some(owner) if engine.is_locked_by_local_owner(path) => {
            parts.push(format!("locked by {} (you)", owner))
        }
        Some(owner) => parts.push(format!("locked by {}", owner)),
        None => parts.push("unlocked".to_string()),
    }
    if engine.is_modified(path) {
        parts.push("modified".to_string());
    }
    if engine.is_lockable(path) {
        parts.push("lockable".to_string());
    }
    format!("{}: {}", path, parts.join(", "))
}
