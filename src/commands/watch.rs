//! Implementation of the `locksync watch` command.
//!
//! `watch` runs the background poller and applies its results on this thread
//! at a fixed tick, printing a line for every lock or modification change.
//! It runs until Ctrl+C (or SIGTERM), or for one cycle with `--once`. On
//! interruption the engine is shut down so the final snapshot is written and
//! edit guards are released.

use crate::cli::WatchArgs;
use locksync::config::Config;
use locksync::context::RepoContext;
use locksync::engine::{EngineSettings, LockEngine};
use locksync::error::{LockSyncError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Consumer tick cadence.
const TICK: Duration = Duration::from_millis(16);

/// What the user has been shown so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Picture {
    locks: BTreeMap<String, String>,
    modified: BTreeSet<String>,
}

impl Picture {
    fn capture(engine: &LockEngine) -> Self {
        Self {
            locks: engine
                .locks()
                .into_iter()
                .map(|view| (view.path, view.owner))
                .collect(),
            modified: engine.modified_paths().into_iter().collect(),
        }
    }
}

pub fn cmd_watch(ctx: &RepoContext, config: &Config, args: WatchArgs) -> Result<()> {
    let mut settings = EngineSettings::from_config(config);
    if let Some(interval_ms) = args.interval_ms {
        if interval_ms == 0 {
            return Err(LockSyncError::UserError(
                "--interval-ms must be greater than 0".to_string(),
            ));
        }
        settings.poll_interval = Duration::from_millis(interval_ms);
    }
    let interval = settings.poll_interval;

    let engine = super::open_engine(ctx, config, settings)?;
    engine.restore()?;

    eprintln!("locksync watch started");
    eprintln!("  repo:     {}", ctx.repo_root.display());
    eprintln!("  backend:  {}", config.backend.as_str());
    eprintln!("  interval: {}ms", interval.as_millis());
    eprintln!();

    super::status::print_summary(&engine);
    let mut shown = Picture::capture(&engine);

    if args.once {
        engine.poll_once()?;
        report(&engine, &mut shown);
        engine.shutdown();
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let stop = stop.clone();
        move || stop.store(true, Ordering::SeqCst)
    })
    .map_err(|e| LockSyncError::UserError(format!("failed to install signal handler: {}", e)))?;

    engine.start()?;
    run_until(&engine, &mut shown, &stop);

    tracing::info!("[watch] signal received; stopping");
    engine.shutdown();
    Ok(())
}

/// Apply staged updates at the tick cadence until `stop` is set.
fn run_until(engine: &LockEngine, shown: &mut Picture, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        if engine.tick() {
            report(engine, shown);
        } else {
            thread::sleep(TICK);
        }
    }
}

fn report(engine: &LockEngine, shown: &mut Picture) {
    let current = Picture::capture(engine);
    for line in changes(shown, &current) {
        println!("{}", line);
    }
    *shown = current;
}

/// Human-readable differences between two pictures, locks first.
fn changes(before: &Picture, after: &Picture) -> Vec<String> {
    let mut lines = Vec::new();

    for (path, owner) in &after.locks {
        match before.locks.get(path) {
            None => lines.push(format!("+ locked   {} by {}", path, owner)),
            Some(previous) if previous != owner => lines.push(format!(
                "~ locked   {} by {} (was {})",
                path, owner, previous
            )),
            Some(_) => {}
        }
    }
    for (path, owner) in &before.locks {
        if !after.locks.contains_key(path) {
            lines.push(format!("- unlocked {} (was {})", path, owner));
        }
    }

    for path in after.modified.difference(&before.modified) {
        lines.push(format!("+ modified {}", path));
    }
    for path in before.modified.difference(&after.modified) {
        lines.push(format!("- clean    {}", path));
    }
    lines
}
