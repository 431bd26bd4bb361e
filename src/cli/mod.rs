//! CLI argument parsing for locksync.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Locksync: keeps a working tree's view of git-lfs file locks and local
/// modifications in sync with the server.
///
/// - `status` shows who holds which lock and what is modified locally
/// - `lock` / `unlock` change locks directly
/// - `watch` keeps polling in the background and reports changes
#[derive(Parser, Debug)]
#[command(name = "locksync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Run as if started in this directory instead of the current one.
    #[arg(short = 'C', long = "repo", global = true, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for locksync.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show locks and modified files.
    ///
    /// Without paths, lists every lock and every modified file. With paths,
    /// prints the lock and modification state of each one.
    Status(StatusArgs),

    /// Lock one or more files on the server.
    Lock(LockArgs),

    /// Release locks held by you.
    Unlock(LockArgs),

    /// Discard cached state and query everything again.
    Refresh,

    /// Keep polling and print lock and modification changes as they happen.
    Watch(WatchArgs),

    /// Throw away local changes.
    ///
    /// Tracked files are restored to their committed content, untracked
    /// files are deleted. Directories cover their modified contents.
    Discard(DiscardArgs),
}

/// Arguments for `locksync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Files to report on (default: everything).
    pub paths: Vec<String>,
}

/// Arguments for `locksync lock` and `locksync unlock`.
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Files to lock or unlock.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Give up on the request after this many milliseconds.
    #[arg(long, default_value = "30000")]
    pub timeout_ms: u64,
}

/// Arguments for `locksync watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (default: `poll_interval_ms` from config).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    pub once: bool,
}

/// Arguments for `locksync discard`.
#[derive(Args, Debug)]
pub struct DiscardArgs {
    /// Files or directories to discard.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Required confirmation; discarding cannot be undone.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_status_without_paths() {
        let cli = Cli::try_parse_from(["locksync", "status"]).unwrap();
        if let Command::Status(args) = cli.command {
            assert!(args.paths.is_empty());
        } else {
            panic!("Expected Status command");
        }
        assert!(cli.repo.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_status_with_paths() {
        let cli = Cli::try_parse_from(["locksync", "status", "art/a.psd", "art/b.psd"]).unwrap();
        if let Command::Status(args) = cli.command {
            assert_eq!(args.paths, vec!["art/a.psd", "art/b.psd"]);
        } else {
            panic!("Expected Status command");
        }
    }

    #[test]
    fn parse_lock_defaults() {
        let cli = Cli::try_parse_from(["locksync", "lock", "art/a.psd"]).unwrap();
        if let Command::Lock(args) = cli.command {
            assert_eq!(args.paths, vec!["art/a.psd"]);
            assert_eq!(args.timeout_ms, 30000);
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_unlock_with_timeout() {
        let cli = Cli::try_parse_from([
            "locksync",
            "unlock",
            "a.psd",
            "b.psd",
            "--timeout-ms",
            "500",
        ])
        .unwrap();
        if let Command::Unlock(args) = cli.command {
            assert_eq!(args.paths, vec!["a.psd", "b.psd"]);
            assert_eq!(args.timeout_ms, 500);
        } else {
            panic!("Expected Unlock command");
        }
    }

    #[test]
    fn lock_requires_paths() {
        assert!(Cli::try_parse_from(["locksync", "lock"]).is_err());
        assert!(Cli::try_parse_from(["locksync", "discard"]).is_err());
    }

    #[test]
    fn parse_refresh() {
        let cli = Cli::try_parse_from(["locksync", "refresh"]).unwrap();
        assert!(matches!(cli.command, Command::Refresh));
    }

    #[test]
    fn parse_watch() {
        let cli = Cli::try_parse_from(["locksync", "watch"]).unwrap();
        if let Command::Watch(args) = cli.command {
            assert_eq!(args.interval_ms, None);
            assert!(!args.once);
        } else {
            panic!("Expected Watch command");
        }

        let cli =
            Cli::try_parse_from(["locksync", "watch", "--interval-ms", "250", "--once"]).unwrap();
        if let Command::Watch(args) = cli.command {
            assert_eq!(args.interval_ms, Some(250));
            assert!(args.once);
        } else {
            panic!("Expected Watch command");
        }
    }

    #[test]
    fn parse_discard_force() {
        let cli = Cli::try_parse_from(["locksync", "discard", "art", "--force"]).unwrap();
        if let Command::Discard(args) = cli.command {
            assert_eq!(args.paths, vec!["art"]);
            assert!(args.force);
        } else {
            panic!("Expected Discard command");
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["locksync", "status", "-C", "/work/game", "-v"]).unwrap();
        assert_eq!(cli.repo, Some(PathBuf::from("/work/game")));
        assert!(cli.verbose);
    }
}
