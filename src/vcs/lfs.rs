//! git + git-lfs backend.
//!
//! Diagnostic text from git is locale and version dependent, so apart from the
//! tab-delimited `git lfs locks` listing only small keywords are matched.

use super::backend::{LockBackend, LockCall, LockEntry, LockListing, LockSupport};
use super::runner::{CommandRunner, QueryOutcome, timeout_after, until_cancelled};
use crate::cancel::CancelToken;
use crate::config::{BackendKind, Config};
use crate::error::{LockSyncError, Result};
use crate::paths::normalize;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// `    *.psd (.gitattributes)` as printed by `git lfs track`.
static TRACK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<pattern>\S+)\s+\((?P<source>[^)]*)\)\s*$").expect("valid regex")
});

/// Time budgets for each kind of query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTimeouts {
    pub diff: Duration,
    pub untracked: Duration,
    pub lock_list: Duration,
    pub lock_types: Duration,
    pub probe: Duration,
    pub revert: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            diff: Duration::from_millis(5000),
            untracked: Duration::from_millis(500),
            lock_list: Duration::from_millis(5000),
            lock_types: Duration::from_millis(2000),
            probe: Duration::from_millis(10000),
            revert: Duration::from_millis(2000),
        }
    }
}

impl QueryTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            diff: Duration::from_millis(config.diff_timeout_ms),
            untracked: Duration::from_millis(config.untracked_timeout_ms),
            lock_list: Duration::from_millis(config.lock_list_timeout_ms),
            lock_types: Duration::from_millis(config.lock_types_timeout_ms),
            probe: Duration::from_millis(config.lfs_probe_timeout_ms),
            ..Self::default()
        }
    }
}

/// Find the repository root with `git rev-parse --show-toplevel`.
pub fn discover_root(runner: &dyn CommandRunner, timeout: Duration) -> Result<PathBuf> {
    let args = ["rev-parse", "--show-toplevel"];
    let mut root = None;
    let mut fatal = Vec::new();
    let outcome = runner.run(
        &args,
        &mut timeout_after(timeout),
        &mut |line| {
            if root.is_none() && !line.trim().is_empty() {
                root = Some(line.trim().replace('\\', "/"));
            }
        },
        &mut |line| {
            if line.contains("fatal") {
                fatal.push(line.to_string());
                true
            } else {
                false
            }
        },
    )?;

    match outcome {
        QueryOutcome::Aborted => Err(LockSyncError::Timeout {
            command: runner.describe(&args),
            timeout,
        }),
        QueryOutcome::Failed => Err(LockSyncError::UserError(format!(
            "not inside a git repository: {}",
            fatal.join("; ")
        ))),
        QueryOutcome::Completed => root.map(PathBuf::from).ok_or_else(|| {
            LockSyncError::UserError("git did not report a repository root".to_string())
        }),
    }
}

/// Parse one `git lfs locks` line: `path\towner\t...`.
pub fn parse_lock_line(line: &str) -> Result<LockEntry> {
    let mut fields = line.split('\t');
    let path = fields.next().map(normalize).filter(|p| !p.is_empty());
    let owner = fields
        .next()
        .map(str::trim)
        .filter(|o| !o.is_empty());

    match (path, owner) {
        (Some(path), Some(owner)) => Ok(LockEntry::new(path, owner)),
        _ => Err(LockSyncError::ParseError {
            what: "lock listing line".to_string(),
            detail: format!("expected 'path<TAB>owner', got '{}'", line),
        }),
    }
}

/// Extract the pattern from one `git lfs track` line, if it carries one.
pub fn parse_track_line(line: &str) -> Option<String> {
    TRACK_LINE
        .captures(line)
        .map(|caps| caps["pattern"].to_string())
}

pub struct GitLfsBackend {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
    timeouts: QueryTimeouts,
    benign_patterns: Vec<String>,
}

impl GitLfsBackend {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        root: PathBuf,
        timeouts: QueryTimeouts,
        benign_patterns: Vec<String>,
    ) -> Self {
        Self {
            runner,
            root,
            timeouts,
            benign_patterns,
        }
    }

    fn is_benign(&self, line: &str) -> bool {
        self.benign_patterns.iter().any(|p| line.contains(p.as_str()))
    }

    /// Run a read-only query and return its stdout lines.
    fn query(&self, args: &[&str], timeout: Duration) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut errors = Vec::new();
        let outcome = self.runner.run(
            args,
            &mut timeout_after(timeout),
            &mut |line| lines.push(line.to_string()),
            &mut |line| {
                if self.is_benign(line) {
                    tracing::debug!("[lfs] ignoring benign stderr: {}", line);
                    false
                } else {
                    errors.push(line.to_string());
                    true
                }
            },
        )?;

        match outcome {
            QueryOutcome::Completed => Ok(lines),
            QueryOutcome::Aborted => Err(LockSyncError::Timeout {
                command: self.runner.describe(args),
                timeout,
            }),
            QueryOutcome::Failed => Err(LockSyncError::VcsError(format!(
                "{}: {}",
                self.runner.describe(args),
                errors.join("; ")
            ))),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    fn lock_request(
        &self,
        verb: &str,
        keyword: &str,
        paths: &[String],
        cancel: &CancelToken,
    ) -> LockCall {
        let mut args = vec!["lfs", verb, "--"];
        args.extend(paths.iter().map(String::as_str));

        let mut output = Vec::new();
        let mut errors = Vec::new();
        let result = self.runner.run(
            &args,
            &mut until_cancelled(cancel),
            &mut |line| output.push(line.to_string()),
            &mut |line| {
                errors.push(line.to_string());
                true
            },
        );

        let outcome = match result {
            Ok(outcome) => outcome,
            // Nothing reached the server, so nothing can have diverged.
            Err(e) => return LockCall::Refused(e.to_string()),
        };

        for line in &output {
            tracing::info!("[lfs] {}", line);
        }

        match outcome {
            QueryOutcome::Aborted => LockCall::Cancelled,
            QueryOutcome::Failed => {
                let detail = errors.join("; ");
                // Unlocking a file that still has local changes is refused by
                // git-lfs; the lock itself is untouched.
                if verb == "unlock" && errors.iter().any(|e| e.contains("uncommitted")) {
                    LockCall::Refused(detail)
                } else {
                    LockCall::Ambiguous(detail)
                }
            }
            QueryOutcome::Completed => {
                let confirmed = output
                    .iter()
                    .filter(|line| !line.trim().is_empty())
                    .collect::<Vec<_>>();
                if !confirmed.is_empty() && confirmed.iter().all(|line| line.contains(keyword)) {
                    LockCall::Succeeded
                } else {
                    LockCall::Ambiguous(if output.is_empty() {
                        format!("git lfs {} printed nothing", verb)
                    } else {
                        output.join("; ")
                    })
                }
            }
        }
    }
}

impl LockBackend for GitLfsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GitLfs
    }

    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn probe(&self) -> LockSupport {
        let mut missing = false;
        let result = self.runner.run(
            &["lfs"],
            &mut timeout_after(self.timeouts.probe),
            &mut |_| {},
            &mut |line| {
                if line.contains("'lfs' is") {
                    missing = true;
                }
                true
            },
        );

        match result {
            Ok(_) if missing => LockSupport::Missing,
            Ok(QueryOutcome::Aborted) => LockSupport::Unknown,
            Ok(_) => LockSupport::Available,
            Err(e) => {
                tracing::warn!("[lfs] probe failed: {}", e);
                LockSupport::Unknown
            }
        }
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let lines = self.query(&["diff", "--name-only"], self.timeouts.diff)?;
        Ok(lines
            .iter()
            .map(|line| normalize(line))
            .filter(|path| !path.is_empty() && self.exists(path))
            .collect())
    }

    fn untracked_files(&self) -> Result<Vec<String>> {
        let lines = self.query(
            &["ls-files", "--others", "--exclude-standard"],
            self.timeouts.untracked,
        )?;
        Ok(lines
            .iter()
            .map(|line| normalize(line))
            .filter(|path| !path.is_empty() && self.root.join(path).is_file())
            .collect())
    }

    fn list_locks(&self) -> Result<LockListing> {
        let lines = self.query(&["lfs", "locks"], self.timeouts.lock_list)?;
        let mut listing = LockListing::default();
        for line in lines.iter().filter(|l| !l.trim().is_empty()) {
            match parse_lock_line(line) {
                Ok(entry) => listing.entries.push(entry),
                Err(e) => {
                    tracing::warn!("[lfs] skipping lock line: {}", e);
                    listing.skipped += 1;
                }
            }
        }
        Ok(listing)
    }

    fn lockable_patterns(&self) -> Result<Vec<String>> {
        let lines = self.query(&["lfs", "track"], self.timeouts.lock_types)?;
        let mut patterns = Vec::new();
        for line in &lines {
            // Everything after this header is an exclusion, not a lockable type.
            if line.trim_start().starts_with("Listing excluded") {
                break;
            }
            if let Some(pattern) = parse_track_line(line) {
                patterns.push(pattern);
            }
        }
        Ok(patterns)
    }

    fn lock(&self, paths: &[String], cancel: &CancelToken) -> LockCall {
        self.lock_request("lock", "Locked", paths, cancel)
    }

    fn unlock(&self, paths: &[String], cancel: &CancelToken) -> LockCall {
        self.lock_request("unlock", "Unlocked", paths, cancel)
    }

    fn revert(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["checkout", "--"];
        args.extend(paths.iter().map(String::as_str));
        for line in self.query(&args, self.timeouts.revert)? {
            tracing::info!("[lfs] discard: {}", line);
        }
        Ok(())
    }
}
