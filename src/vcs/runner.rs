//! Subprocess query protocol.
//!
//! A query starts one external command, lets the caller decide when to give up
//! on it (timeout or user cancel), and hands decoded stderr/stdout lines to
//! callbacks. Stderr is delivered first; if any error callback flags a line as
//! fatal the query is reported as failed and stdout is not delivered.

use crate::cancel::CancelToken;
use crate::error::{LockSyncError, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running child is polled for exit / abort.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Final state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The command ran to completion and no error line was flagged.
    Completed,
    /// An error callback flagged a stderr line.
    Failed,
    /// The abort check fired; the child was killed and no output delivered.
    Aborted,
}

impl QueryOutcome {
    pub fn failed(self) -> bool {
        self != QueryOutcome::Completed
    }
}

/// Runs commands of one external executable.
pub trait CommandRunner: Send + Sync {
    /// Run `args` and stream its output.
    ///
    /// `abort` is polled with the elapsed time while the child runs; returning
    /// true kills it. `on_error` returns true for lines that make the query a
    /// failure.
    fn run(
        &self,
        args: &[&str],
        abort: &mut dyn FnMut(Duration) -> bool,
        on_output: &mut dyn FnMut(&str),
        on_error: &mut dyn FnMut(&str) -> bool,
    ) -> Result<QueryOutcome>;

    /// Human-readable form of a command for log lines.
    fn describe(&self, args: &[&str]) -> String;
}

/// Abort check that fires after a fixed time budget.
pub fn timeout_after(timeout: Duration) -> impl FnMut(Duration) -> bool {
    move |elapsed| elapsed >= timeout
}

/// Abort check driven by a cancellation token.
pub fn until_cancelled(token: &CancelToken) -> impl FnMut(Duration) -> bool + '_ {
    move |_| token.is_cancelled()
}

/// Runs `git` (or a configured git command line) in a fixed directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    prefix_args: Vec<String>,
    cwd: PathBuf,
}

impl GitRunner {
    pub fn new<P: AsRef<Path>>(cwd: P) -> Self {
        Self {
            program: "git".to_string(),
            prefix_args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    /// Build a runner from a command line such as `git` or `wsl git`.
    pub fn from_command_line<P: AsRef<Path>>(command_line: &str, cwd: P) -> Result<Self> {
        let mut words = shell_words::split(command_line).map_err(|e| {
            LockSyncError::UserError(format!(
                "failed to parse git command '{}': {}",
                command_line, e
            ))
        })?;
        if words.is_empty() {
            return Err(LockSyncError::UserError(
                "git command is empty".to_string(),
            ));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            prefix_args: words,
            cwd: cwd.as_ref().to_path_buf(),
        })
    }

    /// Same command line, different working directory.
    pub fn with_cwd<P: AsRef<Path>>(&self, cwd: P) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

impl CommandRunner for GitRunner {
    fn run(
        &self,
        args: &[&str],
        abort: &mut dyn FnMut(Duration) -> bool,
        on_output: &mut dyn FnMut(&str),
        on_error: &mut dyn FnMut(&str) -> bool,
    ) -> Result<QueryOutcome> {
        let described = self.describe(args);
        tracing::debug!("[runner] {}", described);

        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                LockSyncError::VcsError(format!("failed to execute {}: {}", described, e))
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a
        // full pipe while we wait for it.
        let stdout = child.stdout.take().map(spawn_line_reader);
        let stderr = child.stderr.take().map(spawn_line_reader);

        let start = Instant::now();
        if wait_with_abort(&mut child, start, abort)? {
            kill_process(&mut child);
            // Readers are detached: a grandchild may still hold the pipes.
            tracing::debug!("[runner] aborted {}", described);
            return Ok(QueryOutcome::Aborted);
        }

        // A grandchild that inherited the pipes keeps them open after the
        // child exits; the same abort check bounds the drain.
        if wait_for_readers([&stdout, &stderr], start, abort) {
            tracing::debug!("[runner] aborted {} while draining output", described);
            return Ok(QueryOutcome::Aborted);
        }

        let error_lines = join_lines(stderr);
        let output_lines = join_lines(stdout);

        let mut failed = false;
        for line in &error_lines {
            failed |= on_error(line);
        }
        if failed {
            return Ok(QueryOutcome::Failed);
        }

        for line in &output_lines {
            on_output(line);
        }
        Ok(QueryOutcome::Completed)
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.prefix_args.iter().map(String::as_str));
        parts.extend(args.iter().copied());
        parts.join(" ")
    }
}

/// Poll a child until it exits or `abort` fires. Returns true when aborted.
pub(crate) fn wait_with_abort(
    child: &mut Child,
    start: Instant,
    abort: &mut dyn FnMut(Duration) -> bool,
) -> Result<bool> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::trace!("[runner] exited with {}", status);
                return Ok(false);
            }
            Ok(None) => {
                if abort(start.elapsed()) {
                    return Ok(true);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_process(child);
                return Err(LockSyncError::VcsError(format!(
                    "failed to check process status: {}",
                    e
                )));
            }
        }
    }
}

fn kill_process(child: &mut Child) {
    // On Unix this is SIGKILL; on Windows it is TerminateProcess.
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_line_reader<R: Read + Send + 'static>(pipe: R) -> JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    // Output may be in any locale encoding; decode lossily.
                    let line = String::from_utf8_lossy(&buf);
                    lines.push(line.trim_end_matches(['\r', '\n']).to_string());
                }
            }
        }
        lines
    })
}

/// Poll until every reader hit EOF or `abort` fires. Returns true when aborted.
fn wait_for_readers(
    readers: [&Option<JoinHandle<Vec<String>>>; 2],
    start: Instant,
    abort: &mut dyn FnMut(Duration) -> bool,
) -> bool {
    while readers.iter().any(|r| r.as_ref().is_some_and(|h| !h.is_finished())) {
        if abort(start.elapsed()) {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}

fn join_lines(reader: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
