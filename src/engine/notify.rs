//! User-visible notifications for failed consumer actions.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LockFailed { paths: Vec<String>, reason: String },
    UnlockFailed { paths: Vec<String>, reason: String },
    Cancelled { action: &'static str, paths: Vec<String> },
    /// Lock tracking is off because the lock extension is not installed.
    LocksUnavailable,
    NoLocalOwner { action: &'static str },
    WrongThread { operation: &'static str },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LockFailed { paths, reason } => {
                write!(f, "failed to lock {}: {}", paths.join(", "), reason)
            }
            Notice::UnlockFailed { paths, reason } => {
                write!(f, "failed to unlock {}: {}", paths.join(", "), reason)
            }
            Notice::Cancelled { action, paths } => {
                write!(f, "{} of {} was cancelled", action, paths.join(", "))
            }
            Notice::LocksUnavailable => {
                write!(f, "git-lfs is not installed; file locking is disabled")
            }
            Notice::NoLocalOwner { action } => {
                write!(f, "cannot {} without a configured username", action)
            }
            Notice::WrongThread { operation } => {
                write!(f, "{} must be called from the consumer thread", operation)
            }
        }
    }
}

/// Receives notices raised by consumer actions.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::warn!("{}", notice);
    }
}
