//! Error types for locksync.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use std::time::Duration;
use thiserror::Error;

/// Main error type for locksync operations.
///
/// Background reconciliation never lets these escape the worker loop; they are
/// logged there. Direct consumer actions surface them as notifications.
#[derive(Error, Debug)]
pub enum LockSyncError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// The external version-control tool reported an error.
    #[error("VCS command failed: {0}")]
    VcsError(String),

    /// A query exceeded its time budget and the subprocess was killed.
    #[error("{command} timed out after {}ms", timeout.as_millis())]
    Timeout { command: String, timeout: Duration },

    /// The caller cancelled the operation; nothing was applied.
    #[error("{0} was cancelled")]
    Cancelled(String),

    /// A line of tool output could not be understood.
    #[error("failed to parse {what}: {detail}")]
    ParseError { what: String, detail: String },

    /// The record store could not be read or written.
    #[error("persistence failed: {0}")]
    PersistenceError(String),

    /// A lock or unlock request was rejected.
    #[error("lock operation failed: {0}")]
    LockError(String),

    /// A consumer-only operation was invoked from another thread.
    #[error("{0} must be called from the consumer thread")]
    WrongThread(String),
}

impl LockSyncError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockSyncError::UserError(_) | LockSyncError::WrongThread(_) => exit_codes::USER_ERROR,
            LockSyncError::PersistenceError(_) => exit_codes::PERSISTENCE_FAILURE,
            LockSyncError::VcsError(_)
            | LockSyncError::Timeout { .. }
            | LockSyncError::ParseError { .. } => exit_codes::VCS_FAILURE,
            LockSyncError::LockError(_) | LockSyncError::Cancelled(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for locksync operations.
pub type Result<T> = std::result::Result<T, LockSyncError>;
