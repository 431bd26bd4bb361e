//! Exit code constants for the locksync CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, not a repository, wrong thread)
//! - 2: Persistence failure (state file unreadable or unwritable)
//! - 3: VCS failure (git/git-lfs error, timeout, garbled output)
//! - 4: Lock failure (lock/unlock rejected or cancelled)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid state.
pub const USER_ERROR: i32 = 1;

/// Persistence failure: the state file could not be read or written.
pub const PERSISTENCE_FAILURE: i32 = 2;

/// VCS failure: the external tool failed, timed out or produced garbage.
pub const VCS_FAILURE: i32 = 3;

/// Lock failure: a lock or unlock request did not go through.
pub const LOCK_FAILURE: i32 = 4;
