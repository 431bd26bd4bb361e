//! Version-control backends.
//!
//! [`runner`] runs external commands, [`backend`] defines what the engine
//! needs from a tool, [`lfs`] implements it for git-lfs and [`registry`]
//! picks the configured implementation.

pub mod backend;
pub mod lfs;
pub mod registry;
pub mod runner;

pub use backend::{LockBackend, LockCall, LockEntry, LockListing, LockSupport};
pub use lfs::{GitLfsBackend, QueryTimeouts, discover_root};
pub use registry::{backend_with_runner, git_runner, select_backend};
pub use runner::{CommandRunner, GitRunner, QueryOutcome, timeout_after, until_cancelled};
