//! Filesystem utilities for locksync.
//!
//! Persisted state is always replaced atomically so a crash mid-write never
//! leaves a half-written snapshot behind.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
