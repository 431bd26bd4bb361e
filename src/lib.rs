//! Locksync: background reconciliation of git-lfs file locks and local
//! modifications for a working tree.
//!
//! [`engine::LockEngine`] is the entry point. It polls a
//! [`vcs::LockBackend`] off the caller's thread, stages results that are
//! applied one at a time on the caller's thread, and persists the lock table
//! through a [`store::RecordStore`].

pub mod cancel;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod paths;
pub mod store;
pub mod vcs;

#[cfg(test)]
mod test_support;
