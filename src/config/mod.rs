//! Configuration model for locksync.
//!
//! This module defines the Config struct that represents `.locksync/config.yaml`.
//! Unknown fields are ignored, missing fields take defaults, and values are
//! validated after parsing.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use types::BackendKind;
