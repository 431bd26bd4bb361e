//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{LockSyncError, Result};
use crate::paths::build_glob_set;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockSyncError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockSyncError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LockSyncError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LockSyncError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `git_program` must be non-empty
    /// - intervals and timeouts must be positive
    /// - `auto_lock_globs` must be valid glob patterns
    /// - `state_file` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.git_program.trim().is_empty() {
            return Err(LockSyncError::UserError(
                "config validation failed: git_program must not be empty".to_string(),
            ));
        }

        let durations = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("volatile_backoff_ms", self.volatile_backoff_ms),
            ("diff_timeout_ms", self.diff_timeout_ms),
            ("untracked_timeout_ms", self.untracked_timeout_ms),
            ("lock_list_timeout_ms", self.lock_list_timeout_ms),
            ("lock_types_timeout_ms", self.lock_types_timeout_ms),
            ("lfs_probe_timeout_ms", self.lfs_probe_timeout_ms),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(LockSyncError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        build_glob_set(&self.auto_lock_globs).map_err(|e| {
            LockSyncError::UserError(format!(
                "config validation failed: auto_lock_globs: {}",
                e
            ))
        })?;

        if self.state_file.trim().is_empty() {
            return Err(LockSyncError::UserError(
                "config validation failed: state_file must not be empty".to_string(),
            ));
        }

        if let Some(name) = &self.username
            && name.trim().is_empty()
        {
            return Err(LockSyncError::UserError(
                "config validation failed: username must not be blank (omit it instead)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn volatile_backoff(&self) -> Duration {
        Duration::from_millis(self.volatile_backoff_ms)
    }

    /// Absolute path of the record store for a repository.
    pub fn state_path(&self, repo_root: &Path) -> std::path::PathBuf {
        repo_root.join(&self.state_file)
    }
}
