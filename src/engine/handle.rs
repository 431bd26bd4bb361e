//! OS-level handles that keep remotely locked files from being edited.

use crate::error::{LockSyncError, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// An open, share-locked handle on a file.
///
/// On Windows the shared lock makes the file read-only to other writers; on
/// Unix it is advisory. The lock is released when the handle is dropped.
#[derive(Debug)]
pub struct ExclusiveHandle {
    file: File,
    path: PathBuf,
}

impl ExclusiveHandle {
    /// Open `path` read-only and take a shared lock without blocking.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            LockSyncError::LockError(format!("failed to open '{}': {}", path.display(), e))
        })?;
        FileExt::try_lock_shared(&file).map_err(|e| {
            LockSyncError::LockError(format!("failed to share-lock '{}': {}", path.display(), e))
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusiveHandle {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("[handle] unlock of {} failed: {}", self.path.display(), e);
        }
    }
}
