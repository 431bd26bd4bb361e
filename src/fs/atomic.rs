//! Atomic file replacement for persisted state.
//!
//! The state file is rewritten wholesale on every lock-table mutation, possibly
//! from more than one process sharing a working tree. Each write goes to a
//! process-unique temporary file in the target directory, is synced, then
//! renamed over the target so readers only ever see a complete document.
//!
//! On crash a `.{filename}.{pid}.tmp` file may be left behind; it is ignored.

use crate::error::{LockSyncError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replace `path` with `content`, creating parent directories.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            LockSyncError::PersistenceError(format!(
                "failed to create state directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;
    if let Err(e) = write_synced(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // std::fs::rename replaces an existing target on both POSIX and Windows.
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LockSyncError::PersistenceError(format!(
            "failed to replace '{}': {}",
            path.display(),
            e
        ))
    })?;

    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            LockSyncError::PersistenceError(format!(
                "invalid state file path '{}'",
                target.display()
            ))
        })?;
    let temp_name = format!(".{}.{}.tmp", filename, std::process::id());
    Ok(match target.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    })
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        LockSyncError::PersistenceError(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;
    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            LockSyncError::PersistenceError(format!(
                "failed to write temporary file '{}': {}",
                path.display(),
                e
            ))
        })
}
