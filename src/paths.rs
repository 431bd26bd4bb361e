//! Canonical repository-relative path handling.
//!
//! Every path stored in the lock table or the modified set uses `/` as the
//! separator, has no leading `./` and no trailing `/`, and is relative to the
//! repository root reported by git.

use crate::error::{LockSyncError, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};

/// Normalize a path as printed by git (or typed by a user) to canonical form.
pub fn normalize(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    while p.len() > 1 && p.ends_with('/') {
        p.pop();
    }
    p
}

/// Parent directory of a canonical path, or None at the top level.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

/// True if `path` is `dir` itself or lies beneath it.
pub fn is_within(path: &str, dir: &str) -> bool {
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve a user-supplied path (relative to `cwd`, or absolute) to the
/// canonical repository-relative form.
pub fn to_repo_relative(root: &Path, cwd: &Path, input: &str) -> Result<String> {
    let candidate = Path::new(input.trim());
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.canonicalize()
            .unwrap_or_else(|_| cwd.to_path_buf())
            .join(candidate)
    };
    let absolute = absolute.canonicalize().unwrap_or_else(|_| lexical_clean(&absolute));
    let root = root.canonicalize().unwrap_or_else(|_| lexical_clean(root));

    let relative = absolute.strip_prefix(&root).map_err(|_| {
        LockSyncError::UserError(format!(
            "'{}' is outside the repository at '{}'",
            input,
            root.display()
        ))
    })?;
    let relative = normalize(&relative.to_string_lossy());
    if relative.is_empty() {
        return Err(LockSyncError::UserError(format!(
            "'{}' is the repository root, not a file",
            input
        )));
    }
    Ok(relative)
}

fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Compile gitattributes-style patterns (`*.psd`, `Assets/**/*.unity`) into a
/// case-insensitive glob set where `*` also crosses directory separators.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    finish_glob_set(builder)
}

/// Like [`build_glob_set`], but a pattern that does not compile is logged
/// and skipped instead of failing the whole set.
pub fn build_glob_set_lenient(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match compile_glob(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("[paths] skipping pattern: {}", e),
        }
    }
    finish_glob_set(builder).unwrap_or_else(|e| {
        tracing::warn!("[paths] {}", e);
        GlobSet::empty()
    })
}

fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map_err(|e| LockSyncError::UserError(format!("invalid glob pattern '{}': {}", pattern, e)))
}

fn finish_glob_set(builder: GlobSetBuilder) -> Result<GlobSet> {
    builder
        .build()
        .map_err(|e| LockSyncError::UserError(format!("failed to build glob set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_git_output() {
        assert_eq!(normalize("Assets\\Scenes\\Main.unity"), "Assets/Scenes/Main.unity");
        assert_eq!(normalize("./a/b.txt \r"), "a/b.txt");
        assert_eq!(normalize("a/b/"), "a/b");
    }

    #[test]
    fn test_parent_walks_up() {
        assert_eq!(parent("a/b/c.txt"), Some("a/b"));
        assert_eq!(parent("a/b"), Some("a"));
        assert_eq!(parent("a"), None);
    }

    #[test]
    fn test_is_within_respects_boundaries() {
        assert!(is_within("a/b/c.txt", "a/b"));
        assert!(is_within("a/b", "a/b"));
        assert!(!is_within("a/bc.txt", "a/b"));
    }

    #[test]
    fn test_to_repo_relative_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("Assets");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("a.psd"), "x").unwrap();

        let rel = to_repo_relative(temp_dir.path(), &sub, "a.psd").unwrap();
        assert_eq!(rel, "Assets/a.psd");

        // Files that do not exist yet are resolved lexically.
        let rel = to_repo_relative(temp_dir.path(), &sub, "../new/b.psd").unwrap();
        assert_eq!(rel, "new/b.psd");
    }

    #[test]
    fn test_to_repo_relative_rejects_outside_paths() {
        let root = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();

        let err = to_repo_relative(root.path(), other.path(), "x.txt").unwrap_err();
        assert!(err.to_string().contains("outside the repository"));
    }

    #[test]
    fn test_glob_set_matches_nested_and_case_insensitive() {
        let set = build_glob_set(&["*.psd".to_string(), "*.unity".to_string()]).unwrap();

        assert!(set.is_match("Assets/Art/Hero.PSD"));
        assert!(set.is_match("Main.unity"));
        assert!(!set.is_match("Assets/readme.md"));
    }

    #[test]
    fn test_glob_set_rejects_bad_pattern() {
        assert!(build_glob_set(&["[".to_string()]).is_err());
    }

    #[test]
    fn test_lenient_glob_set_skips_only_bad_pattern() {
        let set = build_glob_set_lenient(&[
            "*.psd".to_string(),
            "[".to_string(),
            "*.unity".to_string(),
        ]);

        assert!(set.is_match("Art/Hero.PSD"));
        assert!(set.is_match("Scenes/Main.unity"));
        assert!(!set.is_match("README.md"));
    }
}
