//! Tests for the record stores.

use super::*;
use tempfile::TempDir;

#[test]
fn test_memory_store_get_set_delete() {
    let store = MemoryStore::new();
    assert!(!store.has("k"));
    assert_eq!(store.get_or("k", "fallback"), "fallback");

    store.set("k", "v").unwrap();
    assert!(store.has("k"));
    assert_eq!(store.get("k").as_deref(), Some("v"));

    store.delete("k").unwrap();
    assert!(store.get("k").is_none());
    // Deleting again is fine.
    store.delete("k").unwrap();
}

#[test]
fn test_file_store_persists_across_instances() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".locksync").join("state.json");

    let store = FileStore::new(&path);
    store.set("lfs-locked-files", "{\"pid\":1}").unwrap();
    drop(store);

    let reopened = FileStore::new(&path);
    assert_eq!(
        reopened.get("lfs-locked-files").as_deref(),
        Some("{\"pid\":1}")
    );
}

#[test]
fn test_file_store_missing_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().join("absent.json"));

    assert!(!store.has("anything"));
}

#[test]
fn test_file_store_corrupt_file_is_treated_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    std::fs::write(&path, "not json at all").unwrap();

    let store = FileStore::new(&path);
    assert!(store.get("k").is_none());

    // The next write replaces the garbage with a valid document.
    store.set("k", "v").unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    let parsed: std::collections::BTreeMap<String, String> =
        serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.get("k").map(String::as_str), Some("v"));
}

#[test]
fn test_file_store_delete_rewrites_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let store = FileStore::new(&path);
    store.set("a", "1").unwrap();
    store.set("b", "2").unwrap();

    store.delete("a").unwrap();

    let reopened = FileStore::new(&path);
    assert!(!reopened.has("a"));
    assert!(reopened.has("b"));
}

#[test]
fn test_scoped_store_isolates_trees() {
    let backing = std::sync::Arc::new(MemoryStore::new());
    let first = ScopedStore::new(backing.clone(), "/work/one");
    let second = ScopedStore::new(backing.clone(), "/work/two");

    first.set("lfs-locked-files", "one").unwrap();

    assert_eq!(first.get("lfs-locked-files").as_deref(), Some("one"));
    assert!(!second.has("lfs-locked-files"));
    assert!(backing.has("locksync:/work/one:lfs-locked-files"));
}

#[test]
fn test_scoped_store_for_repo_uses_canonical_root() {
    let temp_dir = TempDir::new().unwrap();
    let store = ScopedStore::for_repo(MemoryStore::new(), temp_dir.path());
    store.set("k", "v").unwrap();

    let again = ScopedStore::for_repo(MemoryStore::new(), temp_dir.path());
    assert_eq!(store.prefix, again.prefix);
    assert!(store.prefix.starts_with("locksync:"));
}
