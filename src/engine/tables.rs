//! In-memory lock table and modified-path set.

use super::fingerprint::Fingerprint;
use super::handle::ExclusiveHandle;
use crate::paths::{is_within, normalize, parent};
use crate::vcs::LockEntry;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One locked path.
#[derive(Debug)]
pub struct LockRecord {
    pub path: String,
    pub owner: String,
    handle: Option<ExclusiveHandle>,
}

impl LockRecord {
    pub fn new(path: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            handle: None,
        }
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    fn entry(&self) -> LockEntry {
        LockEntry::new(self.path.clone(), self.owner.clone())
    }
}

/// Path to lock record. Paths are unique.
#[derive(Debug, Default)]
pub struct LockTable {
    records: HashMap<String, LockRecord>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from listing entries; a later duplicate path wins.
    pub fn from_entries<I: IntoIterator<Item = LockEntry>>(entries: I) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(LockRecord::new(entry.path, entry.owner));
        }
        table
    }

    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, record: LockRecord) -> Option<LockRecord> {
        self.records.insert(record.path.clone(), record)
    }

    pub fn remove(&mut self, path: &str) -> Option<LockRecord> {
        self.records.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&LockRecord> {
        self.records.get(path)
    }

    pub fn owner(&self, path: &str) -> Option<&str> {
        self.records.get(path).map(|r| r.owner.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockRecord> {
        self.records.values()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_pairs(
            self.records
                .values()
                .map(|r| (r.path.as_str(), r.owner.as_str())),
        )
    }

    /// Entries sorted by path.
    pub fn entries(&self) -> Vec<LockEntry> {
        let mut entries: Vec<LockEntry> = self.records.values().map(LockRecord::entry).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Attach `handle` to the record for `path` if it is still owned by
    /// `owner` and has no handle yet. Returns false (dropping the handle)
    /// otherwise.
    pub fn attach_handle(&mut self, path: &str, owner: &str, handle: ExclusiveHandle) -> bool {
        match self.records.get_mut(path) {
            Some(record) if record.owner == owner && record.handle.is_none() => {
                record.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// Move handles out of `previous` for records whose owner is unchanged.
    pub fn adopt_handles(&mut self, previous: &mut LockTable) {
        for record in self.records.values_mut() {
            if record.handle.is_some() {
                continue;
            }
            if let Some(old) = previous.records.get_mut(&record.path)
                && old.owner == record.owner
            {
                record.handle = old.handle.take();
            }
        }
    }

    /// Release every held handle. Returns how many were released.
    pub fn release_handles(&mut self) -> usize {
        self.records
            .values_mut()
            .filter_map(|r| r.handle.take())
            .count()
    }

    /// Remove every record, returning them so the caller decides where the
    /// handles are dropped.
    pub fn take_all(&mut self) -> Vec<LockRecord> {
        self.records.drain().map(|(_, record)| record).collect()
    }
}

/// Paths with uncommitted changes plus every ancestor directory of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedPathSet {
    paths: HashSet<String>,
    files: BTreeSet<String>,
}

impl ModifiedPathSet {
    /// Build the set from changed files. Ancestors shorter than `floor` bytes
    /// are not added.
    pub fn from_files<I, S>(files: I, floor: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for file in files {
            let file = normalize(file.as_ref());
            if file.is_empty() {
                continue;
            }
            expand_ancestors(&file, floor, &mut set.paths);
            set.paths.insert(file.clone());
            set.files.insert(file);
        }
        set
    }

    /// True for a modified file or a directory containing one.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// The modified files themselves, sorted.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Modified files equal to or beneath `path`.
    pub fn files_within(&self, path: &str) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| is_within(f, path))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_paths(self.paths.iter().map(String::as_str))
    }
}

/// Add every ancestor directory of `path` whose length is at least `floor`.
pub fn expand_ancestors(path: &str, floor: usize, out: &mut HashSet<String>) {
    let mut current = path;
    while let Some(dir) = parent(current) {
        if dir.is_empty() || dir.len() < floor {
            break;
        }
        out.insert(dir.to_string());
        current = dir;
    }
}

/// Both tables, guarded together.
#[derive(Debug, Default)]
pub struct RecordTables {
    pub locks: LockTable,
    pub modified: ModifiedPathSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ancestor_expansion() {
        let set = ModifiedPathSet::from_files(["a/b/c.txt"], 1);

        assert!(set.contains("a/b/c.txt"));
        assert!(set.contains("a/b"));
        assert!(set.contains("a"));
        assert!(!set.contains(""));
        assert!(!set.contains("a/b/c"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_ancestor_floor_stops_short_paths() {
        let set = ModifiedPathSet::from_files(["ab/cd/e.txt"], 3);

        assert!(set.contains("ab/cd"));
        assert!(!set.contains("ab"));
    }

    #[test]
    fn test_modified_set_normalizes_and_lists_files() {
        let set = ModifiedPathSet::from_files(["Assets\\x.png", "./Assets/y.png", ""], 1);

        assert_eq!(set.files().collect::<Vec<_>>(), vec!["Assets/x.png", "Assets/y.png"]);
        assert_eq!(set.files_within("Assets"), vec!["Assets/x.png", "Assets/y.png"]);
        assert_eq!(set.files_within("Assets/x.png"), vec!["Assets/x.png"]);
        assert!(set.files_within("Asset").is_empty());
    }

    #[test]
    fn test_lock_table_basics() {
        let mut table = LockTable::from_entries([
            LockEntry::new("a.psd", "alice"),
            LockEntry::new("b.psd", "bob"),
            LockEntry::new("a.psd", "carol"),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.owner("a.psd"), Some("carol"));
        assert!(table.contains("b.psd"));

        let removed = table.remove("b.psd").unwrap();
        assert_eq!(removed.owner, "bob");
        assert_eq!(table.entries(), vec![LockEntry::new("a.psd", "carol")]);
    }

    #[test]
    fn test_table_fingerprint_tracks_content() {
        let mut table = LockTable::from_entries([LockEntry::new("a", "owner1")]);
        let before = table.fingerprint();

        table.insert(LockRecord::new("a", "owner2"));

        assert_ne!(before, table.fingerprint());
        assert_eq!(
            table.fingerprint(),
            LockTable::from_entries([LockEntry::new("a", "owner2")]).fingerprint()
        );
    }

    #[test]
    fn test_handles_attach_adopt_release() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.psd");
        std::fs::write(&file, "x").unwrap();

        let mut old = LockTable::from_entries([LockEntry::new("a.psd", "bob")]);
        assert!(!old.attach_handle("a.psd", "carol", ExclusiveHandle::acquire(&file).unwrap()));
        assert!(old.attach_handle("a.psd", "bob", ExclusiveHandle::acquire(&file).unwrap()));
        assert!(old.get("a.psd").unwrap().has_handle());

        let mut same_owner = LockTable::from_entries([LockEntry::new("a.psd", "bob")]);
        same_owner.adopt_handles(&mut old);
        assert!(same_owner.get("a.psd").unwrap().has_handle());
        assert!(!old.get("a.psd").unwrap().has_handle());

        let mut new_owner = LockTable::from_entries([LockEntry::new("a.psd", "dave")]);
        new_owner.adopt_handles(&mut same_owner);
        assert!(!new_owner.get("a.psd").unwrap().has_handle());

        assert_eq!(same_owner.release_handles(), 1);
        assert_eq!(same_owner.release_handles(), 0);
    }
}
