//! Snapshots, the differ, and the cycle-to-cycle cache.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::storage::FileRecord;

/// Every file seen by one complete crawl cycle, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous one at the same path.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.path().to_string(), record)
    }

    /// Look up a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Whether `path` is present.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no files are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in path order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Records whose path lies under `root`.
    pub fn under<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.records
            .values()
            .filter(move |r| Path::new(r.path()).starts_with(root))
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

/// How the differ treats files present in both snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffPolicy {
    /// Only additions and removals are detected.
    #[default]
    PresenceOnly,
    /// Also report files whose size or mtime changed.
    DetectModified,
}

/// Differences between a new snapshot and the cache. Paths are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
}

impl ChangeSet {
    /// True when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Compare `new` against `cache` by path.
#[must_use]
pub fn diff(new: &Snapshot, cache: &Snapshot, policy: DiffPolicy) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, record) in &new.records {
        match cache.get(path) {
            None => changes.added.push(path.clone()),
            Some(old) if policy == DiffPolicy::DetectModified && record.differs_from(old) => {
                changes.updated.push(path.clone());
            }
            Some(_) => {}
        }
    }

    changes.removed = cache
        .records
        .keys()
        .filter(|path| !new.contains(path))
        .cloned()
        .collect();

    changes
}

/// Holds the last completed snapshot.
///
/// Only the crawl task calls [`SnapshotCache::replace`]. Readers get an
/// `Arc` to an immutable snapshot; the lock only guards the pointer swap.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last completed snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Install `snapshot` as the new cache, returning the old one.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// True when the cache holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::collections::BTreeSet;

    fn snap(paths: &[&str]) -> Snapshot {
        paths.iter().map(|p| FileRecord::new(*p).with_size(10)).collect()
    }

    fn keys(s: &Snapshot) -> BTreeSet<String> {
        s.records().map(|r| r.path().to_string()).collect()
    }

    #[test]
    fn test_diff_is_set_difference() {
        let cases: &[(&[&str], &[&str])] = &[
            (&[], &[]),
            (&[], &["/v/a"]),
            (&["/v/a"], &[]),
            (&["/v/a", "/v/b"], &["/v/b", "/v/c"]),
            (&["/v/a", "/v/b", "/v/c"], &["/v/a", "/v/b", "/v/c"]),
            (&["/v/x/1", "/v/x/2"], &["/w/1", "/v/x/2", "/v/x/3"]),
        ];

        for (old, new) in cases {
            let (old, new) = (snap(old), snap(new));
            let changes = diff(&new, &old, DiffPolicy::PresenceOnly);

            let added: BTreeSet<_> = changes.added.iter().cloned().collect();
            let removed: BTreeSet<_> = changes.removed.iter().cloned().collect();

            assert_eq!(added, &keys(&new) - &keys(&old));
            assert_eq!(removed, &keys(&old) - &keys(&new));
            assert!(added.is_disjoint(&removed));
            assert!(changes.updated.is_empty());
        }
    }

    #[test]
    fn test_unchanged_snapshot_converges() {
        let a = snap(&["/v/a", "/v/b"]);
        assert!(diff(&a.clone(), &a, DiffPolicy::DetectModified).is_empty());
    }

    #[test]
    fn test_presence_only_ignores_modification() {
        let old = snap(&["/v/a"]);
        let new: Snapshot = std::iter::once(FileRecord::new("/v/a").with_size(99)).collect();

        assert!(diff(&new, &old, DiffPolicy::PresenceOnly).is_empty());
    }

    #[test]
    fn test_detect_modified_reports_updates() {
        let old = snap(&["/v/a", "/v/b"]);
        let touched = FileRecord::new("/v/b")
            .with_size(10)
            .with_modified_at(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let new: Snapshot = [FileRecord::new("/v/a").with_size(10), touched]
            .into_iter()
            .collect();

        let changes = diff(&new, &old, DiffPolicy::DetectModified);
        assert_eq!(changes.updated, vec!["/v/b".to_string()]);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_under_root() {
        let s = snap(&["/mnt/a/1", "/mnt/a/2", "/mnt/ab/3"]);
        let under: Vec<_> = s.under(Path::new("/mnt/a")).map(FileRecord::path).collect();
        assert_eq!(under, vec!["/mnt/a/1", "/mnt/a/2"]);
    }

    #[test]
    fn test_cache_replace_is_atomic_for_readers() {
        let cache = SnapshotCache::new();
        assert!(cache.is_empty());

        let before = cache.current();
        let old = cache.replace(snap(&["/v/a"]));

        // Readers holding the old Arc keep a consistent view.
        assert!(before.is_empty());
        assert!(old.is_empty());
        assert_eq!(cache.len(), 1);
        assert!(cache.current().contains("/v/a"));
    }

    #[test]
    fn test_cache_clone_shares_state() {
        let cache = SnapshotCache::new();
        let reader = cache.clone();
        cache.replace(snap(&["/v/a", "/v/b"]));
        assert_eq!(reader.len(), 2);
    }
}
