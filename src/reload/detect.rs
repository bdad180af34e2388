//! Change detection over the cache and the source roots.
//!
//! Pure with respect to engine state: nothing here compiles, defines
//! or touches caches, it only compares stamps and scans roots.

use std::fmt;
use std::path::PathBuf;

use crate::cache::{ClassCache, SharedUnit};
use crate::core::ClassName;
use crate::index::SourceIndex;

/// Everything a detection pass found out of date.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Cached units whose source content changed.
    pub modified: Vec<SharedUnit>,
    /// Cached units whose source file is gone.
    pub vanished: Vec<SharedUnit>,
    /// Sources on disk with no cache entry yet.
    pub added: Vec<(ClassName, PathBuf)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.vanished.is_empty() && self.added.is_empty()
    }

    /// Compile requests for this set: modified units plus new sources.
    pub fn to_compile(&self) -> Vec<(ClassName, PathBuf)> {
        let mut requests: Vec<_> = self
            .modified
            .iter()
            .map(|unit| (unit.name.clone(), unit.path.clone()))
            .collect();
        requests.extend(self.added.iter().cloned());
        requests
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.modified.is_empty() {
            parts.push(format!("{} changed", self.modified.len()));
        }
        if !self.added.is_empty() {
            parts.push(format!("{} new", self.added.len()));
        }
        if !self.vanished.is_empty() {
            parts.push(format!("{} removed", self.vanished.len()));
        }
        if parts.is_empty() {
            f.write_str("no changes")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Sweep the cache for stale and vanished units, then scan the roots
/// for sources the cache has never seen.
pub fn detect_changes(cache: &ClassCache, index: &SourceIndex) -> ChangeSet {
    let report = cache.sweep();

    let mut added = Vec::new();
    for (name, path) in index.scan_all() {
        if cache.unit(&name).is_none() {
            added.push((name, path));
        }
    }

    ChangeSet {
        modified: report.stale,
        vanished: report.removed,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ClassImage, encode_image};
    use crate::cache::{CachedClass, ClassUnit};
    use crate::freshness::SourceStamp;
    use std::fs;
    use tempfile::TempDir;

    fn cache_unit(path: PathBuf, name: &str) -> ClassUnit {
        let image = ClassImage::new(ClassName::from(name), None);
        let bytes = encode_image(&image).unwrap();
        ClassUnit {
            name: ClassName::from(name),
            path: path.clone(),
            stamp: SourceStamp::capture(&path),
            classes: vec![CachedClass {
                name: ClassName::from(name),
                raw: bytes.clone(),
                enhanced: bytes,
                image,
            }],
        }
    }

    #[test]
    fn test_detect_classifies_all_three_kinds() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let demo = root.join("demo");
        fs::create_dir_all(&demo).unwrap();

        let keep = demo.join("Keep.unit");
        let edit = demo.join("Edit.unit");
        let gone = demo.join("Gone.unit");
        for path in [&keep, &edit, &gone] {
            fs::write(path, "class demo.X").unwrap();
        }

        let cache = ClassCache::new();
        cache.insert_all(vec![
            cache_unit(keep.clone(), "demo.Keep"),
            cache_unit(edit.clone(), "demo.Edit"),
            cache_unit(gone.clone(), "demo.Gone"),
        ]);

        // Let the mtime tick over before editing.
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&edit, "class demo.Edit\n  field n: int").unwrap();
        fs::remove_file(&gone).unwrap();
        fs::write(demo.join("Fresh.unit"), "class demo.Fresh").unwrap();

        let index = SourceIndex::new([root]);
        let changes = detect_changes(&cache, &index);

        assert_eq!(changes.modified.len(), 1);
        assert_eq!(changes.modified[0].name.as_str(), "demo.Edit");
        assert_eq!(changes.vanished.len(), 1);
        assert_eq!(changes.vanished[0].name.as_str(), "demo.Gone");
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].0.as_str(), "demo.Fresh");
        assert_eq!(changes.to_string(), "1 changed, 1 new, 1 removed");
    }

    #[test]
    fn test_detect_on_settled_tree_is_empty() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(root.join("demo")).unwrap();
        let path = root.join("demo/Post.unit");
        fs::write(&path, "class demo.Post").unwrap();

        let cache = ClassCache::new();
        cache.insert(cache_unit(path, "demo.Post"));

        let index = SourceIndex::new([root]);
        let changes = detect_changes(&cache, &index);
        assert!(changes.is_empty());
        assert_eq!(changes.to_string(), "no changes");
    }

    #[test]
    fn test_to_compile_merges_modified_and_added() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let demo = root.join("demo");
        fs::create_dir_all(&demo).unwrap();
        let a = demo.join("A.unit");
        fs::write(&a, "class demo.A").unwrap();

        let cache = ClassCache::new();
        cache.insert(cache_unit(a.clone(), "demo.A"));
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&a, "class demo.A\n  method f() = \"x\"").unwrap();
        fs::write(demo.join("B.unit"), "class demo.B").unwrap();

        let index = SourceIndex::new([root]);
        let requests = detect_changes(&cache, &index).to_compile();
        let names: Vec<_> = requests.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["demo.A", "demo.B"]);
    }
}
