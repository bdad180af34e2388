//! Source index: fully-qualified class names to defining source files.
//!
//! The index owns the ordered list of source roots. Lookups probe roots
//! in order and the first root containing the file wins, so an earlier
//! root can shadow a later one. Nested class names resolve through
//! their enclosing top-level unit.
//!
//! Hits and misses are both cached. The watch loop calls
//! [`SourceIndex::invalidate`] whenever anything under a root changes,
//! so a cached miss never outlives the filesystem state it observed.

use std::path::{Path, PathBuf};

use dashmap::{DashMap, DashSet};
use jwalk::WalkDir;
use rustc_hash::FxHashMap;

use crate::core::{ClassName, SOURCE_EXT};
use crate::utils::path::normalize_path;

pub struct SourceIndex {
    roots: Vec<PathBuf>,
    hits: DashMap<ClassName, PathBuf>,
    misses: DashSet<ClassName>,
}

impl SourceIndex {
    /// Build an index over `roots`, normalizing each to absolute form.
    ///
    /// Root order is lookup priority and is preserved.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().map(|r| normalize_path(&r)).collect(),
            hits: DashMap::new(),
            misses: DashSet::new(),
        }
    }

    #[inline]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a class name to the source file declaring it.
    ///
    /// Nested names (`demo.A$Helper`) resolve to the enclosing unit
    /// (`demo/A.unit`). A directory that happens to share the path is
    /// not a source and is skipped.
    pub fn source_for(&self, name: &ClassName) -> Option<PathBuf> {
        let top = name.top_level();

        if let Some(hit) = self.hits.get(&top) {
            // Cheap stat guards lookups that race the watcher's
            // invalidate call
            if hit.is_file() {
                return Some(hit.clone());
            }
            drop(hit);
            self.hits.remove(&top);
        }
        if self.misses.contains(&top) {
            return None;
        }

        let rel = top.to_rel_source_path();
        for root in &self.roots {
            let candidate = root.join(&rel);
            if candidate.is_file() {
                self.hits.insert(top, candidate.clone());
                return Some(candidate);
            }
        }

        self.misses.insert(top);
        None
    }

    /// Reverse lookup: which top-level class does this file declare?
    ///
    /// Returns `None` for files outside every root or with a foreign
    /// extension.
    pub fn class_for(&self, path: &Path) -> Option<ClassName> {
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXT) {
            return None;
        }
        let path = normalize_path(path);
        for root in &self.roots {
            if let Ok(rel) = path.strip_prefix(root)
                && let Some(name) = ClassName::from_rel_source_path(rel)
            {
                return Some(name);
            }
        }
        None
    }

    /// Walk every root and collect all declared units.
    ///
    /// First root wins for shadowed relative paths. The result is
    /// sorted by class name so batch compiles are deterministic.
    pub fn scan_all(&self) -> Vec<(ClassName, PathBuf)> {
        let mut seen: FxHashMap<ClassName, PathBuf> = FxHashMap::default();
        for root in &self.roots {
            let files = WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path());
            for file in files {
                let Ok(rel) = file.strip_prefix(root) else {
                    continue;
                };
                let Some(name) = ClassName::from_rel_source_path(rel) else {
                    continue;
                };
                seen.entry(name).or_insert(file);
            }
        }
        let mut units: Vec<_> = seen.into_iter().collect();
        units.sort_by(|(a, _), (b, _)| a.cmp(b));
        units
    }

    /// Drop all cached lookups. Called on any source tree change.
    pub fn invalidate(&self) {
        self.hits.clear();
        self.misses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_unit(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_lookup_probes_roots_in_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("app");
        let second = dir.path().join("modules/crud/app");
        let shadowed = write_unit(&first, "demo/A.unit", "class demo.A");
        write_unit(&second, "demo/A.unit", "class demo.A");
        write_unit(&second, "demo/B.unit", "class demo.B");

        let index = SourceIndex::new([first, second]);
        assert_eq!(
            index.source_for(&ClassName::new("demo.A")),
            Some(normalize_path(&shadowed))
        );
        assert!(index.source_for(&ClassName::new("demo.B")).is_some());
    }

    #[test]
    fn test_nested_name_resolves_to_enclosing_unit() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let unit = write_unit(&root, "demo/A.unit", "class demo.A");

        let index = SourceIndex::new([root]);
        assert_eq!(
            index.source_for(&ClassName::new("demo.A$Helper")),
            Some(normalize_path(&unit))
        );
    }

    #[test]
    fn test_directory_is_not_a_source() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        // demo/A.unit exists as a directory, not a file
        fs::create_dir_all(root.join("demo/A.unit")).unwrap();

        let index = SourceIndex::new([root]);
        assert_eq!(index.source_for(&ClassName::new("demo.A")), None);
    }

    #[test]
    fn test_miss_cache_cleared_by_invalidate() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(&root).unwrap();

        let index = SourceIndex::new([root.clone()]);
        let name = ClassName::new("demo.Late");
        assert_eq!(index.source_for(&name), None);

        // File appears after the miss was cached
        write_unit(&root, "demo/Late.unit", "class demo.Late");
        assert_eq!(index.source_for(&name), None);

        index.invalidate();
        assert!(index.source_for(&name).is_some());
    }

    #[test]
    fn test_stale_hit_reprobes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let unit = write_unit(&root, "demo/A.unit", "class demo.A");

        let index = SourceIndex::new([root]);
        let name = ClassName::new("demo.A");
        assert!(index.source_for(&name).is_some());

        fs::remove_file(&unit).unwrap();
        assert_eq!(index.source_for(&name), None);
    }

    #[test]
    fn test_class_for_maps_path_back() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let unit = write_unit(&root, "demo/blog/Post.unit", "class demo.blog.Post");

        let index = SourceIndex::new([root.clone()]);
        assert_eq!(index.class_for(&unit), Some(ClassName::new("demo.blog.Post")));
        assert_eq!(index.class_for(&root.join("demo/readme.txt")), None);
        assert_eq!(index.class_for(Path::new("/elsewhere/X.unit")), None);
    }

    #[test]
    fn test_scan_all_is_sorted_and_deduped() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("app");
        let second = dir.path().join("vendor/app");
        let a = write_unit(&first, "demo/A.unit", "class demo.A");
        write_unit(&second, "demo/A.unit", "class demo.A");
        write_unit(&second, "demo/B.unit", "class demo.B");
        write_unit(&first, "notes.md", "not a unit");

        let index = SourceIndex::new([first, second]);
        let units = index.scan_all();
        let names: Vec<_> = units.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["demo.A", "demo.B"]);
        assert_eq!(units[0].1, normalize_path(&a));
    }
}
