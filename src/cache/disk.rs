//! Bytecode persistence between runs.
//!
//! Enhancement is the expensive half of the pipeline, so enhanced
//! images are written under `.kiln/cache/bytecode` and restored on the
//! next start when the source still hashes the same and the
//! enhancement pipeline is unchanged. Restore is tolerant: anything
//! unreadable or stale is skipped and simply recompiled.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::ClassCache;
use super::unit::{CachedClass, ClassUnit};
use crate::bytecode::decode_image;
use crate::core::ClassName;
use crate::freshness::SourceStamp;
use crate::utils::hash;

/// Cache directory name (inside project root)
pub const CACHE_DIR: &str = ".kiln/cache";

const INDEX_FILE: &str = "index.json";

// ============================================================================
// Index format
// ============================================================================

/// Index describing every persisted unit.
#[derive(Debug, Serialize, Deserialize)]
struct DiskIndex {
    /// Crate version that wrote the cache.
    version: String,
    /// Fingerprint of the enhancement pipeline the bytes went through.
    enhancer: String,
    /// Unix timestamp of the write.
    created_at: u64,
    /// Primary class name -> file info.
    entries: FxHashMap<String, DiskEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    filename: String,
    source_path: String,
    /// Blake3 hex of the source at compile time.
    source_hash: String,
}

/// One persisted unit with every class it declares.
#[derive(Serialize, Deserialize)]
struct PersistedUnit {
    name: String,
    classes: Vec<PersistedClass>,
}

#[derive(Serialize, Deserialize)]
struct PersistedClass {
    name: String,
    raw: Vec<u8>,
    enhanced: Vec<u8>,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Stable, filesystem-safe file name for a unit.
fn unit_filename(name: &ClassName) -> String {
    format!(
        "{}.{}.bc",
        name.as_str().replace('.', "_"),
        hash::fingerprint(name.as_str())
    )
}

// ============================================================================
// Disk cache
// ============================================================================

/// Reads and writes the on-disk bytecode cache of one project.
pub struct BytecodeDiskCache {
    dir: PathBuf,
}

impl BytecodeDiskCache {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: project_root.join(CACHE_DIR).join("bytecode"),
        }
    }

    /// Whether a cache from a previous run exists.
    pub fn has_cache(&self) -> bool {
        self.dir.join(INDEX_FILE).is_file()
    }

    /// Write every cached unit plus the index. Returns the unit count.
    pub fn persist(&self, cache: &ClassCache, enhancer: &str) -> io::Result<usize> {
        let snapshot = cache.snapshot();
        if snapshot.is_empty() {
            return Ok(0);
        }
        fs::create_dir_all(&self.dir)?;

        let mut entries = FxHashMap::default();
        for unit in snapshot.values() {
            let persisted = PersistedUnit {
                name: unit.name.to_string(),
                classes: unit
                    .classes
                    .iter()
                    .map(|c| PersistedClass {
                        name: c.name.to_string(),
                        raw: c.raw.clone(),
                        enhanced: c.enhanced.clone(),
                    })
                    .collect(),
            };
            let bytes = bincode::serde::encode_to_vec(&persisted, bincode::config::standard())
                .map_err(io::Error::other)?;
            let filename = unit_filename(&unit.name);
            fs::write(self.dir.join(&filename), bytes)?;

            entries.insert(
                unit.name.to_string(),
                DiskEntry {
                    filename,
                    source_path: unit.path.display().to_string(),
                    source_hash: unit.stamp.hash.to_hex(),
                },
            );
        }

        let index = DiskIndex {
            version: env!("CARGO_PKG_VERSION").to_string(),
            enhancer: enhancer.to_string(),
            created_at: current_timestamp(),
            entries,
        };
        let json = serde_json::to_vec_pretty(&index).map_err(io::Error::other)?;
        fs::write(self.dir.join(INDEX_FILE), json)?;

        crate::debug!("cache"; "persisted bytecode for {} unit(s)", snapshot.len());
        Ok(snapshot.len())
    }

    /// Load every unit whose source still matches its recorded hash.
    ///
    /// A missing index, a different crate version or a different
    /// enhancement pipeline discards the whole cache; individual stale
    /// or corrupt entries are skipped one by one.
    pub fn restore(&self, enhancer: &str) -> Vec<ClassUnit> {
        let Ok(bytes) = fs::read(self.dir.join(INDEX_FILE)) else {
            return Vec::new();
        };
        let Ok(index) = serde_json::from_slice::<DiskIndex>(&bytes) else {
            crate::debug!("cache"; "unreadable bytecode index, ignoring");
            return Vec::new();
        };
        if index.version != env!("CARGO_PKG_VERSION") {
            crate::debug!("cache"; "bytecode cache from version {}, discarding", index.version);
            return Vec::new();
        }
        if index.enhancer != enhancer {
            crate::debug!("cache"; "enhancement pipeline changed, discarding bytecode cache");
            return Vec::new();
        }

        let mut units = Vec::new();
        for (name, entry) in &index.entries {
            let source = PathBuf::from(&entry.source_path);
            // Stamp first, then compare: the stamp's hash is of the
            // content we just looked at, so a match proves the cached
            // bytes belong to the file as it is now.
            let stamp = SourceStamp::capture(&source);
            if stamp.hash.is_empty() || stamp.hash.to_hex() != entry.source_hash {
                continue;
            }
            match self.load_unit(&self.dir.join(&entry.filename), name, &source, stamp) {
                Some(unit) => units.push(unit),
                None => {
                    crate::debug!("cache"; "discarding cached bytecode for {name}");
                }
            }
        }
        units.sort_by(|a, b| a.name.cmp(&b.name));
        units
    }

    fn load_unit(
        &self,
        file: &Path,
        name: &str,
        source: &Path,
        stamp: SourceStamp,
    ) -> Option<ClassUnit> {
        let bytes = fs::read(file).ok()?;
        let (persisted, consumed): (PersistedUnit, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).ok()?;
        if consumed != bytes.len() || persisted.name != name || persisted.classes.is_empty() {
            return None;
        }

        let mut classes = Vec::with_capacity(persisted.classes.len());
        for class in persisted.classes {
            // Decoding validates the frame, which doubles as a
            // corruption check on the cached bytes.
            let image = decode_image(&class.enhanced).ok()?;
            let class_name = ClassName::from(class.name);
            if image.name != class_name {
                return None;
            }
            classes.push(CachedClass {
                name: class_name,
                raw: class.raw,
                enhanced: class.enhanced,
                image,
            });
        }

        Some(ClassUnit {
            name: ClassName::from(name),
            path: source.to_path_buf(),
            stamp,
            classes,
        })
    }

    /// Delete the cache directory.
    pub fn clear(&self) -> io::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
