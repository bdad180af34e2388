//! In-memory artifact cache plus on-disk bytecode persistence.
//!
//! Modules:
//! - `unit`: immutable per-source-unit artifact bundles
//! - `disk`: enhanced-bytecode persistence between runs
//!
//! The in-memory side is a snapshot map: readers load an `Arc` to the
//! whole map and never block, writers clone, mutate and swap. Batch
//! insertion is a single swap, so a reload either publishes all of a
//! batch's units or none of them.

mod disk;
mod unit;

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::core::ClassName;

pub use disk::{BytecodeDiskCache, CACHE_DIR};
pub use unit::{CachedClass, ClassUnit, SharedUnit};

/// Snapshot map from primary class name to its unit.
pub type UnitMap = FxHashMap<ClassName, SharedUnit>;

// ============================================================================
// Class cache
// ============================================================================

/// Lock-free-read cache of compiled units.
///
/// Keyed by the unit's primary class name; nested classes are found by
/// mapping through [`ClassName::top_level`].
pub struct ClassCache {
    snapshot: ArcSwap<UnitMap>,
    /// Serializes writers. Readers never take it.
    write: Mutex<()>,
}

impl ClassCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(UnitMap::default()),
            write: Mutex::new(()),
        }
    }

    /// Current snapshot. The returned map is immutable; later writes
    /// publish a new one.
    #[inline]
    pub fn snapshot(&self) -> Arc<UnitMap> {
        self.snapshot.load_full()
    }

    /// Unit for a primary class name.
    pub fn unit(&self, name: &ClassName) -> Option<SharedUnit> {
        self.snapshot.load().get(name).cloned()
    }

    /// Unit declaring `class`, which may be a nested name.
    pub fn unit_of(&self, class: &ClassName) -> Option<SharedUnit> {
        if class.is_nested() {
            self.unit(&class.top_level())
        } else {
            self.unit(class)
        }
    }

    /// Publish one unit, replacing any previous entry for its name.
    pub fn insert(&self, unit: ClassUnit) {
        self.insert_all(std::iter::once(unit));
    }

    /// Publish a batch of units in one swap.
    pub fn insert_all(&self, units: impl IntoIterator<Item = ClassUnit>) {
        let _guard = self.write.lock();
        let mut next: UnitMap = (**self.snapshot.load()).clone();
        for unit in units {
            next.insert(unit.name.clone(), Arc::new(unit));
        }
        self.snapshot.store(Arc::new(next));
    }

    /// Drop the entries for the given primary class names.
    pub fn remove_all<'a>(&self, names: impl IntoIterator<Item = &'a ClassName>) {
        let _guard = self.write.lock();
        let mut next: UnitMap = (**self.snapshot.load()).clone();
        let mut touched = false;
        for name in names {
            touched |= next.remove(name).is_some();
        }
        if touched {
            self.snapshot.store(Arc::new(next));
        }
    }

    /// Drop everything. Used by full restarts.
    pub fn clear(&self) {
        let _guard = self.write.lock();
        self.snapshot.store(Arc::new(UnitMap::default()));
    }

    /// Units whose source no longer matches its stamp, sorted by name.
    /// Units whose source file vanished are reported separately.
    pub fn sweep(&self) -> SweepReport {
        let snapshot = self.snapshot.load();
        let mut stale = Vec::new();
        let mut removed = Vec::new();
        for unit in snapshot.values() {
            if !unit.path.is_file() {
                removed.push(unit.clone());
            } else if !unit.is_current() {
                stale.push(unit.clone());
            }
        }
        stale.sort_by(|a, b| a.name.cmp(&b.name));
        removed.sort_by(|a, b| a.name.cmp(&b.name));
        SweepReport { stale, removed }
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Primary class names, sorted.
    pub fn names(&self) -> Vec<ClassName> {
        let mut names: Vec<_> = self.snapshot.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ClassCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a freshness sweep over the cache.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Units whose source changed on disk.
    pub stale: Vec<SharedUnit>,
    /// Units whose source file is gone.
    pub removed: Vec<SharedUnit>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.removed.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
