//! Class resolution: name to live handle.
//!
//! Resolution composes three sources in a fixed order: the table of
//! already defined classes, the built-in platform classes, then
//! compiled units from the class cache. Platform names win over
//! cached units, so an application source file can never shadow
//! `kiln.Model` and friends. Defining a cached unit defines every
//! class the unit declares, so nested classes become resolvable the
//! moment any sibling is touched.
//!
//! A resolver is pinned to the generation it was built for. Every
//! applied reload installs a fresh one over the same table; work that
//! is already in flight keeps the resolver it started with. A full
//! restart builds one over a new table.

mod builtin;

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashSet;

use crate::cache::ClassCache;
use crate::core::{ClassName, Generation, platform};
use crate::define::{ClassLookup, ClassTable, DefinedClass};

pub use builtin::platform_image;

// ============================================================================
// Resolver
// ============================================================================

pub struct ClassResolver {
    table: Arc<ClassTable>,
    cache: Arc<ClassCache>,
    generation: Generation,
    /// Memoized assignability answers.
    assignable: DashMap<(ClassName, ClassName), bool>,
}

impl ClassResolver {
    pub fn new(table: Arc<ClassTable>, cache: Arc<ClassCache>, generation: Generation) -> Self {
        Self {
            table,
            cache,
            generation,
            assignable: DashMap::new(),
        }
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub fn table(&self) -> &Arc<ClassTable> {
        &self.table
    }

    /// Resolve a name to its live handle, defining the class on the
    /// way if it is a platform class or its unit is already compiled.
    pub fn resolve(&self, name: &ClassName) -> Option<Arc<DefinedClass>> {
        if let Some(defined) = self.table.get(name) {
            return Some(defined);
        }
        if platform::is_platform_class(name) {
            let image = builtin::platform_image(name)?;
            return Some(self.table.define(image, self.generation));
        }

        let unit = self.cache.unit_of(name)?;
        unit.class(name)?;
        let mut requested = None;
        for class in &unit.classes {
            let handle = self.table.define(class.image.clone(), self.generation);
            if handle.name() == name {
                requested = Some(handle);
            }
        }
        requested
    }

    /// Define all platform classes and every compiled unit up front.
    /// Returns the number of defined classes.
    pub fn warm(&self) -> usize {
        for name in platform::ALL {
            self.resolve(&ClassName::from(*name));
        }
        for name in self.cache.names() {
            self.resolve(&name);
        }
        self.table.len()
    }

    /// Whether `child` is `ancestor` or descends from it.
    pub fn assignable_to(&self, child: &ClassName, ancestor: &ClassName) -> bool {
        if child == ancestor {
            return true;
        }
        let key = (child.clone(), ancestor.clone());
        if let Some(hit) = self.assignable.get(&key) {
            return *hit;
        }
        let result = self.walks_to(child, ancestor);
        self.assignable.insert(key, result);
        result
    }

    fn walks_to(&self, child: &ClassName, ancestor: &ClassName) -> bool {
        let mut visited = FxHashSet::default();
        let mut current = child.clone();
        loop {
            if !visited.insert(current.clone()) {
                return false;
            }
            let Some(handle) = self.resolve(&current) else {
                return false;
            };
            let Some(superclass) = handle.image().superclass else {
                return false;
            };
            if &superclass == ancestor {
                return true;
            }
            current = superclass;
        }
    }

    /// Defined classes that descend from `ancestor`, sorted by name.
    /// The ancestor itself is not included.
    pub fn assignable_classes(&self, ancestor: &ClassName) -> Vec<Arc<DefinedClass>> {
        let mut found = Vec::new();
        for name in self.table.names() {
            if &name != ancestor
                && self.assignable_to(&name, ancestor)
                && let Some(handle) = self.table.get(&name)
            {
                found.push(handle);
            }
        }
        found
    }
}

impl ClassLookup for ClassResolver {
    fn lookup(&self, name: &ClassName) -> Option<Arc<DefinedClass>> {
        self.resolve(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
