//! Defined-class handles and the class table.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use crate::bytecode::{ClassImage, Shape};
use crate::core::{ClassName, Generation};

/// A defined class with a stable handle.
///
/// The `Arc<DefinedClass>` handed out at definition time stays valid
/// across hot redefinitions: only the inner image is swapped. `version`
/// counts redefinitions, `generation` records the reload generation
/// that last wrote the image.
#[derive(Debug)]
pub struct DefinedClass {
    name: ClassName,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    image: ClassImage,
    generation: Generation,
    version: u64,
}

impl DefinedClass {
    fn new(image: ClassImage, generation: Generation) -> Self {
        Self {
            name: image.name.clone(),
            inner: RwLock::new(Inner {
                image,
                generation,
                version: 1,
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Snapshot of the current image.
    pub fn image(&self) -> ClassImage {
        self.inner.read().image.clone()
    }

    pub fn shape(&self) -> Shape {
        self.inner.read().image.shape()
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    pub fn generation(&self) -> Generation {
        self.inner.read().generation
    }

    /// Swap the image in place. Callers must have validated the shape.
    pub(crate) fn redefine(&self, image: ClassImage, generation: Generation) {
        debug_assert_eq!(image.name, self.name);
        let mut inner = self.inner.write();
        inner.image = image;
        inner.generation = generation;
        inner.version += 1;
    }
}

/// All currently defined classes of one runtime epoch.
///
/// A cold restart replaces the whole table; a hot swap mutates
/// individual entries through [`redefine_batch`](super::redefine_batch).
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: DashMap<ClassName, Arc<DefinedClass>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a class, returning its handle.
    ///
    /// An already-defined name keeps its existing handle and gets the
    /// new image swapped in, so accidental double definition can not
    /// split identity.
    pub fn define(&self, image: ClassImage, generation: Generation) -> Arc<DefinedClass> {
        match self.classes.entry(image.name.clone()) {
            Entry::Occupied(entry) => {
                let handle = entry.get().clone();
                handle.redefine(image, generation);
                handle
            }
            Entry::Vacant(entry) => {
                let handle = Arc::new(DefinedClass::new(image, generation));
                entry.insert(handle.clone());
                handle
            }
        }
    }

    pub fn get(&self, name: &ClassName) -> Option<Arc<DefinedClass>> {
        self.classes.get(name).map(|r| r.clone())
    }

    #[inline]
    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Names of all defined classes, sorted for stable reporting.
    pub fn names(&self) -> Vec<ClassName> {
        let mut names: Vec<_> = self.classes.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MethodBody, MethodDecl};

    fn image(name: &str, body: &str) -> ClassImage {
        let mut image = ClassImage::new(ClassName::new(name), None);
        image.methods.push(MethodDecl {
            name: "m".into(),
            body: MethodBody::Literal(body.into()),
        });
        image
    }

    #[test]
    fn test_define_and_get() {
        let table = ClassTable::new();
        let handle = table.define(image("demo.A", "v1"), Generation::new(1));
        assert_eq!(handle.name(), &ClassName::new("demo.A"));
        assert_eq!(handle.version(), 1);
        assert!(Arc::ptr_eq(&handle, &table.get(&ClassName::new("demo.A")).unwrap()));
    }

    #[test]
    fn test_redefine_keeps_handle_identity() {
        let table = ClassTable::new();
        let first = table.define(image("demo.A", "v1"), Generation::new(1));
        let second = table.define(image("demo.A", "v2"), Generation::new(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.version(), 2);
        assert_eq!(first.generation(), Generation::new(2));
        assert_eq!(
            first.image().method("m").unwrap().body,
            MethodBody::Literal("v2".into())
        );
    }

    #[test]
    fn test_names_sorted() {
        let table = ClassTable::new();
        table.define(image("demo.B", "b"), Generation::new(1));
        table.define(image("demo.A", "a"), Generation::new(1));
        let names: Vec<_> = table.names().iter().map(|n| n.as_str().to_string()).collect();
        assert_eq!(names, ["demo.A", "demo.B"]);
    }
}
