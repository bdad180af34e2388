//! Cached compilation artifacts for one source unit.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bytecode::ClassImage;
use crate::compiler::CompiledUnit;
use crate::core::ClassName;
use crate::freshness::SourceStamp;

/// One class inside a cached unit.
#[derive(Debug, Clone)]
pub struct CachedClass {
    pub name: ClassName,
    /// Encoded image as the compiler produced it.
    pub raw: Vec<u8>,
    /// Encoded image after enhancement. This is what gets defined.
    pub enhanced: Vec<u8>,
    /// Decoded enhanced image.
    pub image: ClassImage,
}

/// All artifacts from one compiled source unit.
///
/// Units are immutable once built: a recompile builds a fresh
/// `ClassUnit` and replaces the cache entry wholesale, so readers
/// holding an `Arc` never see a half-updated unit.
#[derive(Debug)]
pub struct ClassUnit {
    /// Primary (top-level) class name, the cache key.
    pub name: ClassName,
    pub path: PathBuf,
    /// Source identity at compile time.
    pub stamp: SourceStamp,
    /// Primary class first, nested classes after, declaration order.
    pub classes: Vec<CachedClass>,
}

impl ClassUnit {
    /// Assemble a unit from compiler output and the enhanced images,
    /// aligned by position.
    pub fn assemble(
        compiled: CompiledUnit,
        enhanced: Vec<(ClassImage, Vec<u8>)>,
    ) -> Self {
        debug_assert_eq!(compiled.classes.len(), enhanced.len());
        let classes = compiled
            .classes
            .into_iter()
            .zip(enhanced)
            .map(|(class, (image, bytes))| CachedClass {
                name: class.image.name.clone(),
                raw: class.bytes,
                enhanced: bytes,
                image,
            })
            .collect();
        Self {
            name: compiled.name,
            path: compiled.path,
            stamp: compiled.stamp,
            classes,
        }
    }

    /// Find a class of this unit by name (primary or nested).
    pub fn class(&self, name: &ClassName) -> Option<&CachedClass> {
        self.classes.iter().find(|c| &c.name == name)
    }

    /// Names of every class this unit declares.
    pub fn class_names(&self) -> impl Iterator<Item = &ClassName> {
        self.classes.iter().map(|c| &c.name)
    }

    /// Whether the source file still matches the recorded stamp.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.stamp.is_current(&self.path)
    }
}

/// Convenience alias used by the cache map.
pub type SharedUnit = Arc<ClassUnit>;
