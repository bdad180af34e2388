//! Class enhancement pipeline.
//!
//! Between compilation and definition every image passes through a
//! pipeline of [`Transform`]s. Transforms are registered explicitly and
//! run in registration order, so enhancement is deterministic for a
//! given pipeline.
//!
//! Two invariants the pipeline maintains:
//! - **Idempotence**: an enhanced image carries the pipeline
//!   fingerprint in its `kiln.enhanced` attribute and is returned
//!   unchanged when enhanced again. Individual transforms also skip
//!   members that already exist, so a fingerprint mismatch (pipeline
//!   changed between runs) re-enhances without duplicating anything.
//! - **Plugin exemption**: classes whose superclass chain reaches
//!   `kiln.Plugin` run exactly as compiled. The check walks the actual
//!   chain rather than matching names, so renaming an intermediate
//!   base class can not smuggle a plugin into the pipeline.
//!
//! # Modules
//!
//! - `constructors`: synthesizes a default `new()` method
//! - `properties`: synthesizes accessor methods for declared fields
//! - `persistence`: synthesizes finder methods on `kiln.Model` descendants

mod constructors;
mod persistence;
mod properties;

pub use constructors::ConstructorsTransform;
pub use persistence::PersistenceTransform;
pub use properties::PropertiesTransform;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::bytecode::ClassImage;
use crate::core::{ClassName, platform};
use crate::utils::hash;

/// Attribute recording the fingerprint of the pipeline that enhanced
/// an image.
pub const MARKER_ATTR: &str = "kiln.enhanced";

#[derive(Debug, Clone, Error)]
#[error("transform `{transform}` failed on `{class}`: {detail}")]
pub struct TransformError {
    pub transform: &'static str,
    pub class: ClassName,
    pub detail: String,
}

/// Superclass knowledge available during enhancement.
///
/// Snapshot of child -> superclass edges covering the platform
/// hierarchy, already-defined classes and the batch being processed.
#[derive(Debug, Default)]
pub struct EnhanceContext {
    supers: FxHashMap<ClassName, ClassName>,
}

impl EnhanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ClassName, superclass: ClassName) {
        self.supers.insert(class, superclass);
    }

    /// Add every class of `images`, platform edges included.
    pub fn extend_from_images<'a>(&mut self, images: impl IntoIterator<Item = &'a ClassImage>) {
        for image in images {
            if let Some(superclass) = &image.superclass {
                self.insert(image.name.clone(), superclass.clone());
            }
        }
    }

    #[inline]
    pub fn superclass_of(&self, name: &ClassName) -> Option<&ClassName> {
        self.supers.get(name)
    }
}

/// One step of the enhancement pipeline.
pub trait Transform: Send + Sync {
    /// Stable identifier, part of the pipeline fingerprint.
    fn id(&self) -> &'static str;

    fn apply(&self, image: &mut ClassImage, ctx: &EnhanceContext) -> Result<(), TransformError>;
}

/// Walk the superclass chain of `image` looking for `ancestor`.
///
/// Unknown classes end the walk. A revisited class means the chain is
/// cyclic, reported as an error instead of looping.
pub fn descends_from(
    image: &ClassImage,
    ancestor: &ClassName,
    ctx: &EnhanceContext,
) -> Result<bool, String> {
    let mut visited: FxHashSet<ClassName> = FxHashSet::default();
    visited.insert(image.name.clone());
    let mut current = image.superclass.clone();
    while let Some(name) = current {
        if &name == ancestor {
            return Ok(true);
        }
        if !visited.insert(name.clone()) {
            return Err(format!("superclass cycle through `{name}`"));
        }
        current = ctx.superclass_of(&name).cloned();
    }
    Ok(false)
}

/// The transformation registry.
pub struct Enhancer {
    transforms: Vec<Box<dyn Transform>>,
    fingerprint: String,
}

impl Enhancer {
    /// The standard pipeline, in the order the engine applies it.
    pub fn builtin() -> Self {
        Self::from_transforms(vec![
            Box::new(ConstructorsTransform),
            Box::new(PropertiesTransform),
            Box::new(PersistenceTransform),
        ])
    }

    pub fn from_transforms(transforms: Vec<Box<dyn Transform>>) -> Self {
        let ids: Vec<&str> = transforms.iter().map(|t| t.id()).collect();
        let fingerprint = hash::fingerprint(&ids.join("\n"));
        Self {
            transforms,
            fingerprint,
        }
    }

    /// Fingerprint of this pipeline. Also keys the disk cache: images
    /// enhanced by a different pipeline are stale.
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Run the pipeline over `image`, returning the enhanced copy.
    ///
    /// Already-enhanced images and plugin descendants come back as
    /// plain clones (the latter without a marker, so the exemption is
    /// re-evaluated if the hierarchy changes).
    pub fn enhance(
        &self,
        image: &ClassImage,
        ctx: &EnhanceContext,
    ) -> Result<ClassImage, TransformError> {
        if image.attribute(MARKER_ATTR) == Some(self.fingerprint.as_str()) {
            return Ok(image.clone());
        }

        let plugin = ClassName::new(platform::PLUGIN);
        let exempt = descends_from(image, &plugin, ctx).map_err(|detail| TransformError {
            transform: "plugin-exemption",
            class: image.name.clone(),
            detail,
        })?;
        if exempt {
            return Ok(image.clone());
        }

        let mut enhanced = image.clone();
        for transform in &self.transforms {
            transform.apply(&mut enhanced, ctx)?;
        }
        enhanced.set_attribute(MARKER_ATTR, &self.fingerprint);
        Ok(enhanced)
    }
}
