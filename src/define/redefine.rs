//! Batch redefinition with validate-all-then-commit semantics.

use thiserror::Error;

use crate::bytecode::ClassImage;
use crate::core::{ClassName, Generation};

use super::table::ClassTable;

/// One class to redefine, carrying its new enhanced image.
#[derive(Debug)]
pub struct Redefinition {
    pub image: ClassImage,
}

impl Redefinition {
    pub fn new(image: ClassImage) -> Self {
        Self { image }
    }

    #[inline]
    pub fn class(&self) -> &ClassName {
        &self.image.name
    }
}

#[derive(Debug, Clone, Error)]
pub enum RedefineError {
    /// The new image differs structurally from the live class. Only
    /// method bodies may change in place.
    #[error("structural change in `{class}`: {detail}")]
    Structural { class: ClassName, detail: String },

    /// The class is not currently defined, so there is nothing to
    /// redefine. New classes are defined lazily instead.
    #[error("class `{class}` is not defined")]
    Unavailable { class: ClassName },
}

/// Apply a batch of redefinitions to `table`.
///
/// Two passes: every item is validated against the live shape first,
/// then the whole batch commits. A failure in the first pass rejects
/// the batch with no entry touched, so the table never holds a
/// half-applied batch.
pub fn redefine_batch(
    table: &ClassTable,
    batch: Vec<Redefinition>,
    generation: Generation,
) -> Result<(), RedefineError> {
    let mut validated = Vec::with_capacity(batch.len());
    for item in batch {
        let class = item.class().clone();
        let Some(live) = table.get(&class) else {
            return Err(RedefineError::Unavailable { class });
        };
        if let Some(detail) = live.shape().diff(&item.image.shape()) {
            return Err(RedefineError::Structural { class, detail });
        }
        validated.push((live, item.image));
    }

    for (live, image) in validated {
        live.redefine(image, generation);
    }
    Ok(())
}
