//! Live reload: detect, recompile, enhance, redefine.
//!
//! # Modules
//!
//! - `detect` - stamp sweep and root scan producing the changed set
//! - `cycle` - the all-or-nothing cycle over explicit dependencies
//! - `invalidate` - downstream cache fan-out
//!
//! A cycle either applies completely or fails with the previous
//! generation untouched. Compilation and enhancement failures keep the
//! old classes serving while the diagnostic travels to the operator;
//! structural changes reject the cycle and demand a cold restart.

pub mod cycle;
pub mod detect;
pub mod invalidate;


use thiserror::Error;

use crate::bytecode::ImageError;
use crate::compiler::{CompileError, CompileFailure};
use crate::core::ClassName;
use crate::define::RedefineError;
use crate::enhance::TransformError;
use crate::runtime::artifacts::ArtifactError;

pub use cycle::{CycleOutcome, ReloadCycle, build_enhance_context};
pub use detect::{ChangeSet, detect_changes};
pub use invalidate::{DownstreamCache, InvalidationFanout};

// ============================================================================
// Errors
// ============================================================================

/// A change the running generation cannot absorb in place.
#[derive(Debug, Clone, Error)]
#[error("`{class}`: {detail}")]
pub struct StructuralChange {
    pub class: ClassName,
    pub detail: String,
}

/// Why a reload cycle failed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source diagnostics. Deterministic, never retried; the previous
    /// generation keeps serving.
    #[error(transparent)]
    Compilation(#[from] CompileFailure),

    /// Enhancement pipeline failure. Propagates like a compilation
    /// failure.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A live class cannot keep its identity across this change. Only
    /// a cold restart recovers.
    #[error("structural change: {0}")]
    StructuralRedefinition(#[from] StructuralChange),

    /// No source and no platform fallback for this name.
    #[error("unresolved class `{0}`")]
    Unresolved(ClassName),

    /// Encoding an image failed mid-cycle.
    #[error("encoding `{class}` failed: {source}")]
    Encode {
        class: ClassName,
        source: ImageError,
    },

    /// The precompiled store could not be loaded.
    #[error(transparent)]
    Artifacts(#[from] ArtifactError),
}

impl LoadError {
    /// Whether the running generation survives this failure. When it
    /// does, the diagnostic is surfaced and old classes keep serving;
    /// when it does not, the next unit of work cold-starts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Compilation(_) | Self::Transform(_))
    }
}

impl From<CompileError> for LoadError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::Failure(failure) => Self::Compilation(failure),
            CompileError::Encode { class, source } => Self::Encode { class, source },
        }
    }
}

impl From<RedefineError> for LoadError {
    fn from(e: RedefineError) -> Self {
        match e {
            RedefineError::Structural { class, detail } => {
                Self::StructuralRedefinition(StructuralChange { class, detail })
            }
            RedefineError::Unavailable { class } => Self::Unresolved(class),
        }
    }
}
