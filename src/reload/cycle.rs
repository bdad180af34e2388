//! The reload cycle: changed sources to redefined classes, all or
//! nothing.
//!
//! Phases run in a fixed order: detect, recompile, enhance, redefine,
//! publish. Cache publication comes last and is a single snapshot
//! swap, so a failing phase leaves both the cache and the table
//! exactly as they were. The caller is expected to hold the process
//! reload lock for the whole run.

use rustc_hash::FxHashSet;

use super::detect::{ChangeSet, detect_changes};
use super::{LoadError, StructuralChange};
use crate::bytecode::{ClassImage, encode_image};
use crate::cache::{ClassCache, ClassUnit};
use crate::compiler::{BatchCompiler, CompilerBackend, UnitCompiler};
use crate::core::{ClassName, Generation, platform};
use crate::define::{ClassTable, Redefinition, redefine_batch};
use crate::enhance::{EnhanceContext, Enhancer};
use crate::index::SourceIndex;
use crate::resolve::platform_image;

/// Superclass knowledge for an enhancement run: the platform classes,
/// everything already cached, then `batch` (whose entries win, they
/// are the freshest).
pub fn build_enhance_context<'a>(
    cache: &ClassCache,
    batch: impl IntoIterator<Item = &'a ClassImage>,
) -> EnhanceContext {
    let mut ctx = EnhanceContext::new();
    for name in platform::ALL {
        if let Some(image) = platform_image(&ClassName::new(*name)) {
            ctx.extend_from_images(std::iter::once(&image));
        }
    }
    for unit in cache.snapshot().values() {
        ctx.extend_from_images(unit.classes.iter().map(|c| &c.image));
    }
    ctx.extend_from_images(batch);
    ctx
}

// ============================================================================
// Cycle
// ============================================================================

/// What a successful cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing was out of date.
    Clean,
    /// The changed set compiled, enhanced and went live.
    Applied {
        /// Every class name the cycle produced, sorted.
        changed: Vec<ClassName>,
        /// How many of those had live handles and were redefined.
        redefined: usize,
    },
}

/// Explicit dependencies for one cycle run.
pub struct ReloadCycle<'a, B: CompilerBackend = UnitCompiler> {
    pub index: &'a SourceIndex,
    pub cache: &'a ClassCache,
    pub table: &'a ClassTable,
    pub compiler: &'a BatchCompiler<B>,
    pub enhancer: &'a Enhancer,
    /// Generation the cycle applies as.
    pub generation: Generation,
}

impl<B: CompilerBackend> ReloadCycle<'_, B> {
    /// Detect changes and, if there are any, run the full cycle.
    pub fn run(&self) -> Result<CycleOutcome, LoadError> {
        self.run_with(detect_changes(self.cache, self.index))
    }

    /// Run the phases over an already detected changed set.
    pub fn run_with(&self, changes: ChangeSet) -> Result<CycleOutcome, LoadError> {
        if changes.is_empty() {
            return Ok(CycleOutcome::Clean);
        }

        // A vanished source cannot be absorbed in place: its classes
        // keep live handles with no source behind them.
        if let Some(unit) = changes.vanished.first() {
            return Err(StructuralChange {
                class: unit.name.clone(),
                detail: "source file was removed".to_string(),
            }
            .into());
        }

        crate::debug!("reload"; "recompiling: {changes}");

        // One batch for the whole changed set. Names outside the batch
        // are known if the platform, the table or the cache knows them.
        let requests = changes.to_compile();
        let is_known = |name: &ClassName| {
            platform::is_platform_class(name)
                || self.table.contains(name)
                || self
                    .cache
                    .unit_of(name)
                    .is_some_and(|unit| unit.class(name).is_some())
        };
        let compiled = self.compiler.compile(&requests, &is_known)?;

        // Enhance against the whole application's superclass map so
        // plugin exemption sees hierarchy edges outside the batch.
        let ctx = build_enhance_context(
            self.cache,
            compiled
                .iter()
                .flat_map(|unit| unit.classes.iter().map(|c| &c.image)),
        );
        let mut assembled = Vec::with_capacity(compiled.len());
        for unit in compiled {
            let mut enhanced = Vec::with_capacity(unit.classes.len());
            for class in &unit.classes {
                let image = self.enhancer.enhance(&class.image, &ctx)?;
                let bytes = encode_image(&image).map_err(|source| LoadError::Encode {
                    class: image.name.clone(),
                    source,
                })?;
                enhanced.push((image, bytes));
            }
            assembled.push(ClassUnit::assemble(unit, enhanced));
        }

        // A live class that its recompiled unit no longer declares is
        // as structural as a changed shape.
        for old_unit in &changes.modified {
            let Some(new_unit) = assembled.iter().find(|u| u.name == old_unit.name) else {
                continue;
            };
            for name in old_unit.class_names() {
                if new_unit.class(name).is_none() && self.table.contains(name) {
                    return Err(StructuralChange {
                        class: name.clone(),
                        detail: "class is no longer declared by its source unit".to_string(),
                    }
                    .into());
                }
            }
        }

        // Redefine every changed class that already has a handle; the
        // rest stay cache-only until someone resolves them.
        let mut batch = Vec::new();
        for unit in &assembled {
            for class in &unit.classes {
                if self.table.contains(&class.name) {
                    batch.push(Redefinition::new(class.image.clone()));
                }
            }
        }
        let redefined = batch.len();
        redefine_batch(self.table, batch, self.generation)?;

        let mut changed: Vec<ClassName> = assembled
            .iter()
            .flat_map(|unit| unit.class_names().cloned())
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        changed.sort();

        // Publish last; one swap makes the whole batch visible.
        self.cache.insert_all(assembled);

        Ok(CycleOutcome::Applied { changed, redefined })
    }
}
