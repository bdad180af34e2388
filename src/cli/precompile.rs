//! The `precompile` command: build the production artifact store.
//!
//! Compiles every source under the roots as one batch, enhances the
//! resulting images in parallel, and writes one artifact per class
//! under the configured store. `run --prod` serves exactly these bytes.

use anyhow::{Result, anyhow, bail};
use rayon::prelude::*;

use crate::bytecode::ClassImage;
use crate::cache::ClassCache;
use crate::compiler::BatchCompiler;
use crate::config::AppConfig;
use crate::core::platform;
use crate::enhance::{Enhancer, TransformError};
use crate::index::SourceIndex;
use crate::logger::ProgressLine;
use crate::reload::build_enhance_context;
use crate::runtime::artifacts;

pub fn precompile(config: &AppConfig) -> Result<()> {
    let index = SourceIndex::new(config.source_roots().to_vec());
    let requests = index.scan_all();
    if requests.is_empty() {
        bail!("no sources under {}", config.project_root().display());
    }

    crate::log!("precompile"; "compiling {} source unit(s)", requests.len());

    // The whole application is one batch; outside references can only
    // be platform classes.
    let compiler = BatchCompiler::new();
    let is_known = |name: &crate::core::ClassName| platform::is_platform_class(name);
    let compiled = compiler
        .compile(&requests, &is_known)
        .map_err(|e| anyhow!("{e}"))?;

    let total: usize = compiled.iter().map(|unit| unit.classes.len()).sum();
    let progress = ProgressLine::new(&[("enhance", total)]);

    let enhancer = Enhancer::builtin();
    let ctx = build_enhance_context(
        &ClassCache::new(),
        compiled
            .iter()
            .flat_map(|unit| unit.classes.iter().map(|c| &c.image)),
    );

    let images = compiled
        .par_iter()
        .flat_map_iter(|unit| unit.classes.iter().map(|c| &c.image))
        .map(|image| {
            let enhanced = enhancer.enhance(image, &ctx)?;
            progress.inc("enhance");
            Ok(enhanced)
        })
        .collect::<Result<Vec<ClassImage>, TransformError>>()?;

    progress.finish();

    let store = config.precompile_dir();
    let count = artifacts::write_artifacts(store, &images)?;
    crate::log!("precompile"; "wrote {} artifact(s) to {}", count, store.display());

    Ok(())
}
