//! The `clean` command: drop everything kiln wrote.

use anyhow::{Context, Result};

use crate::cache::BytecodeDiskCache;
use crate::config::AppConfig;

/// Remove the bytecode cache and the artifact store.
pub fn clean(config: &AppConfig) -> Result<()> {
    let mut removed = 0usize;

    let disk = BytecodeDiskCache::new(config.project_root());
    if disk.has_cache() {
        disk.clear().context("clearing bytecode cache")?;
        crate::log!("clean"; "removed bytecode cache");
        removed += 1;
    }

    let store = config.precompile_dir();
    if store.exists() {
        std::fs::remove_dir_all(store)
            .with_context(|| format!("removing {}", store.display()))?;
        crate::log!("clean"; "removed {}", store.display());
        removed += 1;
    }

    if removed == 0 {
        crate::log!("clean"; "nothing to clean");
    }
    Ok(())
}
