//! The `check` command: compile everything once and report.

use anyhow::{Result, anyhow};

use crate::config::AppConfig;
use crate::runtime::ApplicationRuntime;

/// Compile and enhance every source, then throw the result away.
///
/// The disk cache is disabled so nothing is skipped and nothing is
/// written; this is a pure diagnostics pass.
pub fn check(mut config: AppConfig) -> Result<()> {
    config.reload.disk_cache = false;

    let runtime = ApplicationRuntime::dev(config);
    match runtime.start() {
        Ok(_) => {
            crate::log!("check"; "ok: {} source unit(s) compiled", runtime.cache().len());
            Ok(())
        }
        Err(e) => Err(anyhow!("{e}")),
    }
}
