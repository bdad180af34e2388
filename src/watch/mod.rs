//! Source tree watching.
//!
//! Watches the source roots plus the config file and drives the
//! runtime from the debounced event stream: a batch of source changes
//! triggers a reload pass, a config change forces a full restart.
//!
//! Pipeline:
//! ```text
//! notify → Debouncer (pure timing) → relevance filter → ApplicationRuntime
//! ```
//!
//! The watcher attaches before the first start so edits made while
//! the application is still cold-starting are buffered, not lost.
//! Relevance is deliberately coarse: the watcher only decides WHEN to
//! poke the runtime, and change detection inside the runtime decides
//! WHAT is stale.

use std::path::{Path, PathBuf};

use crossbeam::channel::{Receiver, select};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::config::{AppConfig, CONFIG_FILE};
use crate::core::SOURCE_EXT;
use crate::logger;
use crate::runtime::{ApplicationRuntime, ReloadReport};

// Pure timing and deduplication.
mod debounce;

#[cfg(test)]
mod tests;

use debounce::Debouncer;

/// Watches the source tree and feeds change batches to the runtime.
pub struct SourceWatcher {
    /// Raw notify events (notify's callback is sync; crossbeam bridges it)
    events: Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Watch-root consistency layer (attach/re-attach source roots)
    roots: WatchRoots,
    /// Debouncer state
    debouncer: Debouncer,
    /// Absolute config file path; a change here forces a restart
    config_path: PathBuf,
    source_roots: Vec<PathBuf>,
}

impl SourceWatcher {
    /// Create a watcher over the config's source roots.
    ///
    /// The watcher starts immediately, buffering events while the
    /// caller performs the initial start. This eliminates the window
    /// where an edit lands between startup scan and the event loop.
    pub fn new(config: &AppConfig) -> notify::Result<Self> {
        let (notify_tx, events) = crossbeam::channel::unbounded();

        // Create and configure watcher IMMEDIATELY
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Start watching all existing roots (missing roots will be re-attached later)
        let mut roots = WatchRoots::new(config.source_roots().to_vec());
        roots.attach_existing(&mut watcher)?;

        // The config file sits at the project root. Watch the root
        // non-recursively so an editor replacing the inode is still seen.
        watcher.watch(config.project_root(), RecursiveMode::NonRecursive)?;

        Ok(Self {
            events,
            watcher,
            roots,
            debouncer: Debouncer::new(config.reload.debounce(), config.reload.cooldown()),
            config_path: config.config_path.clone(),
            source_roots: config.source_roots().to_vec(),
        })
    }

    /// Run the watch loop until shutdown.
    ///
    /// Blocks the calling thread. Ctrl+C wakes the loop through the
    /// registered shutdown channel so it can stop between batches.
    pub fn run(self, runtime: &ApplicationRuntime) {
        // Extract fields before consuming self (select! borrows the receiver)
        let Self {
            events,
            mut watcher,
            mut roots,
            mut debouncer,
            config_path,
            source_roots,
        } = self;

        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
        crate::core::register_watch_loop(shutdown_tx);

        crate::log!("watch"; "watching {} source root(s)", source_roots.len());

        loop {
            if crate::core::is_shutdown() {
                break;
            }

            select! {
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => debouncer.add_event(&event),
                    // Watching continues but events may have been missed;
                    // the next real change still triggers detection.
                    Ok(Err(e)) => logger::status_warning(&format!("notify error: {e}")),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
                default(debouncer.sleep_duration()) => {
                    // Ensure watcher roots remain attached.
                    roots.maintain(&mut watcher);
                    process_ready(&mut debouncer, &config_path, &source_roots, runtime);
                }
            }
        }
    }
}

/// Drain the debouncer and drive the runtime if the batch is relevant.
fn process_ready(
    debouncer: &mut Debouncer,
    config_path: &Path,
    source_roots: &[PathBuf],
    runtime: &ApplicationRuntime,
) {
    let Some(raw) = debouncer.take_if_ready() else {
        return;
    };

    let mut config_changed = false;
    let mut sources = 0usize;
    for (path, kind) in &raw {
        if path == config_path {
            config_changed = true;
        } else if is_relevant(path, source_roots) {
            sources += 1;
            crate::debug!("watch"; "{}: {}", kind.label(), path.display());
        }
    }

    if !config_changed && sources == 0 {
        return;
    }

    if config_changed {
        crate::log!(
            "watch";
            "{} changed, restarting (new settings take effect after a process restart)",
            CONFIG_FILE
        );
        runtime.force_restart();
    }

    match runtime.detect_and_reload() {
        Ok(report @ ReloadReport::Clean) => logger::status_unchanged(&report.to_string()),
        Ok(report) => logger::status_success(&report.to_string()),
        Err(err) => logger::status_error("reload failed", &err.to_string()),
    }
}

/// Whether a changed path can affect the class space.
///
/// Source files count; so do extension-less paths under a root, since
/// directory create/remove events arrive without one.
fn is_relevant(path: &Path, source_roots: &[PathBuf]) -> bool {
    if !source_roots.iter().any(|root| path.starts_with(root)) {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext == SOURCE_EXT,
        None => true,
    }
}

// ============================================================================
// Watch Roots
// ============================================================================

/// Watch-root consistency manager.
///
/// Responsibility:
/// - Attach existing roots at startup
/// - Re-attach roots that were removed and recreated
struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    fn attach_existing(&mut self, watcher: &mut RecommendedWatcher) -> notify::Result<()> {
        for path in &self.desired {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }

        Ok(())
    }

    fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        // Drop stale handles for roots that no longer exist.
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }

            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}
