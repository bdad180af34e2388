//! The per-process application runtime.
//!
//! # Module Structure
//!
//! - `artifacts` - precompiled class store for production mode
//!
//! [`ApplicationRuntime`] owns every moving part of one running
//! application: configuration, the source index, the compiled-unit
//! cache, the compiler and enhancement pipeline, the live class table
//! behind its resolver, the invalidation fan-out and the reload lock.
//! Nothing here is process-global; worker threads share the runtime
//! through an `Arc`.
//!
//! # Locking
//!
//! One lock orders everything. Work admission ([`begin_work`]) holds
//! its read side for the lifetime of the returned [`WorkContext`];
//! a reload cycle or a cold start holds the write side, so changes are
//! applied only between units of work, never under one. Admission
//! itself runs detection (and any needed cycle) before downgrading to
//! the read side, which is what makes a saved file visible to the very
//! next unit of work.
//!
//! [`begin_work`]: ApplicationRuntime::begin_work

pub mod artifacts;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::{
    Mutex, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard,
};

use crate::cache::{BytecodeDiskCache, ClassCache};
use crate::compiler::BatchCompiler;
use crate::config::AppConfig;
use crate::core::{ClassName, Generation, RunMode};
use crate::define::{ClassTable, InvokeError, invoke};
use crate::enhance::Enhancer;
use crate::index::SourceIndex;
use crate::reload::{
    ChangeSet, CycleOutcome, InvalidationFanout, LoadError, ReloadCycle, detect_changes,
};
use crate::resolve::ClassResolver;
use crate::{debug, log};

// ============================================================================
// Reports
// ============================================================================

/// What one pass through the reload gate did.
#[derive(Debug)]
pub enum ReloadReport {
    /// Nothing was out of date.
    Clean,
    /// A reload cycle went live.
    Applied {
        generation: Generation,
        changed: Vec<ClassName>,
        redefined: usize,
    },
    /// The runtime cold-started, over a fresh table.
    Restarted {
        generation: Generation,
        defined: usize,
    },
}

impl fmt::Display for ReloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "up to date"),
            Self::Applied {
                generation,
                changed,
                redefined,
            } => write!(
                f,
                "{generation} live: {} class(es) recompiled, {redefined} redefined",
                changed.len()
            ),
            Self::Restarted {
                generation,
                defined,
            } => write!(f, "{generation} started: {defined} class(es) defined"),
        }
    }
}

// ============================================================================
// Work admission
// ============================================================================

/// One admitted unit of work.
///
/// Holds the read side of the reload lock, so no reload can begin
/// while the context is alive, and pins the resolver of the generation
/// the work was admitted into. Drop it when the unit of work is done.
pub struct WorkContext<'rt> {
    resolver: Arc<ClassResolver>,
    _admission: RwLockReadGuard<'rt, ()>,
}

impl WorkContext<'_> {
    #[inline]
    pub fn resolver(&self) -> &ClassResolver {
        &self.resolver
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.resolver.generation()
    }

    /// Invoke `method` on `class` against the pinned resolver.
    pub fn invoke(&self, class: &ClassName, method: &str) -> Result<String, InvokeError> {
        invoke(self.resolver.as_ref(), class, method)
    }
}

impl fmt::Debug for WorkContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkContext")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Runtime
// ============================================================================

pub struct ApplicationRuntime {
    config: AppConfig,
    mode: RunMode,
    index: SourceIndex,
    cache: Arc<ClassCache>,
    compiler: BatchCompiler,
    enhancer: Enhancer,
    /// Resolver of the currently applied generation.
    resolver: ArcSwap<ClassResolver>,
    fanout: InvalidationFanout,
    /// Read side admits work, write side reloads.
    reload_lock: RwLock<()>,
    started: AtomicBool,
    /// Last failure; admission keeps returning it until a cycle heals.
    pending: Mutex<Option<Arc<LoadError>>>,
    disk: Option<BytecodeDiskCache>,
}

impl ApplicationRuntime {
    pub fn new(config: AppConfig, mode: RunMode) -> Self {
        let index = SourceIndex::new(config.source_roots().iter().cloned());
        let cache = Arc::new(ClassCache::new());
        let disk = (mode.live_compile && config.reload.disk_cache)
            .then(|| BytecodeDiskCache::new(config.project_root()));
        let resolver = ClassResolver::new(
            Arc::new(ClassTable::new()),
            Arc::clone(&cache),
            Generation::INITIAL,
        );

        Self {
            config,
            mode,
            index,
            cache,
            compiler: BatchCompiler::new(),
            enhancer: Enhancer::builtin(),
            resolver: ArcSwap::from_pointee(resolver),
            fanout: InvalidationFanout::new(),
            reload_lock: RwLock::new(()),
            started: AtomicBool::new(false),
            pending: Mutex::new(None),
            disk,
        }
    }

    /// Development runtime: live recompilation, recoverable failures.
    pub fn dev(config: AppConfig) -> Self {
        Self::new(config, RunMode::DEVELOPMENT)
    }

    /// Production runtime: precompiled classes only, failures fatal.
    pub fn prod(config: AppConfig) -> Self {
        Self::new(config, RunMode::PRODUCTION)
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Currently applied generation.
    pub fn generation(&self) -> Generation {
        self.resolver.load().generation()
    }

    /// Resolver of the currently applied generation. Work that must
    /// not race a reload goes through [`Self::begin_work`] instead.
    pub fn resolver(&self) -> Arc<ClassResolver> {
        self.resolver.load_full()
    }

    #[inline]
    pub fn cache(&self) -> &ClassCache {
        &self.cache
    }

    /// Downstream caches to clear whenever a generation goes live.
    #[inline]
    pub fn fanout(&self) -> &InvalidationFanout {
        &self.fanout
    }

    // ========================================================================
    // lifecycle
    // ========================================================================

    /// Cold start. In production this loads the precompiled store; in
    /// development it compiles whatever is out of date, priming from
    /// the disk bytecode cache when one is configured.
    pub fn start(&self) -> Result<ReloadReport, Arc<LoadError>> {
        let _guard = self.reload_lock.write();
        if self.mode.live_compile {
            self.cold_start_locked()
        } else {
            self.start_prod_locked()
        }
    }

    /// Demand a cold start on the next admission. The watcher calls
    /// this when the configuration file changes.
    pub fn force_restart(&self) {
        self.started.store(false, Ordering::Release);
    }

    /// Admit one unit of work.
    ///
    /// Brings the application up to date first: a cold start when the
    /// runtime is not started, otherwise a reload cycle whenever
    /// sources changed. A pending failure is returned again on every
    /// admission until the tree compiles (or is reverted). The
    /// returned context holds the admission lock; the next reload
    /// waits for every live context to drop.
    pub fn begin_work(&self) -> Result<WorkContext<'_>, Arc<LoadError>> {
        let guard = self.reload_lock.upgradable_read();

        let current = self.is_started()
            && self.pending_error().is_none()
            && (!self.mode.live_compile || detect_changes(&self.cache, &self.index).is_empty());
        if current {
            return Ok(self.admit(RwLockUpgradableReadGuard::downgrade(guard)));
        }

        let guard = RwLockUpgradableReadGuard::upgrade(guard);
        self.bring_current_locked()?;
        Ok(self.admit(RwLockWriteGuard::downgrade(guard)))
    }

    /// Run detection and any needed cycle without admitting work.
    /// The watcher calls this; a no-op in production mode.
    pub fn detect_and_reload(&self) -> Result<ReloadReport, Arc<LoadError>> {
        let _guard = self.reload_lock.write();
        if !self.mode.live_compile {
            return Ok(ReloadReport::Clean);
        }
        if !self.is_started() {
            return self.cold_start_locked();
        }
        let changes = detect_changes(&self.cache, &self.index);
        if changes.is_empty() {
            self.clear_pending();
            return Ok(ReloadReport::Clean);
        }
        self.reload_locked(changes)
    }

    // ========================================================================
    // locked paths
    // ========================================================================

    fn admit<'rt>(&'rt self, guard: RwLockReadGuard<'rt, ()>) -> WorkContext<'rt> {
        WorkContext {
            resolver: self.resolver.load_full(),
            _admission: guard,
        }
    }

    /// Write-locked: make the applied generation match the sources.
    fn bring_current_locked(&self) -> Result<(), Arc<LoadError>> {
        if !self.mode.live_compile {
            // Production never recompiles. Either the store loaded at
            // start, or its failure stays fatal.
            return match self.pending_error() {
                Some(err) => Err(err),
                None if self.is_started() => Ok(()),
                None => self.start_prod_locked().map(|_| ()),
            };
        }
        if !self.is_started() {
            return self.cold_start_locked().map(|_| ());
        }

        let changes = detect_changes(&self.cache, &self.index);
        if changes.is_empty() {
            // A revert heals a pending failure without a cycle: the
            // tree matches what is already serving.
            self.clear_pending();
            return Ok(());
        }
        self.reload_locked(changes).map(|_| ())
    }

    /// Write-locked: fresh table, fresh resolver, everything defined.
    ///
    /// Units that are still current survive in the cache, so a restart
    /// after a structural change recompiles only what moved; stale and
    /// vanished units are dropped here and picked up by the cycle.
    fn cold_start_locked(&self) -> Result<ReloadReport, Arc<LoadError>> {
        let generation = self.generation().next();
        self.index.invalidate();

        // First start of the process: prime from the disk cache.
        if let Some(disk) = &self.disk
            && self.cache.is_empty()
        {
            let restored = disk.restore(self.enhancer.fingerprint());
            if !restored.is_empty() {
                log!("reload"; "restored {} unit(s) from the bytecode cache", restored.len());
                self.cache.insert_all(restored);
            }
        }

        let swept = self.cache.sweep();
        self.cache.remove_all(
            swept
                .stale
                .iter()
                .chain(swept.removed.iter())
                .map(|unit| &unit.name),
        );

        let table = Arc::new(ClassTable::new());
        let cycle = ReloadCycle {
            index: &self.index,
            cache: &self.cache,
            table: &table,
            compiler: &self.compiler,
            enhancer: &self.enhancer,
            generation,
        };
        if let Err(err) = cycle.run() {
            return Err(self.fail(err));
        }

        let resolver = ClassResolver::new(table, Arc::clone(&self.cache), generation);
        let defined = resolver.warm();
        self.resolver.store(Arc::new(resolver));
        self.fanout.fan_out();
        self.persist_disk();
        self.clear_pending();
        self.started.store(true, Ordering::Release);

        Ok(ReloadReport::Restarted {
            generation,
            defined,
        })
    }

    /// Write-locked: one cycle over the changed set, then publish the
    /// new generation's resolver and fan out invalidation.
    fn reload_locked(&self, changes: ChangeSet) -> Result<ReloadReport, Arc<LoadError>> {
        let current = self.resolver.load_full();
        let generation = current.generation().next();
        let cycle = ReloadCycle {
            index: &self.index,
            cache: &self.cache,
            table: current.table(),
            compiler: &self.compiler,
            enhancer: &self.enhancer,
            generation,
        };

        match cycle.run_with(changes) {
            Ok(CycleOutcome::Clean) => Ok(ReloadReport::Clean),
            Ok(CycleOutcome::Applied { changed, redefined }) => {
                let resolver = ClassResolver::new(
                    Arc::clone(current.table()),
                    Arc::clone(&self.cache),
                    generation,
                );
                self.resolver.store(Arc::new(resolver));
                self.fanout.fan_out();
                self.persist_disk();
                self.clear_pending();
                Ok(ReloadReport::Applied {
                    generation,
                    changed,
                    redefined,
                })
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Write-locked: define the precompiled store into a fresh table.
    fn start_prod_locked(&self) -> Result<ReloadReport, Arc<LoadError>> {
        let generation = self.generation().next();
        let images = match artifacts::load_artifacts(self.config.precompile_dir()) {
            Ok(images) => images,
            Err(err) => return Err(self.fail(err.into())),
        };

        let table = Arc::new(ClassTable::new());
        for image in images {
            table.define(image, generation);
        }
        let resolver = ClassResolver::new(table, Arc::clone(&self.cache), generation);
        // Platform classes come from the builtin images, on top of the
        // store.
        let defined = resolver.warm();
        self.resolver.store(Arc::new(resolver));
        self.fanout.fan_out();
        self.clear_pending();
        self.started.store(true, Ordering::Release);

        Ok(ReloadReport::Restarted {
            generation,
            defined,
        })
    }

    // ========================================================================
    // failure bookkeeping
    // ========================================================================

    fn fail(&self, err: LoadError) -> Arc<LoadError> {
        let err = Arc::new(err);
        *self.pending.lock() = Some(Arc::clone(&err));
        if !err.is_recoverable() || !self.mode.recoverable_failures {
            self.started.store(false, Ordering::Release);
        }
        err
    }

    fn pending_error(&self) -> Option<Arc<LoadError>> {
        self.pending.lock().clone()
    }

    fn clear_pending(&self) {
        *self.pending.lock() = None;
    }

    fn persist_disk(&self) {
        if let Some(disk) = &self.disk {
            match disk.persist(&self.cache, self.enhancer.fingerprint()) {
                Ok(count) => debug!("reload"; "persisted {count} unit(s) to the bytecode cache"),
                Err(err) => log!("warning"; "bytecode cache write failed: {err}"),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ClassImage, MethodBody, MethodDecl};
    use crate::core::platform;
    use crate::reload::DownstreamCache;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    const A_V1: &str = "class demo.A\n  method f() = \"v1\"\n";
    const A_V2: &str = "class demo.A\n  method f() = \"v2\"\n";
    const A_BROKEN: &str = "class demo.A\n  method f() =\n";
    const A_WITH_FIELD: &str = "class demo.A\n  field title: string\n  method f() = \"v1\"\n";
    const B_V1: &str = "class demo.B\n  method g() = \"b\"\n";

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = crate::utils::path::normalize_path(dir.path());
            fs::create_dir_all(root.join("app/demo")).unwrap();
            Self { _dir: dir, root }
        }

        fn config(&self) -> AppConfig {
            AppConfig::for_root(&self.root)
        }

        fn dev(&self) -> ApplicationRuntime {
            ApplicationRuntime::dev(self.config())
        }

        fn write(&self, rel: &str, text: &str) {
            fs::write(self.root.join("app").join(rel), text).unwrap();
        }

        /// Rewrite after letting the mtime tick over.
        fn edit(&self, rel: &str, text: &str) {
            sleep(Duration::from_millis(10));
            self.write(rel, text);
        }

        fn remove(&self, rel: &str) {
            fs::remove_file(self.root.join("app").join(rel)).unwrap();
        }
    }

    fn call(ctx: &WorkContext<'_>, class: &str, method: &str) -> String {
        ctx.invoke(&ClassName::from(class), method).unwrap()
    }

    struct CountingSink(AtomicUsize);

    impl DownstreamCache for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn invalidate(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_start_defines_the_whole_application() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        fx.write("demo/B.unit", B_V1);
        let rt = fx.dev();

        let (generation, defined) = match rt.start().unwrap() {
            ReloadReport::Restarted {
                generation,
                defined,
            } => (generation, defined),
            other => panic!("expected a restart, got {other:?}"),
        };
        assert_eq!(generation, Generation::INITIAL.next());
        assert_eq!(defined, 2 + platform::ALL.len());
        assert!(rt.is_started());
        assert!(rt.resolver().resolve(&ClassName::from("demo.B")).is_some());
    }

    #[test]
    fn test_begin_work_pins_the_current_generation() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        let ctx = rt.begin_work().unwrap();
        assert_eq!(ctx.generation(), rt.generation());
        assert_eq!(call(&ctx, "demo.A", "f"), "v1");
    }

    #[test]
    fn test_edit_goes_live_on_the_next_admission() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();
        let before = rt.generation();
        assert_eq!(call(&rt.begin_work().unwrap(), "demo.A", "f"), "v1");

        fx.edit("demo/A.unit", A_V2);

        let ctx = rt.begin_work().unwrap();
        assert_eq!(call(&ctx, "demo.A", "f"), "v2");
        assert_eq!(ctx.generation(), before.next());
    }

    #[test]
    fn test_watcher_reload_reports_the_applied_set() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        fx.write("demo/B.unit", B_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        fx.edit("demo/A.unit", A_V2);

        let (changed, redefined) = match rt.detect_and_reload().unwrap() {
            ReloadReport::Applied {
                changed, redefined, ..
            } => (changed, redefined),
            other => panic!("expected an applied cycle, got {other:?}"),
        };
        assert_eq!(changed, [ClassName::from("demo.A")]);
        // The class was warm, so the edit swapped a live handle.
        assert_eq!(redefined, 1);

        assert!(matches!(
            rt.detect_and_reload().unwrap(),
            ReloadReport::Clean
        ));
    }

    #[test]
    fn test_syntax_error_sticks_until_fixed() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        fx.edit("demo/A.unit", A_BROKEN);
        let err = rt.begin_work().unwrap_err();
        assert!(matches!(*err, LoadError::Compilation(_)));
        assert!(err.is_recoverable());
        // The old generation keeps serving other admissions' view.
        assert!(rt.is_started());

        // The failure is deterministic: admission keeps failing.
        assert!(rt.begin_work().is_err());

        fx.edit("demo/A.unit", A_V2);
        let ctx = rt.begin_work().unwrap();
        assert_eq!(call(&ctx, "demo.A", "f"), "v2");
        drop(ctx);
        assert!(matches!(
            rt.detect_and_reload().unwrap(),
            ReloadReport::Clean
        ));
    }

    #[test]
    fn test_revert_heals_a_pending_failure() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        fx.edit("demo/A.unit", A_BROKEN);
        assert!(rt.begin_work().is_err());

        // Putting the old content back makes the tree match what is
        // serving; no cycle needed.
        fx.edit("demo/A.unit", A_V1);
        let ctx = rt.begin_work().unwrap();
        assert_eq!(call(&ctx, "demo.A", "f"), "v1");
    }

    #[test]
    fn test_structural_change_stops_then_cold_starts() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();
        let before = rt.generation();
        let old = rt.resolver().resolve(&ClassName::from("demo.A")).unwrap();

        fx.edit("demo/A.unit", A_WITH_FIELD);
        let err = rt.begin_work().unwrap_err();
        assert!(matches!(*err, LoadError::StructuralRedefinition(_)));
        assert!(!err.is_recoverable());
        assert!(!rt.is_started());
        // The failed attempt burned no generation.
        assert_eq!(rt.generation(), before);

        // The next admission restarts over a fresh table.
        let ctx = rt.begin_work().unwrap();
        assert!(rt.is_started());
        assert_eq!(ctx.generation(), before.next());
        assert_eq!(call(&ctx, "demo.A", "f"), "v1");
        let fresh = ctx.resolver().resolve(&ClassName::from("demo.A")).unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(fresh.image().field("title").is_some());
    }

    #[test]
    fn test_vanished_source_restarts_without_it() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        fx.write("demo/B.unit", B_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        fx.remove("demo/B.unit");
        let err = rt.begin_work().unwrap_err();
        assert!(matches!(*err, LoadError::StructuralRedefinition(_)));
        assert!(!rt.is_started());

        let ctx = rt.begin_work().unwrap();
        assert_eq!(call(&ctx, "demo.A", "f"), "v1");
        assert!(
            ctx.resolver()
                .resolve(&ClassName::from("demo.B"))
                .is_none()
        );
    }

    #[test]
    fn test_force_restart_rebuilds_the_table() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();
        let before = rt.generation();
        let old = rt.resolver().resolve(&ClassName::from("demo.A")).unwrap();

        rt.force_restart();
        assert!(!rt.is_started());

        let report = rt.detect_and_reload().unwrap();
        assert!(matches!(report, ReloadReport::Restarted { .. }));
        assert_eq!(rt.generation(), before.next());
        let fresh = rt.resolver().resolve(&ClassName::from("demo.A")).unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
    }

    #[test]
    fn test_fanout_fires_once_per_applied_generation() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        rt.fanout().register(sink.clone());

        rt.start().unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        fx.edit("demo/A.unit", A_V2);
        rt.detect_and_reload().unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);

        // Clean passes and failed cycles do not invalidate.
        rt.detect_and_reload().unwrap();
        fx.edit("demo/A.unit", A_BROKEN);
        assert!(rt.detect_and_reload().is_err());
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_admitted_work_blocks_the_next_reload() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let rt = fx.dev();
        rt.start().unwrap();

        let ctx = rt.begin_work().unwrap();
        fx.edit("demo/A.unit", A_V2);

        let (tx, rx) = crossbeam::channel::bounded(1);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                tx.send(rt.detect_and_reload().unwrap()).unwrap();
            });

            // The cycle waits for the admitted work to finish.
            assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
            assert_eq!(call(&ctx, "demo.A", "f"), "v1");
            drop(ctx);

            let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(matches!(report, ReloadReport::Applied { .. }));
        });

        assert_eq!(call(&rt.begin_work().unwrap(), "demo.A", "f"), "v2");
    }

    #[test]
    fn test_restart_picks_up_persisted_bytecode() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);

        let first = fx.dev();
        first.start().unwrap();
        drop(first);
        assert!(
            fx.root
                .join(".kiln/cache/bytecode/index.json")
                .is_file()
        );

        // A new process over the same tree serves the same classes.
        let second = fx.dev();
        let report = second.start().unwrap();
        assert!(matches!(report, ReloadReport::Restarted { .. }));
        assert_eq!(call(&second.begin_work().unwrap(), "demo.A", "f"), "v1");
    }

    #[test]
    fn test_prod_mode_serves_artifacts_and_ignores_sources() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);
        let config = fx.config();

        let mut image = ClassImage::new(
            ClassName::from("demo.A"),
            Some(ClassName::from("kiln.Object")),
        );
        image.methods.push(MethodDecl {
            name: "f".to_string(),
            body: MethodBody::Literal("precompiled".to_string()),
        });
        artifacts::write_artifacts(config.precompile_dir(), &[image]).unwrap();

        let rt = ApplicationRuntime::prod(config);
        rt.start().unwrap();

        let ctx = rt.begin_work().unwrap();
        assert_eq!(call(&ctx, "demo.A", "f"), "precompiled");
        drop(ctx);

        // Source edits are invisible to a production runtime.
        fx.edit("demo/A.unit", A_V2);
        assert_eq!(call(&rt.begin_work().unwrap(), "demo.A", "f"), "precompiled");
    }

    #[test]
    fn test_prod_mode_without_a_store_is_fatal() {
        let fx = Fixture::new();
        fx.write("demo/A.unit", A_V1);

        let rt = ApplicationRuntime::prod(fx.config());
        let err = rt.start().unwrap_err();
        assert!(matches!(*err, LoadError::Artifacts(_)));
        assert!(!err.is_recoverable());
        assert!(!rt.is_started());
        // The failure stays fatal on admission too.
        assert!(rt.begin_work().is_err());
    }
}
