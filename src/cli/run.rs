//! The `run` command: start the application and keep it live.
//!
//! Dev mode owns the full loop: watcher first (so edits made during
//! the initial start are buffered, not lost), then the cold start,
//! then the watch loop driving reloads. Prod mode starts from the
//! artifact store and just parks until shutdown.

use anyhow::{Result, anyhow, bail};

use super::RunArgs;
use crate::config::AppConfig;
use crate::core::ClassName;
use crate::logger;
use crate::runtime::ApplicationRuntime;
use crate::watch::SourceWatcher;

pub fn run(config: AppConfig, args: &RunArgs) -> Result<()> {
    if args.prod {
        run_prod(config, args)
    } else {
        run_dev(config, args)
    }
}

fn run_dev(config: AppConfig, args: &RunArgs) -> Result<()> {
    let watch = args.watch.unwrap_or(config.reload.watch) && args.call.is_none();

    // Watcher before the first start: events buffer while classes are
    // still being defined.
    let watcher = if watch {
        Some(SourceWatcher::new(&config)?)
    } else {
        None
    };

    let runtime = ApplicationRuntime::dev(config);
    match runtime.start() {
        Ok(report) => crate::log!("run"; "{}", report),
        Err(e) if watcher.is_some() => {
            // Stay up on a broken tree: the operator fixes the source
            // and the next batch cold-starts.
            logger::status_error("start failed", &e.to_string());
        }
        Err(e) => return Err(anyhow!("start failed: {e}")),
    }

    if let Some(target) = &args.call {
        return call_once(&runtime, target);
    }

    match watcher {
        Some(watcher) => watcher.run(&runtime),
        None => wait_for_shutdown(),
    }
    Ok(())
}

fn run_prod(config: AppConfig, args: &RunArgs) -> Result<()> {
    let runtime = ApplicationRuntime::prod(config);
    match runtime.start() {
        Ok(report) => crate::log!("run"; "{}", report),
        Err(e) => return Err(anyhow!("start failed: {e}")),
    }

    if let Some(target) = &args.call {
        return call_once(&runtime, target);
    }

    wait_for_shutdown();
    Ok(())
}

/// Invoke `CLASS.METHOD` through an admitted unit of work and print
/// the result.
fn call_once(runtime: &ApplicationRuntime, target: &str) -> Result<()> {
    let (class, method) = split_target(target)?;

    let work = runtime.begin_work().map_err(|e| anyhow!("{e}"))?;
    let value = work
        .invoke(&ClassName::new(class), method)
        .map_err(|e| anyhow!("{target}: {e}"))?;
    println!("{value}");
    Ok(())
}

/// Split `demo.Post.render` into (`demo.Post`, `render`): the method
/// is the last dot-separated segment.
fn split_target(target: &str) -> Result<(&str, &str)> {
    match target.rsplit_once('.') {
        Some((class, method)) if !class.is_empty() && !method.is_empty() => Ok((class, method)),
        _ => bail!("expected CLASS.METHOD, got `{target}`"),
    }
}

/// Park the main thread until Ctrl+C wakes it through the registered
/// shutdown channel.
fn wait_for_shutdown() {
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    crate::core::register_watch_loop(shutdown_tx);
    let _ = shutdown_rx.recv();
}
