//! Process-wide shutdown signalling.
//!
//! All other runtime state (started flag, generation, pending failure)
//! lives on [`crate::runtime::ApplicationRuntime`] and is passed
//! explicitly. Only the Ctrl+C flag is global, because the signal
//! handler has no context to thread it through.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for the watch loop
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// Before `register_watch_loop()` the process exits immediately; after,
/// the watch loop is woken so it can drain and stop cleanly.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            crate::log!("watch"; "shutting down...");
            let _ = tx.send(());
        } else {
            // No watch loop yet, nothing to gracefully stop
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the watch loop for graceful shutdown
///
/// Call this before entering the event loop
pub fn register_watch_loop(shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Check if shutdown has been requested
///
/// Uses Relaxed ordering for performance - worst case is processing
/// one more event batch before stopping, which is acceptable
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
