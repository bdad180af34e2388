//! Downstream cache invalidation fan-out.
//!
//! Anything that derives state from class definitions (render caches,
//! route tables, bean graphs in the surrounding framework) registers
//! here and is told to drop that state exactly once per applied reload
//! and once per cold start.

use std::sync::Arc;

use parking_lot::RwLock;

/// A cache owned by someone else that goes stale when classes change.
pub trait DownstreamCache: Send + Sync {
    /// Stable name used in log output.
    fn name(&self) -> &str;

    /// Drop every class-derived entry. Must be idempotent.
    fn invalidate(&self);
}

/// Registry of downstream caches.
#[derive(Default)]
pub struct InvalidationFanout {
    sinks: RwLock<Vec<Arc<dyn DownstreamCache>>>,
}

impl InvalidationFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn DownstreamCache>) {
        self.sinks.write().push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Invalidate every registered cache, in registration order.
    pub fn fan_out(&self) {
        for sink in self.sinks.read().iter() {
            crate::debug!("reload"; "invalidating downstream cache `{}`", sink.name());
            sink.invalidate();
        }
    }
}
