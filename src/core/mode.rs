//! Run mode configuration for development/production runtimes.

/// Run mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    /// Whether sources are watched and recompiled on change.
    /// When `false`, classes come from the precompiled store only.
    pub live_compile: bool,

    /// Whether failures surface as recoverable diagnostics.
    /// When `false`, any startup failure aborts the process.
    pub recoverable_failures: bool,
}

impl RunMode {
    /// Production mode: precompiled classes, failures are fatal.
    pub const PRODUCTION: Self = Self {
        live_compile: false,
        recoverable_failures: false,
    };

    /// Development mode: live recompilation, failures held as diagnostics.
    pub const DEVELOPMENT: Self = Self {
        live_compile: true,
        recoverable_failures: true,
    };

    /// Check if this is development mode.
    #[inline]
    pub const fn is_dev(&self) -> bool {
        self.live_compile
    }
}
