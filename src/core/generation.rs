//! Reload generation counter.
//!
//! Every successful class swap (and every cold restart) advances the
//! runtime to a new generation. Resolvers are generation-scoped: a unit
//! of work pins the resolver it started with, so it never observes
//! classes from two generations at once.

use std::fmt;

/// Monotonic generation number. Generation 0 is "before first start".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Self = Self(0);

    #[inline]
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The generation after this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}
