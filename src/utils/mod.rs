//! Utility modules for the reload engine.

pub mod hash;
pub mod path;
