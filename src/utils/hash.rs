//! Unified hashing utilities using FxHash.
//!
//! Uses `rustc_hash::FxHasher` for:
//! - Fast, deterministic hashing (optimized for small data)
//! - No extra dependencies (rustc_hash already used for FxHashSet/FxHashMap)
//!
//! Content stamping of source files uses BLAKE3 instead, see
//! [`crate::freshness`]. This module is for cheap in-memory keys like
//! enhancer fingerprints and cache-file names.

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute hash and return as 8-char hex fingerprint.
///
/// Useful for cache file names (e.g. `demo.Post.a1b2c3d4.bin`).
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(value: &T) -> String {
    format!("{:016x}", compute(value))[..8].to_string()
}
