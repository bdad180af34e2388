//! Mtime helpers for the freshness fast path.
//!
//! An unchanged mtime lets a sweep skip hashing a file. The reverse is
//! never trusted: a changed mtime only triggers a hash comparison, so
//! touch-without-edit does not force a recompile.

use std::path::Path;
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}
