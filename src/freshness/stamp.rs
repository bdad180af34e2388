//! Per-source freshness stamps.

use std::path::Path;
use std::time::SystemTime;

use super::hash::{ContentHash, compute_file_hash};
use super::mtime::get_mtime;

/// Snapshot of a source file's identity at compile time.
///
/// Captured before the compiler reads the source text: if a write lands
/// between the capture and the read, the fresh file no longer matches
/// the stamp and the next sweep marks the unit stale again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStamp {
    pub hash: ContentHash,
    pub mtime: Option<SystemTime>,
}

impl SourceStamp {
    /// Capture the current stamp of `path`.
    ///
    /// A missing or unreadable file yields the empty hash, which
    /// compares stale against everything.
    pub fn capture(path: &Path) -> Self {
        Self {
            mtime: get_mtime(path),
            hash: compute_file_hash(path),
        }
    }

    /// Whether the file on disk still matches this stamp.
    ///
    /// Unchanged mtime short-circuits as current. Otherwise the content
    /// hash decides, so touch-without-edit stays fresh and mtime
    /// granularity misses are caught by the hash.
    pub fn is_current(&self, path: &Path) -> bool {
        if self.hash.is_empty() {
            return false;
        }
        if let (Some(recorded), Some(on_disk)) = (self.mtime, get_mtime(path))
            && recorded == on_disk
        {
            return true;
        }
        compute_file_hash(path) == self.hash
    }
}
