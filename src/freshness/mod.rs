//! Freshness detection: content-hash (blake3) with an mtime fast path.
//!
//! Every compiled unit records a [`SourceStamp`] taken from its source
//! file at compile time. Change detection compares the recorded stamp
//! against the file on disk: equal mtime short-circuits as fresh,
//! otherwise the blake3 hash decides. Content hashes are authoritative;
//! mtime alone never marks a unit stale.

mod hash;
pub mod mtime;
mod stamp;

pub use hash::{ContentHash, compute_file_hash};
pub use mtime::get_mtime;
pub use stamp::SourceStamp;
