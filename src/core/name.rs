//! Fully-qualified class names.
//!
//! Names use `.` as the package separator and `$` as the nested-class
//! separator (`demo.A$Helper` is declared inside `demo/A.unit`). Source
//! lookups always go through the enclosing top-level unit.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File extension for application class sources.
pub const SOURCE_EXT: &str = "unit";

/// A fully-qualified class name (e.g. `demo.blog.Post`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Simple name: the last `.`-separated segment (nested suffix included).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Package prefix, or `None` for an unqualified name.
    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Whether this names a nested class (`demo.A$Helper`).
    #[inline]
    pub fn is_nested(&self) -> bool {
        self.0.contains('$')
    }

    /// The enclosing top-level unit: `demo.A$Helper` -> `demo.A`.
    ///
    /// Top-level names return themselves unchanged.
    pub fn top_level(&self) -> ClassName {
        match self.0.split_once('$') {
            Some((outer, _)) => ClassName::new(outer),
            None => self.clone(),
        }
    }

    /// Whether `self` is `other` itself or a class nested inside it.
    pub fn is_member_of(&self, other: &ClassName) -> bool {
        self == other
            || (self.0.starts_with(other.as_str())
                && self.0.as_bytes().get(other.0.len()) == Some(&b'$'))
    }

    /// Relative source path of the enclosing unit: `demo.A$X` -> `demo/A.unit`.
    pub fn to_rel_source_path(&self) -> PathBuf {
        let top = self.top_level();
        let mut path: PathBuf = top.0.split('.').collect();
        path.set_extension(SOURCE_EXT);
        path
    }

    /// Reverse of [`to_rel_source_path`]: `demo/A.unit` -> `demo.A`.
    ///
    /// Returns `None` for paths with a wrong extension or non-UTF-8 segments.
    pub fn from_rel_source_path(path: &std::path::Path) -> Option<ClassName> {
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXT) {
            return None;
        }
        let stem = path.with_extension("");
        let mut segments = Vec::new();
        for component in stem.components() {
            match component {
                std::path::Component::Normal(s) => segments.push(s.to_str()?),
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(ClassName::new(segments.join(".")))
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClassName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
