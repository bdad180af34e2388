//! Built-in platform class names.
//!
//! These classes are provided by the engine itself, never compiled
//! from application sources, and survive every reload.

use super::ClassName;

pub const OBJECT: &str = "kiln.Object";
pub const MODEL: &str = "kiln.Model";
pub const CONTROLLER: &str = "kiln.Controller";
pub const JOB: &str = "kiln.Job";
pub const PLUGIN: &str = "kiln.Plugin";

pub const ALL: &[&str] = &[OBJECT, MODEL, CONTROLLER, JOB, PLUGIN];

/// Exact-name membership test. Application classes may not shadow
/// platform names, and prefix matching would let them.
pub fn is_platform_class(name: &ClassName) -> bool {
    ALL.contains(&name.as_str())
}
