//! Project configuration for `kiln.toml`.
//!
//! # Sections
//!
//! | Section         | Purpose                                    |
//! |-----------------|--------------------------------------------|
//! | `[application]` | Application identity and source layout     |
//! | `[reload]`      | File watching and reload cycle behaviour   |
//! | `[precompile]`  | Ahead-of-time artifact output              |
//!
//! # Example
//!
//! ```toml
//! [application]
//! name = "demo"
//! source_dirs = ["app"]
//! modules = ["modules/crud"]
//!
//! [reload]
//! watch = true
//! debounce_ms = 300
//! disk_cache = true
//!
//! [precompile]
//! dir = "precompiled"
//! ```
//!
//! The project root is the directory holding `kiln.toml` (overridable with
//! `application.root`). Every configured path is `~`-expanded and anchored
//! there during [`AppConfig::load`]; module roots contribute the same
//! relative source layout as the root itself.

use crate::log;
use crate::utils::path::normalize_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, overridable with `-C/--config`.
pub const CONFIG_FILE: &str = "kiln.toml";

// ============================================================================
// errors
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no `{0}` found here or in any parent directory")]
    NotFound(PathBuf),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// sections
// ============================================================================

/// `[application]` section: identity and source layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name, shown in status output.
    pub name: String,

    /// Project root override. Defaults to the config file's directory.
    pub root: Option<PathBuf>,

    /// Directories scanned for sources, relative to the project root.
    pub source_dirs: Vec<PathBuf>,

    /// Extra module roots. Each module repeats the `source_dirs` layout
    /// under its own directory.
    pub modules: Vec<PathBuf>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            root: None,
            source_dirs: vec![PathBuf::from("app")],
            modules: Vec::new(),
        }
    }
}

/// `[reload]` section: watcher and reload cycle behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch source directories and reload on change.
    pub watch: bool,

    /// Quiet window after the last filesystem event, in milliseconds.
    pub debounce_ms: u64,

    /// Minimum gap between two reload cycles, in milliseconds.
    pub cooldown_ms: u64,

    /// Persist enhanced bytecode under `.kiln/cache` across restarts.
    pub disk_cache: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            watch: true,
            debounce_ms: 300,
            cooldown_ms: 800,
            disk_cache: true,
        }
    }
}

impl ReloadConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// `[precompile]` section: ahead-of-time artifact output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecompileConfig {
    /// Output directory for precompiled class images.
    pub dir: PathBuf,
}

impl Default for PrecompileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("precompiled"),
        }
    }
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    root: PathBuf,

    /// Absolute source roots, derived from `source_dirs` and `modules`
    /// (internal use only)
    #[serde(skip)]
    source_roots: Vec<PathBuf>,

    /// Application identity and source layout
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Reload behaviour
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Precompile settings
    #[serde(default)]
    pub precompile: PrecompileConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            source_roots: Vec::new(),
            application: ApplicationConfig::default(),
            reload: ReloadConfig::default(),
            precompile: PrecompileConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration by searching upward from the current directory.
    ///
    /// `config_arg` is the `-C/--config` value; an absolute path is used
    /// as-is, a relative one is searched for in cwd and every parent.
    pub fn load(config_arg: &Path) -> Result<Self, ConfigError> {
        match find_config_file(config_arg) {
            Some(path) => Self::load_from(&path),
            None => Err(ConfigError::NotFound(config_arg.to_path_buf())),
        }
    }

    /// Load configuration from a concrete file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let path = normalize_path(path);
        let mut config = Self::from_path(&path)?;
        config.config_path = path;
        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration anchored at `root`, without reading a file.
    ///
    /// Used when running against a bare source tree that has no kiln.toml
    /// yet, and by tests.
    pub fn for_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.config_path = normalize_path(root).join(CONFIG_FILE);
        config.finalize();
        config
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "ignoring unknown fields in {}:", name);
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Resolve the project root and anchor every configured path there.
    fn finalize(&mut self) {
        let base = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.root = match &self.application.root {
            Some(root) => anchor_path(root, &base),
            None => base,
        };

        let mut roots = Vec::new();
        for dir in &self.application.source_dirs {
            roots.push(anchor_path(dir, &self.root));
        }
        for module in &self.application.modules {
            let module_root = anchor_path(module, &self.root);
            for dir in &self.application.source_dirs {
                if dir.is_relative() {
                    roots.push(normalize_path(&module_root.join(dir)));
                }
            }
        }
        roots.dedup();
        self.source_roots = roots;

        self.precompile.dir = anchor_path(&self.precompile.dir, &self.root);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.application.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "application.name must not be empty".to_string(),
            ));
        }
        if self.application.source_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "application.source_dirs must name at least one directory".to_string(),
            ));
        }
        if !self.source_roots.iter().any(|root| root.is_dir()) {
            return Err(ConfigError::Validation(format!(
                "no source directory exists under `{}`",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Get the root directory path
    pub fn project_root(&self) -> &Path {
        &self.root
    }

    /// Absolute source roots, in configuration order.
    pub fn source_roots(&self) -> &[PathBuf] {
        &self.source_roots
    }

    /// Absolute precompiled-artifact directory.
    pub fn precompile_dir(&self) -> &Path {
        &self.precompile.dir
    }
}

// ============================================================================
// path helpers
// ============================================================================

/// Expand `~` and anchor a configured path at `root`.
fn anchor_path(path: &Path, root: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path.to_str().unwrap_or_default()).into_owned();
    let path = PathBuf::from(expanded);
    let full = if path.is_relative() {
        root.join(&path)
    } else {
        path
    };
    normalize_path(&full)
}

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;

    // First check if config_name is an absolute path or exists in cwd
    if config_name.is_absolute() && config_name.exists() {
        return Some(config_name.to_path_buf());
    }

    // Walk up from cwd looking for config file
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        // Move to parent directory
        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// tests
// ============================================================================
