//! Filesystem layout for packstash.
//!
//! Resolution order:
//! 1. `PACKSTASH_HOME` environment variable
//! 2. Default (`~/.packstash`)
//!
//! Everything lives under the home directory: the library document, the
//! settings document, and one asset directory per pack keyed by its
//! canonical identifier.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::PackId;

/// Resolved filesystem layout. Constructed once at startup and passed
/// explicitly so tests can point it at a temp directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory for all state
    pub home: PathBuf,
}

impl Paths {
    /// Resolve from the environment, falling back to `~/.packstash`
    pub fn resolve() -> Result<Self> {
        let home = match std::env::var("PACKSTASH_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::home_dir()
                .context("Failed to determine home directory")?
                .join(".packstash"),
        };
        Ok(Self { home })
    }

    /// Use an explicit root (tests)
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Path to the library document (array of pack records)
    pub fn library_file(&self) -> PathBuf {
        self.home.join("library.json")
    }

    /// Path to the settings document
    pub fn settings_file(&self) -> PathBuf {
        self.home.join("settings.json")
    }

    /// Root directory holding per-pack asset directories
    pub fn packs_dir(&self) -> PathBuf {
        self.home.join("packs")
    }

    /// Asset directory for one pack
    pub fn pack_dir(&self, id: &PackId) -> PathBuf {
        self.packs_dir().join(id.as_str())
    }

    /// Create the directory tree if missing
    pub fn init_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.packs_dir())
            .with_context(|| format!("Failed to create {}", self.packs_dir().display()))?;
        Ok(())
    }
}

/// Locate a stored item file by index, trying the extensions the classifier
/// can produce. Returns the first that exists.
pub fn find_item_file(pack_dir: &Path, index: usize) -> Option<PathBuf> {
    for ext in ["webp", "gif", "tgs", "webm", "png", "jpg"] {
        let candidate = pack_dir.join(format!("item_{}.{}", index, ext));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
