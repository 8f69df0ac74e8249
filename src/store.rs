//! Concurrency-safe JSON persistence for the library and settings documents.
//!
//! Saves write to a sibling temp path and atomically rename into place; the
//! whole save is serialized by a single process-wide mutex so concurrent
//! writers (library controller, download queue) never interleave partial
//! writes. Loads never fail: missing, unreadable or malformed documents come
//! back as defaults with a logged warning.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::Paths;
use crate::domain::{Library, Settings};

/// Process-wide write lock shared by every `Store` instance
static WRITE_LOCK: Mutex<()> = Mutex::const_new(());

/// Errors that can occur when persisting a document
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Atomic document store for the two on-disk documents
#[derive(Debug, Clone)]
pub struct Store {
    library_path: PathBuf,
    settings_path: PathBuf,
}

impl Store {
    pub fn new(paths: &Paths) -> Self {
        Self {
            library_path: paths.library_file(),
            settings_path: paths.settings_file(),
        }
    }

    /// Persist the library document
    pub async fn save_library(&self, library: &Library) -> Result<(), StoreError> {
        save_json(&self.library_path, library).await
    }

    /// Load the library document, defaulting to empty on any failure
    pub async fn load_library(&self) -> Library {
        load_json(&self.library_path).await
    }

    /// Persist the settings document
    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        save_json(&self.settings_path, settings).await
    }

    /// Load settings, back-filling defaults for missing keys
    pub async fn load_settings(&self) -> Settings {
        load_json(&self.settings_path).await
    }
}

/// Serialize and atomically replace the target path. Temp write and rename
/// happen under the process-wide write lock.
async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;

    let _guard = WRITE_LOCK.lock().await;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;

    Ok(())
}

/// Load a document, returning the default value on missing file, unreadable
/// file, or parse failure.
async fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }

    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            T::default()
        }
    }
}
