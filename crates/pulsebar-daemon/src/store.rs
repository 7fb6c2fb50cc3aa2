//! Preference store persisted as a flat TOML table.

use anyhow::{Context, Result};
use pulsebar_engine::ConfigStore;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Key/value store written back to disk on every change.
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file starts an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse preference store {}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No preference store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read preference store {}", path.display()))
            }
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        let content = toml::to_string_pretty(values).map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set(&self, key: &str, value: &str) -> pulsebar_engine::Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)?;
        debug!("Stored {} = {}", key, value);
        Ok(())
    }
}
