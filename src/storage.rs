//! Local Storage
//!
//! A small JSON-file key-value store for client state that must survive
//! restarts (auth session, theme).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, AppResult};

pub struct LocalStorage {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, Value>>,
}

impl LocalStorage {
    /// Open (or start) the store backed by `path`
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| AppError::Storage(format!("Corrupt storage file {}: {}", path.display(), e)))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable stored value");
                None
            }
        }
    }

    pub fn set_item<T: Serialize>(&self, key: &str, item: &T) -> AppResult<()> {
        let value = serde_json::to_value(item).map_err(|e| AppError::Storage(e.to_string()))?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        self.flush()
    }

    pub fn remove_item(&self, key: &str) -> AppResult<()> {
        let removed = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = {
            let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*values).map_err(|e| AppError::Storage(e.to_string()))?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AppError::Storage(e.to_string()))?;
            }
        }
        std::fs::write(path, json)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }
}
