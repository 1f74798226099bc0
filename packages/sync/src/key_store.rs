//! # Client Identity
//!
//! The authority tells a client's own echoed edits apart from remote ones by
//! a stable client key. The key is generated once and persisted.

use crate::errors::KeyStoreError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Fixed storage key of the persisted client identity
pub const CLIENT_KEY_NAME: &str = "scribing.client_key";

pub trait ClientKeyStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, KeyStoreError>;
    fn save(&self, key: &str) -> Result<(), KeyStoreError>;
}

/// Load the persisted key, generating and saving one on first use
pub fn client_key(store: &dyn ClientKeyStore) -> Result<String, KeyStoreError> {
    if let Some(key) = store.load()? {
        return Ok(key);
    }
    let key = Uuid::new_v4().to_string();
    store.save(&key)?;
    info!(key = %key, "Generated client key");
    Ok(key)
}

/// JSON file of string entries; other entries in the file are preserved
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_entries(&self) -> Result<Map<String, Value>, KeyStoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let source = std::fs::read_to_string(&self.path)?;
        if source.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&source)?)
    }
}

impl ClientKeyStore for FileKeyStore {
    fn load(&self) -> Result<Option<String>, KeyStoreError> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(CLIENT_KEY_NAME)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn save(&self, key: &str) -> Result<(), KeyStoreError> {
        let mut entries = self.read_entries()?;
        entries.insert(CLIENT_KEY_NAME.to_string(), Value::from(key));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<String>>,
}

impl ClientKeyStore for MemoryKeyStore {
    fn load(&self) -> Result<Option<String>, KeyStoreError> {
        Ok(self
            .key
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, key: &str) -> Result<(), KeyStoreError> {
        *self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(key.to_string());
        Ok(())
    }
}
