/*!
 * Language registry shared by the in-memory and filesystem backends.
 */

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::capability::Mapping;
use crate::errors::{Result, StorageError};
use crate::file_utils::FileManager;
use crate::model::LanguageInfo;

/// Registry keyed by `code` or `code_COUNTRY`, optionally mirrored to a JSON file
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    entries: Arc<RwLock<BTreeMap<String, LanguageInfo>>>,
    path: Option<PathBuf>,
}

impl LanguageRegistry {
    /// Registry that lives only in process memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry persisted to `path`; existing content is loaded eagerly
    pub fn persisted(path: PathBuf) -> Result<Self> {
        let entries = if FileManager::file_exists(&path) {
            let list: Vec<LanguageInfo> =
                serde_json::from_str(&FileManager::read_to_string(&path)?)?;
            list.into_iter().map(|info| (info.key(), info)).collect()
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} languages from {:?}", entries.len(), path);
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            path: Some(path),
        })
    }

    /// Look up a language, registering it on first use
    pub fn ensure(&self, key: &str) -> Result<LanguageInfo> {
        let info = LanguageInfo::from_key(key)?;
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&info.key()) {
            return Ok(existing.clone());
        }
        info!("Registering language {} ({})", info.key(), info.name);
        entries.insert(info.key(), info.clone());
        self.persist(&entries)?;
        Ok(info)
    }

    /// Insert or replace a fully specified language
    pub fn register(&self, info: LanguageInfo) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(info.key(), info);
        self.persist(&entries)
    }

    fn persist(&self, entries: &BTreeMap<String, LanguageInfo>) -> Result<()> {
        if let Some(path) = &self.path {
            let list: Vec<&LanguageInfo> = entries.values().collect();
            FileManager::write_atomic(path, &serde_json::to_string_pretty(&list)?)?;
        }
        Ok(())
    }
}

impl Mapping<LanguageInfo> for LanguageRegistry {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<LanguageInfo> {
        let normalized = LanguageInfo::from_key(key)?.key();
        self.entries
            .read()
            .get(&normalized)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("language '{}'", key)))
    }

    fn add(&self, key: &str) -> Result<LanguageInfo> {
        let info = LanguageInfo::from_key(key)?;
        if self.entries.read().contains_key(&info.key()) {
            return Err(StorageError::KeyExists(info.key()));
        }
        self.ensure(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let normalized = LanguageInfo::from_key(key)?.key();
        let mut entries = self.entries.write();
        if entries.remove(&normalized).is_none() {
            return Err(StorageError::not_found(format!("language '{}'", key)));
        }
        self.persist(&entries)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}
