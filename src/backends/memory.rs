/*!
 * In-memory backend.
 *
 * The tree is a set of shared nodes behind `Arc<RwLock<..>>`; handles
 * handed out through the capability traits are views onto those nodes,
 * so a change made through one handle is visible through every other.
 * Nothing is persisted and `save` is a no-op.
 */

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::languages::LanguageRegistry;
use super::validate_key;
use crate::app_config::Config;
use crate::capability::{
    self, Annotations, BackendKind, BackendManifest, Database, Folder, FolderRef, HaveStatistics,
    Mapping, Module, ModuleInfo, ModuleRef, Searchable, StoreRef, TranslationStore,
};
use crate::errors::{Result, StorageError};
use crate::model::{Header, LanguageInfo, Statistics, TranslationUnit};
use crate::search::{self, SearchOptions};

/// Capabilities provided by this backend
pub fn manifest() -> BackendManifest {
    BackendManifest::complete("memory", BackendKind::InMemory)
}

/// Registry constructor for `mem://` connection strings
pub fn connect(_uri: &str, _config: &Config) -> Result<Box<dyn Database>> {
    Ok(Box::new(MemoryDatabase::new()))
}

type Shared<T> = Arc<RwLock<T>>;

#[derive(Default)]
struct FolderNode {
    annotations: Annotations,
    subfolders: BTreeMap<String, Shared<FolderNode>>,
    modules: BTreeMap<String, Shared<ModuleNode>>,
}

struct ModuleNode {
    info: ModuleInfo,
    annotations: Annotations,
    template: Option<Shared<StoreNode>>,
    stores: BTreeMap<String, Shared<StoreNode>>,
}

#[derive(Default)]
struct StoreNode {
    header: Header,
    units: Vec<TranslationUnit>,
}

pub struct MemoryDatabase {
    root: Shared<FolderNode>,
    languages: LanguageRegistry,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        info!("Opened in-memory database");
        Self {
            root: Arc::new(RwLock::new(FolderNode::default())),
            languages: LanguageRegistry::in_memory(),
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDatabase {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    fn root(&self) -> FolderRef {
        Box::new(MemFolder::new(
            self.root.clone(),
            Vec::new(),
            self.languages.clone(),
        ))
    }

    fn languages(&self) -> &dyn Mapping<LanguageInfo> {
        &self.languages
    }

    fn start_transaction(&self) -> Result<()> {
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<()> {
        Err(StorageError::Unsupported(
            "rollback on the in-memory backend".to_string(),
        ))
    }
}

/// Folder handle
pub struct MemFolder {
    node: Shared<FolderNode>,
    path: Vec<String>,
    subfolders: SubfolderMap,
    modules: ModuleMap,
}

impl MemFolder {
    fn new(node: Shared<FolderNode>, path: Vec<String>, languages: LanguageRegistry) -> Self {
        Self {
            subfolders: SubfolderMap {
                node: node.clone(),
                path: path.clone(),
                languages: languages.clone(),
            },
            modules: ModuleMap {
                node: node.clone(),
                path: path.clone(),
                languages,
            },
            node,
            path,
        }
    }
}

impl Folder for MemFolder {
    fn key(&self) -> Option<String> {
        self.path.last().cloned()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn subfolders(&self) -> &dyn Mapping<FolderRef> {
        &self.subfolders
    }

    fn modules(&self) -> &dyn Mapping<ModuleRef> {
        &self.modules
    }

    fn annotations(&self) -> Result<Annotations> {
        Ok(self.node.read().annotations.clone())
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.node.write().annotations.insert(key.to_string(), value);
        Ok(())
    }
}

impl HaveStatistics for MemFolder {
    fn statistics(&self) -> Result<Statistics> {
        capability::folder_statistics(self)
    }
}

impl Searchable for MemFolder {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_folder(self, needle, options)
    }
}

fn child_path(path: &[String], key: &str) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(key.to_string());
    child
}

struct SubfolderMap {
    node: Shared<FolderNode>,
    path: Vec<String>,
    languages: LanguageRegistry,
}

impl Mapping<FolderRef> for SubfolderMap {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.node.read().subfolders.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<FolderRef> {
        let child = self.node.read().subfolders.get(key).cloned();
        match child {
            Some(node) => Ok(Box::new(MemFolder::new(
                node,
                child_path(&self.path, key),
                self.languages.clone(),
            ))),
            None => Err(StorageError::not_found(format!("folder '{}'", key))),
        }
    }

    fn add(&self, key: &str) -> Result<FolderRef> {
        validate_key(key)?;
        let node = {
            let mut parent = self.node.write();
            if parent.subfolders.contains_key(key) || parent.modules.contains_key(key) {
                return Err(StorageError::KeyExists(key.to_string()));
            }
            let node = Arc::new(RwLock::new(FolderNode::default()));
            parent.subfolders.insert(key.to_string(), node.clone());
            node
        };
        debug!("Created folder {}", child_path(&self.path, key).join("/"));
        Ok(Box::new(MemFolder::new(
            node,
            child_path(&self.path, key),
            self.languages.clone(),
        )))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.node.write().subfolders.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("folder '{}'", key))),
        }
    }
}

struct ModuleMap {
    node: Shared<FolderNode>,
    path: Vec<String>,
    languages: LanguageRegistry,
}

impl Mapping<ModuleRef> for ModuleMap {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.node.read().modules.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<ModuleRef> {
        let child = self.node.read().modules.get(key).cloned();
        match child {
            Some(node) => Ok(Box::new(MemModule {
                node,
                path: child_path(&self.path, key),
                languages: self.languages.clone(),
            })),
            None => Err(StorageError::not_found(format!("module '{}'", key))),
        }
    }

    fn add(&self, key: &str) -> Result<ModuleRef> {
        validate_key(key)?;
        let node = {
            let mut parent = self.node.write();
            if parent.modules.contains_key(key) || parent.subfolders.contains_key(key) {
                return Err(StorageError::KeyExists(key.to_string()));
            }
            let node = Arc::new(RwLock::new(ModuleNode {
                info: ModuleInfo::named(key),
                annotations: Annotations::new(),
                template: None,
                stores: BTreeMap::new(),
            }));
            parent.modules.insert(key.to_string(), node.clone());
            node
        };
        debug!("Created module {}", child_path(&self.path, key).join("/"));
        Ok(Box::new(MemModule {
            node,
            path: child_path(&self.path, key),
            languages: self.languages.clone(),
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.node.write().modules.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("module '{}'", key))),
        }
    }
}

/// Module handle; maps language keys to stores
pub struct MemModule {
    node: Shared<ModuleNode>,
    path: Vec<String>,
    languages: LanguageRegistry,
}

impl Mapping<StoreRef> for MemModule {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.node.read().stores.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<StoreRef> {
        let lang_key = LanguageInfo::from_key(key)?.key();
        let store = self.node.read().stores.get(&lang_key).cloned();
        match store {
            Some(node) => Ok(Box::new(MemStore {
                node,
                language: Some(self.languages.ensure(&lang_key)?),
            })),
            None => Err(StorageError::not_found(format!(
                "store '{}' in module '{}'",
                key,
                self.key()
            ))),
        }
    }

    fn add(&self, key: &str) -> Result<StoreRef> {
        let language = self.languages.ensure(key)?;
        let lang_key = language.key();
        let node = {
            let mut module = self.node.write();
            if module.stores.contains_key(&lang_key) {
                return Err(StorageError::KeyExists(lang_key));
            }
            let node = Arc::new(RwLock::new(StoreNode::default()));
            module.stores.insert(lang_key.clone(), node.clone());
            node
        };
        debug!("Created store {}/{}", self.path.join("/"), lang_key);
        Ok(Box::new(MemStore {
            node,
            language: Some(language),
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let lang_key = LanguageInfo::from_key(key)?.key();
        match self.node.write().stores.remove(&lang_key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("store '{}'", key))),
        }
    }
}

impl Module for MemModule {
    fn key(&self) -> String {
        self.path.last().cloned().unwrap_or_default()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn info(&self) -> Result<ModuleInfo> {
        Ok(self.node.read().info.clone())
    }

    fn set_info(&self, info: ModuleInfo) -> Result<()> {
        self.node.write().info = info;
        Ok(())
    }

    fn template(&self) -> Result<Option<StoreRef>> {
        Ok(self.node.read().template.clone().map(|node| {
            Box::new(MemStore {
                node,
                language: None,
            }) as StoreRef
        }))
    }

    fn add_template(&self) -> Result<StoreRef> {
        let node = {
            let mut module = self.node.write();
            if module.template.is_some() {
                return Err(StorageError::KeyExists(format!(
                    "template of module '{}'",
                    module.info.name
                )));
            }
            let node = Arc::new(RwLock::new(StoreNode::default()));
            module.template = Some(node.clone());
            node
        };
        Ok(Box::new(MemStore {
            node,
            language: None,
        }))
    }

    fn annotations(&self) -> Result<Annotations> {
        Ok(self.node.read().annotations.clone())
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.node.write().annotations.insert(key.to_string(), value);
        Ok(())
    }
}

impl HaveStatistics for MemModule {
    fn statistics(&self) -> Result<Statistics> {
        capability::module_statistics(self)
    }
}

impl Searchable for MemModule {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_module(self, needle, options)
    }
}

/// Store handle
pub struct MemStore {
    node: Shared<StoreNode>,
    language: Option<LanguageInfo>,
}

impl TranslationStore for MemStore {
    fn key(&self) -> Option<String> {
        self.language.as_ref().map(LanguageInfo::key)
    }

    fn language(&self) -> Option<LanguageInfo> {
        self.language.clone()
    }

    fn header(&self) -> Result<Header> {
        Ok(self.node.read().header.clone())
    }

    fn set_header(&self, header: Header) -> Result<()> {
        self.node.write().header = header;
        Ok(())
    }

    fn units(&self) -> Result<Vec<TranslationUnit>> {
        Ok(self.node.read().units.clone())
    }

    fn fill(&self, units: Vec<TranslationUnit>) -> Result<()> {
        self.node.write().units = units;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.node.read().units.len())
    }

    fn unit(&self, index: usize) -> Result<TranslationUnit> {
        let node = self.node.read();
        node.units.get(index).cloned().ok_or(StorageError::Range {
            id: index as i64 + 1,
            len: node.units.len(),
        })
    }
}

impl HaveStatistics for MemStore {
    fn statistics(&self) -> Result<Statistics> {
        Ok(Statistics::of_units(&self.node.read().units))
    }
}

impl Searchable for MemStore {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        Ok(search::find_in_units(
            &self.node.read().units,
            needle,
            options,
        ))
    }
}
