/*!
 * Filesystem backend.
 *
 * Mirrors the in-memory tree shape on disk:
 *
 * ```text
 * <root>/languages.json
 * <root>/annotations.db
 * <root>/folders/<key>/...              same layout, recursively
 * <root>/modules/<key>/module.json      name, description, checker
 * <root>/modules/<key>/annotations.db
 * <root>/modules/<key>/template/        store directory
 * <root>/modules/<key>/stores/<lang>/   store directory
 * ```
 *
 * Handles carry only paths; everything is read from disk when asked for.
 * Store directories are described in [`store_dir`].
 */

pub mod index;
pub mod lock;
pub mod store_dir;

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use self::store_dir::StoreDir;
use super::languages::LanguageRegistry;
use super::validate_key;
use crate::annotations::AnnotationFile;
use crate::app_config::Config;
use crate::capability::{
    self, Annotations, BackendKind, BackendManifest, Database, Folder, FolderRef, HaveStatistics,
    Mapping, Module, ModuleInfo, ModuleRef, Searchable, StoreRef, TEMPLATE_SEGMENT,
    TranslationStore,
};
use crate::codec::{PoCodec, UnitCodec};
use crate::errors::{Result, StorageError};
use crate::file_utils::FileManager;
use crate::model::{Header, LanguageInfo, Statistics, TranslationUnit};
use crate::search::{self, SearchOptions};

const FOLDERS_DIR: &str = "folders";
const MODULES_DIR: &str = "modules";
const STORES_DIR: &str = "stores";
const TEMPLATE_DIR: &str = "template";
const MODULE_INFO_FILE: &str = "module.json";
const LANGUAGES_FILE: &str = "languages.json";

/// Capabilities provided by this backend
pub fn manifest() -> BackendManifest {
    BackendManifest::complete("filesystem", BackendKind::FileSystem)
}

/// Registry constructor for `fs://<path>` connection strings
pub fn connect(uri: &str, config: &Config) -> Result<Box<dyn Database>> {
    let (_, path) = super::split_uri(uri)?;
    if path.is_empty() {
        return Err(StorageError::Config(format!(
            "Filesystem URI '{}' names no directory",
            uri
        )));
    }
    Ok(Box::new(FsDatabase::open(path, config)?))
}

/// Shared by every handle of one database
#[derive(Clone)]
struct FsContext {
    languages: LanguageRegistry,
    codec: Arc<dyn UnitCodec>,
    lease_secs: u64,
}

impl FsContext {
    fn store_dir(&self, dir: PathBuf) -> StoreDir {
        StoreDir::new(dir, self.codec.clone(), self.lease_secs)
    }
}

pub struct FsDatabase {
    root: PathBuf,
    ctx: FsContext,
}

impl FsDatabase {
    /// Open the tree rooted at `root`, creating it when the config allows
    pub fn open<P: AsRef<Path>>(root: P, config: &Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !FileManager::dir_exists(&root) {
            if !config.filesystem.create_missing {
                return Err(StorageError::not_found(format!("database directory {:?}", root)));
            }
            FileManager::ensure_dir(&root)?;
        }
        let languages = LanguageRegistry::persisted(root.join(LANGUAGES_FILE))?;
        info!("Opened filesystem database at {:?}", root);
        Ok(Self {
            root,
            ctx: FsContext {
                languages,
                codec: Arc::new(PoCodec),
                lease_secs: config.filesystem.lock_lease_secs,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Store directory behind a `folder/.../module/lang` path
    ///
    /// Gives access to single-unit reads and writes, merging and raw content.
    /// The last segment may be `template`.
    pub fn store_dir(&self, path: &str) -> Result<StoreDir> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let [folders @ .., module, store] = segments.as_slice() else {
            return Err(StorageError::not_found(format!("store path '{}'", path)));
        };

        let mut dir = self.root.clone();
        for folder in folders {
            validate_key(folder)?;
            dir = dir.join(FOLDERS_DIR).join(folder);
        }
        validate_key(module)?;
        dir = dir.join(MODULES_DIR).join(module);
        dir = if *store == TEMPLATE_SEGMENT {
            dir.join(TEMPLATE_DIR)
        } else {
            dir.join(STORES_DIR).join(LanguageInfo::from_key(store)?.key())
        };

        if !FileManager::dir_exists(&dir) {
            return Err(StorageError::not_found(format!("store path '{}'", path)));
        }
        Ok(self.ctx.store_dir(dir))
    }
}

impl Database for FsDatabase {
    fn kind(&self) -> BackendKind {
        BackendKind::FileSystem
    }

    fn root(&self) -> FolderRef {
        Box::new(FsFolder::new(self.root.clone(), Vec::new(), self.ctx.clone()))
    }

    fn languages(&self) -> &dyn Mapping<LanguageInfo> {
        &self.ctx.languages
    }

    fn start_transaction(&self) -> Result<()> {
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<()> {
        Err(StorageError::Unsupported(
            "rollback on the filesystem backend".to_string(),
        ))
    }
}

fn child_path(path: &[String], key: &str) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(key.to_string());
    child
}

pub struct FsFolder {
    dir: PathBuf,
    path: Vec<String>,
    subfolders: FsSubfolders,
    modules: FsModules,
}

impl FsFolder {
    fn new(dir: PathBuf, path: Vec<String>, ctx: FsContext) -> Self {
        Self {
            subfolders: FsSubfolders {
                dir: dir.clone(),
                path: path.clone(),
                ctx: ctx.clone(),
            },
            modules: FsModules {
                dir: dir.clone(),
                path: path.clone(),
                ctx,
            },
            dir,
            path,
        }
    }
}

impl Folder for FsFolder {
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
        Ok(AnnotationFile::in_dir(&self.dir)?.all())
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        AnnotationFile::in_dir(&self.dir)?.set(key, value)
    }
}

impl HaveStatistics for FsFolder {
    fn statistics(&self) -> Result<Statistics> {
        capability::folder_statistics(self)
    }
}

impl Searchable for FsFolder {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_folder(self, needle, options)
    }
}

/// Fails with `KeyExists` if `key` names a subfolder or a module of `dir`
fn ensure_free_key(dir: &Path, key: &str) -> Result<()> {
    validate_key(key)?;
    if FileManager::dir_exists(dir.join(FOLDERS_DIR).join(key))
        || FileManager::dir_exists(dir.join(MODULES_DIR).join(key))
    {
        return Err(StorageError::KeyExists(key.to_string()));
    }
    Ok(())
}

/// Existing directory of child `key` below `dir/kind`
fn existing_child(dir: &Path, kind: &str, key: &str) -> Result<Option<PathBuf>> {
    validate_key(key)?;
    let child = dir.join(kind).join(key);
    Ok(FileManager::dir_exists(&child).then_some(child))
}

struct FsSubfolders {
    dir: PathBuf,
    path: Vec<String>,
    ctx: FsContext,
}

impl Mapping<FolderRef> for FsSubfolders {
    fn keys(&self) -> Result<Vec<String>> {
        FileManager::list_dir_names(self.dir.join(FOLDERS_DIR))
    }

    fn get(&self, key: &str) -> Result<FolderRef> {
        let Some(dir) = existing_child(&self.dir, FOLDERS_DIR, key)? else {
            return Err(StorageError::not_found(format!("folder '{}'", key)));
        };
        Ok(Box::new(FsFolder::new(
            dir,
            child_path(&self.path, key),
            self.ctx.clone(),
        )))
    }

    fn add(&self, key: &str) -> Result<FolderRef> {
        ensure_free_key(&self.dir, key)?;
        let dir = self.dir.join(FOLDERS_DIR).join(key);
        FileManager::ensure_dir(&dir)?;
        debug!("Created folder {:?}", dir);
        Ok(Box::new(FsFolder::new(
            dir,
            child_path(&self.path, key),
            self.ctx.clone(),
        )))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let Some(dir) = existing_child(&self.dir, FOLDERS_DIR, key)? else {
            return Err(StorageError::not_found(format!("folder '{}'", key)));
        };
        FileManager::remove_dir(dir)
    }
}

struct FsModules {
    dir: PathBuf,
    path: Vec<String>,
    ctx: FsContext,
}

impl Mapping<ModuleRef> for FsModules {
    fn keys(&self) -> Result<Vec<String>> {
        FileManager::list_dir_names(self.dir.join(MODULES_DIR))
    }

    fn get(&self, key: &str) -> Result<ModuleRef> {
        let Some(dir) = existing_child(&self.dir, MODULES_DIR, key)? else {
            return Err(StorageError::not_found(format!("module '{}'", key)));
        };
        Ok(Box::new(FsModule {
            dir,
            path: child_path(&self.path, key),
            ctx: self.ctx.clone(),
        }))
    }

    fn add(&self, key: &str) -> Result<ModuleRef> {
        ensure_free_key(&self.dir, key)?;
        let dir = self.dir.join(MODULES_DIR).join(key);
        FileManager::ensure_dir(dir.join(STORES_DIR))?;
        let module = FsModule {
            dir,
            path: child_path(&self.path, key),
            ctx: self.ctx.clone(),
        };
        module.set_info(ModuleInfo::named(key))?;
        debug!("Created module {:?}", module.dir);
        Ok(Box::new(module))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let Some(dir) = existing_child(&self.dir, MODULES_DIR, key)? else {
            return Err(StorageError::not_found(format!("module '{}'", key)));
        };
        FileManager::remove_dir(dir)
    }
}

pub struct FsModule {
    dir: PathBuf,
    path: Vec<String>,
    ctx: FsContext,
}

impl FsModule {
    fn store_dir_for(&self, lang_key: &str) -> PathBuf {
        self.dir.join(STORES_DIR).join(lang_key)
    }
}

impl Mapping<StoreRef> for FsModule {
    fn keys(&self) -> Result<Vec<String>> {
        FileManager::list_dir_names(self.dir.join(STORES_DIR))
    }

    fn get(&self, key: &str) -> Result<StoreRef> {
        let lang_key = LanguageInfo::from_key(key)?.key();
        let dir = self.store_dir_for(&lang_key);
        if !FileManager::dir_exists(&dir) {
            return Err(StorageError::not_found(format!(
                "store '{}' in module '{}'",
                key,
                self.key()
            )));
        }
        Ok(Box::new(FsStore {
            store: self.ctx.store_dir(dir),
            language: Some(self.ctx.languages.ensure(&lang_key)?),
        }))
    }

    fn add(&self, key: &str) -> Result<StoreRef> {
        let language = self.ctx.languages.ensure(key)?;
        let dir = self.store_dir_for(&language.key());
        if FileManager::dir_exists(&dir) {
            return Err(StorageError::KeyExists(language.key()));
        }
        let store = self.ctx.store_dir(dir);
        store.ensure_layout()?;
        debug!("Created store {:?}", store.root());
        Ok(Box::new(FsStore {
            store,
            language: Some(language),
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let dir = self.store_dir_for(&LanguageInfo::from_key(key)?.key());
        if !FileManager::dir_exists(&dir) {
            return Err(StorageError::not_found(format!("store '{}'", key)));
        }
        FileManager::remove_dir(dir)
    }
}

impl Module for FsModule {
    fn key(&self) -> String {
        self.path.last().cloned().unwrap_or_default()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn info(&self) -> Result<ModuleInfo> {
        let path = self.dir.join(MODULE_INFO_FILE);
        if !FileManager::file_exists(&path) {
            return Ok(ModuleInfo::named(self.key()));
        }
        Ok(serde_json::from_str(&FileManager::read_to_string(path)?)?)
    }

    fn set_info(&self, info: ModuleInfo) -> Result<()> {
        FileManager::write_atomic(
            self.dir.join(MODULE_INFO_FILE),
            &serde_json::to_string_pretty(&info)?,
        )
    }

    fn template(&self) -> Result<Option<StoreRef>> {
        let dir = self.dir.join(TEMPLATE_DIR);
        if !FileManager::dir_exists(&dir) {
            return Ok(None);
        }
        Ok(Some(Box::new(FsStore {
            store: self.ctx.store_dir(dir),
            language: None,
        })))
    }

    fn add_template(&self) -> Result<StoreRef> {
        let dir = self.dir.join(TEMPLATE_DIR);
        if FileManager::dir_exists(&dir) {
            return Err(StorageError::KeyExists(format!(
                "template of module '{}'",
                self.key()
            )));
        }
        let store = self.ctx.store_dir(dir);
        store.ensure_layout()?;
        Ok(Box::new(FsStore {
            store,
            language: None,
        }))
    }

    fn annotations(&self) -> Result<Annotations> {
        Ok(AnnotationFile::in_dir(&self.dir)?.all())
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        AnnotationFile::in_dir(&self.dir)?.set(key, value)
    }
}

impl HaveStatistics for FsModule {
    fn statistics(&self) -> Result<Statistics> {
        capability::module_statistics(self)
    }
}

impl Searchable for FsModule {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_module(self, needle, options)
    }
}

/// Store handle; reads see pending edits, whole-store writes need none pending
pub struct FsStore {
    store: StoreDir,
    language: Option<LanguageInfo>,
}

impl FsStore {
    pub fn store_dir(&self) -> &StoreDir {
        &self.store
    }
}

impl TranslationStore for FsStore {
    fn key(&self) -> Option<String> {
        self.language.as_ref().map(LanguageInfo::key)
    }

    fn language(&self) -> Option<LanguageInfo> {
        self.language.clone()
    }

    fn header(&self) -> Result<Header> {
        Ok(self.store.load()?.header)
    }

    fn set_header(&self, header: Header) -> Result<()> {
        let units = self.store.load()?.units;
        self.store.fill(&header, &units).map(|_| ())
    }

    fn units(&self) -> Result<Vec<TranslationUnit>> {
        Ok(self.store.load()?.units)
    }

    fn fill(&self, units: Vec<TranslationUnit>) -> Result<()> {
        let header = self.store.load()?.header;
        self.store.fill(&header, &units).map(|_| ())
    }

    /// Folds pending edits into a new revision
    fn save(&self) -> Result<()> {
        self.store.merge().map(|_| ())
    }

    fn len(&self) -> Result<usize> {
        self.store.unit_count()
    }

    fn unit(&self, index: usize) -> Result<TranslationUnit> {
        Ok(self.store.get(index as i64 + 1)?.0)
    }
}

impl HaveStatistics for FsStore {
    fn statistics(&self) -> Result<Statistics> {
        capability::store_statistics(self)
    }
}

impl Searchable for FsStore {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_store(self, needle, options)
    }
}
