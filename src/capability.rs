/*!
 * Capability interfaces every backend implements.
 *
 * The tree is navigated through boxed handles (`FolderRef`, `ModuleRef`,
 * `StoreRef`), so callers stay backend-agnostic. Handles are cheap: they
 * point at shared in-process state, a directory, or a row id, and all
 * mutation goes through `&self`.
 *
 * ```text
 * Database
 *   Folder (root)
 *     Folder ...
 *       Module            one translatable domain
 *         template        TranslationStore without a language
 *         TranslationStore one per language key
 *           TranslationUnit
 * ```
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Result, StorageError};
use crate::model::{Header, LanguageInfo, Statistics, TranslationUnit};
use crate::search::{self, ContainerMatches, SearchOptions};

pub type FolderRef = Box<dyn Folder>;
pub type ModuleRef = Box<dyn Module>;
pub type StoreRef = Box<dyn TranslationStore>;

/// Freeform annotations attached to folders and modules
pub type Annotations = BTreeMap<String, serde_json::Value>;

/// A keyed container of child objects; keys are unique
pub trait Mapping<V> {
    /// Keys currently present, in the backend's listing order
    fn keys(&self) -> Result<Vec<String>>;

    /// Look up one child; unknown keys fail with `NotFound`
    fn get(&self, key: &str) -> Result<V>;

    /// Create a child under `key`, add it to this container and return it
    fn add(&self, key: &str) -> Result<V>;

    /// Remove the entry; no cascade beyond what the backend owns
    fn remove(&self, key: &str) -> Result<()>;

    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.keys()?.iter().any(|k| k == key))
    }

    /// Like `get`, but a missing key is `Ok(None)`
    fn try_get(&self, key: &str) -> Result<Option<V>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn values(&self) -> Result<Vec<V>> {
        self.keys()?.iter().map(|key| self.get(key)).collect()
    }

    fn items(&self) -> Result<Vec<(String, V)>> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }
}

/// An object that can provide translation statistics
pub trait HaveStatistics {
    fn statistics(&self) -> Result<Statistics>;
}

/// Naive substring search; case-sensitive, unranked, in tree order
pub trait Searchable {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>>;
}

/// A child of a folder
pub enum Child {
    Folder(FolderRef),
    Module(ModuleRef),
}

/// A collection of modules and possibly other folders
pub trait Folder: HaveStatistics + Searchable {
    /// Folder key, `None` for the root
    fn key(&self) -> Option<String>;

    /// Keys from the root down to this folder
    fn path(&self) -> Vec<String>;

    fn subfolders(&self) -> &dyn Mapping<FolderRef>;

    fn modules(&self) -> &dyn Mapping<ModuleRef>;

    fn annotations(&self) -> Result<Annotations>;

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Subfolders take precedence over modules
    fn child(&self, key: &str) -> Result<Child> {
        if let Some(folder) = self.subfolders().try_get(key)? {
            return Ok(Child::Folder(folder));
        }
        match self.modules().try_get(key)? {
            Some(module) => Ok(Child::Module(module)),
            None => Err(StorageError::not_found(format!(
                "'{}' in folder /{}",
                key,
                self.path().join("/")
            ))),
        }
    }

    /// Modules plus subfolders
    fn len(&self) -> Result<usize> {
        Ok(self.modules().len()? + self.subfolders().len()?)
    }

    /// Folders and modules whose key contains `needle`, recursively
    fn find_containers(&self, needle: &str) -> Result<ContainerMatches> {
        search::find_containers(self, needle)
    }
}

/// Descriptive metadata of a module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Display name; defaults to the module key
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Identifiers of the checkers run on this module
    #[serde(default)]
    pub checker: Vec<String>,
}

impl ModuleInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One translatable domain: a template plus one store per language
///
/// As a mapping it goes from language key to translation store; `add`
/// registers unseen languages on the fly.
pub trait Module: Mapping<StoreRef> + HaveStatistics + Searchable {
    fn key(&self) -> String;

    /// Path of the containing folder followed by the module key
    fn path(&self) -> Vec<String>;

    fn info(&self) -> Result<ModuleInfo>;

    fn set_info(&self, info: ModuleInfo) -> Result<()>;

    fn template(&self) -> Result<Option<StoreRef>>;

    /// Create the template store; fails with `KeyExists` if there already is one
    fn add_template(&self) -> Result<StoreRef>;

    fn annotations(&self) -> Result<Annotations>;

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// `None` creates the template, `Some(lang)` a translation store
    fn add_store(&self, lang: Option<&str>) -> Result<StoreRef> {
        match lang {
            Some(lang) => self.add(lang),
            None => self.add_template(),
        }
    }
}

/// An ordered collection of translation units for one language of one module
pub trait TranslationStore: HaveStatistics + Searchable {
    /// Language key, `None` for a template
    fn key(&self) -> Option<String>;

    fn language(&self) -> Option<LanguageInfo>;

    fn header(&self) -> Result<Header>;

    fn set_header(&self, header: Header) -> Result<()>;

    /// All units in positional order
    fn units(&self) -> Result<Vec<TranslationUnit>>;

    /// Replace the whole unit sequence
    fn fill(&self, units: Vec<TranslationUnit>) -> Result<()>;

    /// Persist pending in-process state
    fn save(&self) -> Result<()>;

    fn len(&self) -> Result<usize> {
        Ok(self.units()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Unit at a 0-based position
    fn unit(&self, index: usize) -> Result<TranslationUnit> {
        let mut units = self.units()?;
        let len = units.len();
        if index >= len {
            return Err(StorageError::Range {
                id: index as i64 + 1,
                len,
            });
        }
        Ok(units.swap_remove(index))
    }

    /// Half-open range of units; bounds are clamped like a slice expression
    fn slice(&self, start: usize, end: usize) -> Result<Vec<TranslationUnit>> {
        let units = self.units()?;
        let end = end.min(units.len());
        let start = start.min(end);
        Ok(units[start..end].to_vec())
    }

    /// Construct a unit destined for this store
    fn make_unit(&self, trans: Vec<(String, String)>) -> TranslationUnit {
        TranslationUnit::new(trans)
    }

    /// Target of the first unit whose plural slot `plural` has the given source
    fn translate(&self, source: &str, plural: usize) -> Result<Option<String>> {
        Ok(self.units()?.into_iter().find_map(|unit| {
            unit.trans
                .get(plural)
                .filter(|(s, _)| s == source)
                .map(|(_, t)| t.clone())
        }))
    }
}

/// Which family of backend a database belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    InMemory,
    FileSystem,
    Relational,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::FileSystem => write!(f, "filesystem"),
            Self::Relational => write!(f, "relational"),
        }
    }
}

/// Anything reachable by a path from the database root
pub enum Node {
    Folder(FolderRef),
    Module(ModuleRef),
    Store(StoreRef),
}

/// Root of one storage tree, owning the language registry
pub trait Database {
    fn kind(&self) -> BackendKind;

    /// The top-level folder
    fn root(&self) -> FolderRef;

    /// Registry keyed by `code` or `code_COUNTRY`
    fn languages(&self) -> &dyn Mapping<LanguageInfo>;

    fn start_transaction(&self) -> Result<()>;

    fn commit_transaction(&self) -> Result<()>;

    fn rollback_transaction(&self) -> Result<()>;

    fn statistics(&self) -> Result<Statistics> {
        self.root().statistics()
    }

    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        self.root().find(needle, options)
    }

    /// Resolve a slash separated path such as `gnome/nautilus/lt`
    ///
    /// Segments walk folders (subfolders first, then modules); a segment
    /// after a module names a store, with `template` selecting the template.
    fn lookup(&self, path: &str) -> Result<Node> {
        let mut node = Node::Folder(self.root());
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = match node {
                Node::Folder(folder) => match folder.child(segment)? {
                    Child::Folder(f) => Node::Folder(f),
                    Child::Module(m) => Node::Module(m),
                },
                Node::Module(module) => {
                    let store = if segment == TEMPLATE_SEGMENT {
                        module.template()?.ok_or_else(|| {
                            StorageError::not_found(format!(
                                "template of module '{}'",
                                module.key()
                            ))
                        })?
                    } else {
                        module.get(segment)?
                    };
                    Node::Store(store)
                }
                Node::Store(_) => {
                    return Err(StorageError::not_found(format!(
                        "'{}' below a translation store",
                        segment
                    )));
                }
            };
        }
        Ok(node)
    }
}

/// Path segment that selects a module's template in [`Database::lookup`]
pub const TEMPLATE_SEGMENT: &str = "template";

/// Interfaces a backend can provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Database,
    Folder,
    Module,
    TranslationStore,
    LanguageInfo,
    Mapping,
    HaveStatistics,
    Searchable,
}

impl Capability {
    /// Everything a backend must provide to be accepted
    pub const REQUIRED: [Capability; 8] = [
        Capability::Database,
        Capability::Folder,
        Capability::Module,
        Capability::TranslationStore,
        Capability::LanguageInfo,
        Capability::Mapping,
        Capability::HaveStatistics,
        Capability::Searchable,
    ];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What a backend declares it implements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendManifest {
    pub name: String,
    pub kind: BackendKind,
    pub capabilities: Vec<Capability>,
}

impl BackendManifest {
    /// Manifest of a backend providing every required capability
    pub fn complete(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: Capability::REQUIRED.to_vec(),
        }
    }
}

/// Check that a backend provides a concrete variant of every interface
pub fn validate_backend(manifest: &BackendManifest) -> Result<()> {
    match Capability::REQUIRED
        .iter()
        .find(|cap| !manifest.capabilities.contains(cap))
    {
        Some(missing) => Err(StorageError::BackendIncomplete {
            backend: manifest.name.clone(),
            missing: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Sum of the statistics of every module and subfolder
pub fn folder_statistics<F: Folder + ?Sized>(folder: &F) -> Result<Statistics> {
    let mut stats = Statistics::default();
    for module in folder.modules().values()? {
        stats.accum(&module.statistics()?);
    }
    for subfolder in folder.subfolders().values()? {
        stats.accum(&subfolder.statistics()?);
    }
    Ok(stats)
}

/// Sum of the statistics of every translation store of a module
///
/// The template carries no translations and is not counted.
pub fn module_statistics<M: Module + ?Sized>(module: &M) -> Result<Statistics> {
    let mut stats = Statistics::default();
    for store in module.values()? {
        stats.accum(&store.statistics()?);
    }
    Ok(stats)
}

/// One linear scan over the store's units
pub fn store_statistics<S: TranslationStore + ?Sized>(store: &S) -> Result<Statistics> {
    Ok(Statistics::of_units(&store.units()?))
}
