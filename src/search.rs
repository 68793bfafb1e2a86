/*!
 * Naive linear search over the storage tree.
 *
 * Results come back in tree order: modules before subfolders, stores in
 * mapping order, units by position. There is no ranking. `limit` and
 * `offset` slice the whole result list once, at the level the caller
 * asked, never per child.
 */

use serde::{Deserialize, Serialize};

use crate::capability::{Folder, Module, TranslationStore};
use crate::errors::Result;
use crate::model::TranslationUnit;

/// What to match and how much to return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default = "default_true")]
    pub search_source: bool,
    #[serde(default = "default_true")]
    pub search_target: bool,
    /// Maximum number of results; `None` returns everything
    #[serde(default)]
    pub limit: Option<usize>,
    /// Number of leading results to skip
    #[serde(default)]
    pub offset: usize,
}

fn default_true() -> bool {
    true
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_source: true,
            search_target: true,
            limit: None,
            offset: 0,
        }
    }
}

impl SearchOptions {
    pub fn source_only() -> Self {
        Self {
            search_target: false,
            ..Default::default()
        }
    }

    pub fn target_only() -> Self {
        Self {
            search_source: false,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Same sides, no slicing; used when descending into children
    fn unbounded(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }

    /// Apply offset and limit to a full result list
    pub fn window<T>(&self, results: Vec<T>) -> Vec<T> {
        let iter = results.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Units whose source or target contains `needle`, each at most once
pub fn find_in_units<'a, I>(units: I, needle: &str, options: &SearchOptions) -> Vec<TranslationUnit>
where
    I: IntoIterator<Item = &'a TranslationUnit>,
{
    let found = units
        .into_iter()
        .filter(|unit| unit.matches(needle, options.search_source, options.search_target))
        .cloned()
        .collect();
    options.window(found)
}

pub fn find_in_store<S: TranslationStore + ?Sized>(
    store: &S,
    needle: &str,
    options: &SearchOptions,
) -> Result<Vec<TranslationUnit>> {
    Ok(find_in_units(&store.units()?, needle, options))
}

/// Search every translation store of a module; the template is skipped
pub fn find_in_module<M: Module + ?Sized>(
    module: &M,
    needle: &str,
    options: &SearchOptions,
) -> Result<Vec<TranslationUnit>> {
    let inner = options.unbounded();
    let mut found = Vec::new();
    for store in module.values()? {
        found.extend(store.find(needle, &inner)?);
    }
    Ok(options.window(found))
}

/// Search the modules of a folder, then recurse into its subfolders
pub fn find_in_folder<F: Folder + ?Sized>(
    folder: &F,
    needle: &str,
    options: &SearchOptions,
) -> Result<Vec<TranslationUnit>> {
    let inner = options.unbounded();
    let mut found = Vec::new();
    for module in folder.modules().values()? {
        found.extend(module.find(needle, &inner)?);
    }
    for subfolder in folder.subfolders().values()? {
        found.extend(subfolder.find(needle, &inner)?);
    }
    Ok(options.window(found))
}

/// Paths of the containers whose key matched, joined with `/`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMatches {
    pub folders: Vec<String>,
    pub modules: Vec<String>,
}

impl ContainerMatches {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.modules.is_empty()
    }

    fn extend(&mut self, other: ContainerMatches) {
        self.folders.extend(other.folders);
        self.modules.extend(other.modules);
    }
}

pub fn find_containers<F: Folder + ?Sized>(folder: &F, needle: &str) -> Result<ContainerMatches> {
    let mut matches = ContainerMatches::default();
    for module in folder.modules().values()? {
        if module.key().contains(needle) {
            matches.modules.push(module.path().join("/"));
        }
    }
    for subfolder in folder.subfolders().values()? {
        if subfolder.key().is_some_and(|key| key.contains(needle)) {
            matches.folders.push(subfolder.path().join("/"));
        }
        matches.extend(subfolder.find_containers(needle)?);
    }
    Ok(matches)
}
