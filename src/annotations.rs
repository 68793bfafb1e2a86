/*!
 * The `annotations.db` side-channel of folders and modules.
 *
 * A small JSON object of freeform values, loaded eagerly when the file is
 * opened and rewritten wholesale on every mutation.
 */

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::capability::Annotations;
use crate::errors::Result;
use crate::file_utils::FileManager;

/// File name used next to every folder and module
pub const ANNOTATIONS_FILE: &str = "annotations.db";

pub struct AnnotationFile {
    path: PathBuf,
    values: RwLock<Annotations>,
}

impl AnnotationFile {
    /// Load the file if it exists; a missing file is an empty mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if FileManager::file_exists(&path) {
            let text = FileManager::read_to_string(&path)?;
            if text.trim().is_empty() {
                Annotations::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Annotations::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Open the `annotations.db` inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open(dir.as_ref().join(ANNOTATIONS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn all(&self) -> Annotations {
        self.values.read().clone()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    pub fn remove(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let mut values = self.values.write();
        let removed = values.remove(key);
        if removed.is_some() {
            self.persist(&values)?;
        }
        Ok(removed)
    }

    fn persist(&self, values: &Annotations) -> Result<()> {
        let text = serde_json::to_string_pretty(values)?;
        FileManager::write_atomic(&self.path, &text)
    }
}
