/*!
 * Store header: an ordered key/value mapping (encoding, plural forms, ...).
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};

static PLURAL_FORMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"nplurals\s*=\s*(\d+)\s*;\s*plural\s*=\s*([^;]+);?")
        .expect("plural forms pattern is valid")
});

/// Ordered header of a translation store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new key; fails if the key is already present
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(StorageError::KeyExists(key));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    /// Replace the value of an existing key, or append it
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Result<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k == key)
            .ok_or_else(|| StorageError::not_found(format!("header key '{}'", key)))?;
        Ok(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(nplurals, equation)` from a `Plural-Forms` entry, if present and well formed
    pub fn plural_forms(&self) -> Option<(u32, String)> {
        let value = self.get("Plural-Forms")?;
        let caps = PLURAL_FORMS_RE.captures(value)?;
        let nplurals = caps.get(1)?.as_str().parse().ok()?;
        Some((nplurals, caps.get(2)?.as_str().trim().to_string()))
    }
}
