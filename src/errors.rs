/*!
 * Error types for the locstore engine.
 *
 * Every backend reports failures through [`StorageError`], so callers can
 * match on the same kinds regardless of where the data lives.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while navigating or mutating a storage tree
#[derive(Error, Debug)]
pub enum StorageError {
    /// Unit content did not survive the encode/decode round trip
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown key in a mapping, or unknown unit
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unit id outside `1..=len`
    #[error("Unit id {id} out of range (store has {len} units)")]
    Range {
        /// Requested 1-based id
        id: i64,
        /// Number of units in the store
        len: usize,
    },

    /// The store lock is held by somebody else
    #[error("Store at {path:?} is locked by {holder}")]
    LockConflict {
        /// Store root
        path: PathBuf,
        /// Holder recorded in the lease, or "unknown"
        holder: String,
    },

    /// A nonblocking read would have needed a merge
    #[error("Operation would block: {0}")]
    WouldBlock(String),

    /// A backend does not provide every required capability
    #[error("Backend '{backend}' is incomplete: missing {missing}")]
    BackendIncomplete {
        /// Backend name
        backend: String,
        /// First missing capability
        missing: String,
    },

    /// Key already present in a mapping (or in the sibling mapping of a folder)
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// Operation the backend does not support
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No backend registered for the connection scheme
    #[error("No backend registered for scheme '{0}'")]
    UnknownScheme(String),

    /// Malformed unit or store text
    #[error("Codec error: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite failure
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl StorageError {
    /// Shorthand for a [`StorageError::NotFound`] naming the missing key
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the caller may retry the same call later and expect success
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockConflict { .. } | Self::WouldBlock(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StorageError>;
