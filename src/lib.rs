/*!
 * # locstore - hierarchical storage for localization data
 *
 * A library for storing translation catalogs in a tree of folders and
 * modules, behind interchangeable backends.
 *
 * ## Features
 *
 * - One capability interface over three backends:
 *   - in-memory (`mem://`)
 *   - filesystem with pending edits, merging and byte-offset indexes (`fs://`)
 *   - relational on SQLite (`sqlite://`)
 * - Backend registry with capability validation
 * - Statistics aggregated up the tree
 * - Naive substring search over units and container keys
 * - Template merging and PO-style import/export
 *
 * ## Architecture
 *
 * - `capability`: the traits every backend implements
 * - `model`: units, headers, languages and statistics
 * - `backends`: backend implementations and the registry:
 *   - `backends::memory`: in-process tree
 *   - `backends::filesystem`: directory tree, store locks and indexes
 *   - `backends::relational`: SQLite tables
 * - `codec`: textual unit serialization
 * - `merge`: template to translation merging
 * - `search`: search options and tree walks
 * - `app_config`: configuration handed to backends
 * - `errors`: the shared error type
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod annotations;
pub mod app_config;
pub mod backends;
pub mod capability;
pub mod codec;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod logging;
pub mod merge;
pub mod model;
pub mod search;

// Re-export main types for easier usage
pub use app_config::Config;
pub use backends::{open_database, open_database_with, register_default_backends};
pub use capability::{
    BackendKind, Database, Folder, FolderRef, Mapping, Module, ModuleInfo, ModuleRef, Node,
    StoreRef, TranslationStore,
};
pub use codec::{PoCodec, UnitCodec};
pub use errors::{Result, StorageError};
pub use merge::SimpleMerger;
pub use model::{Header, LanguageInfo, Statistics, TranslationUnit};
pub use search::SearchOptions;
