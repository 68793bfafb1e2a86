/*!
 * Storage backends and the registry that opens them.
 *
 * A connection string `scheme://rest` picks the backend:
 * - `mem://` : in-process tree
 * - `fs:///path/to/root` : directory tree with pending edits and merges
 * - `sqlite:///path/to/file.db` : relational tables
 *
 * Backends are registered together with a manifest and must pass
 * [`validate_backend`] before they can be used. One backend may be the
 * fallback for schemes nobody claimed (the relational one by default,
 * which then reports unsupported engines itself).
 */

pub mod filesystem;
pub mod languages;
pub mod memory;
pub mod relational;

use log::{debug, info};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::app_config::Config;
use crate::capability::{BackendManifest, Database, validate_backend};
use crate::errors::{Result, StorageError};

/// Opens a database for a connection string
pub type Connector = fn(&str, &Config) -> Result<Box<dyn Database>>;

#[derive(Clone)]
struct RegisteredBackend {
    manifest: BackendManifest,
    connector: Connector,
}

#[derive(Default)]
struct BackendRegistry {
    schemes: BTreeMap<String, RegisteredBackend>,
    fallback: Option<RegisteredBackend>,
}

static REGISTRY: Lazy<RwLock<BackendRegistry>> = Lazy::new(|| RwLock::new(BackendRegistry::default()));

/// Reject keys that cannot name a folder, module or store
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        return Err(StorageError::Validation(format!("invalid key '{}'", key)));
    }
    Ok(())
}

/// Split `scheme://rest` into its two halves
pub fn split_uri(uri: &str) -> Result<(&str, &str)> {
    match uri.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => Ok((scheme, rest)),
        _ => Err(StorageError::Config(format!(
            "connection string '{}' has no scheme",
            uri
        ))),
    }
}

/// Register a backend for a scheme, replacing any previous one
pub fn register_backend(scheme: &str, manifest: BackendManifest, connector: Connector) -> Result<()> {
    validate_backend(&manifest)?;
    debug!("Registering backend '{}' for scheme '{}'", manifest.name, scheme);
    REGISTRY.write().schemes.insert(
        scheme.to_string(),
        RegisteredBackend {
            manifest,
            connector,
        },
    );
    Ok(())
}

/// Register the backend used for schemes without a dedicated entry
pub fn register_fallback_backend(manifest: BackendManifest, connector: Connector) -> Result<()> {
    validate_backend(&manifest)?;
    debug!("Registering fallback backend '{}'", manifest.name);
    REGISTRY.write().fallback = Some(RegisteredBackend {
        manifest,
        connector,
    });
    Ok(())
}

/// Register the bundled backends; calling it again is harmless
pub fn register_default_backends() -> Result<()> {
    register_backend("mem", memory::manifest(), memory::connect)?;
    register_backend("fs", filesystem::manifest(), filesystem::connect)?;
    register_backend("sqlite", relational::manifest(), relational::connect)?;
    register_fallback_backend(relational::manifest(), relational::connect)
}

/// Schemes with a registered backend, sorted
pub fn registered_schemes() -> Vec<String> {
    REGISTRY.read().schemes.keys().cloned().collect()
}

/// Open a database with default settings
pub fn open_database(uri: &str) -> Result<Box<dyn Database>> {
    open_database_with(&Config::with_uri(uri))
}

/// Open the database named by `config.database_uri`
pub fn open_database_with(config: &Config) -> Result<Box<dyn Database>> {
    config.validate()?;
    let uri = config.database_uri.as_str();
    let (scheme, _) = split_uri(uri)?;

    let backend = {
        let registry = REGISTRY.read();
        registry
            .schemes
            .get(scheme)
            .or(registry.fallback.as_ref())
            .cloned()
    };

    match backend {
        Some(backend) => {
            info!("Opening {} with backend '{}'", uri, backend.manifest.name);
            (backend.connector)(uri, config)
        }
        None => Err(StorageError::UnknownScheme(scheme.to_string())),
    }
}
