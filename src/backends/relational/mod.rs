/*!
 * Relational backend on SQLite.
 *
 * Folders, modules and stores are rows; units are JSON payload rows keyed
 * by their 1-based position. Handles carry row ids only. Database
 * transactions map to `BEGIN` / `COMMIT` / `ROLLBACK`, and every
 * multi-statement operation runs in a savepoint inside them.
 */

pub mod connection;
pub mod schema;

pub use connection::DatabaseConnection;

use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params};

use self::schema::ROOT_FOLDER_ID;
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
    BackendManifest::complete("relational", BackendKind::Relational)
}

/// Registry constructor for relational connection strings
///
/// Only SQLite is available: `sqlite:///path/to/file.db`, or `sqlite://`
/// and `sqlite://:memory:` for a private in-memory database.
pub fn connect(uri: &str, _config: &Config) -> Result<Box<dyn Database>> {
    let (scheme, path) = super::split_uri(uri)?;
    if scheme != "sqlite" {
        return Err(StorageError::Unsupported(format!(
            "relational engine '{}' (only sqlite is available)",
            scheme
        )));
    }
    let conn = if path.is_empty() || path == connection::IN_MEMORY_PATH {
        DatabaseConnection::new_in_memory()?
    } else {
        DatabaseConnection::new(path)?
    };
    Ok(Box::new(SqlDatabase::new(conn)))
}

pub struct SqlDatabase {
    conn: DatabaseConnection,
    languages: SqlLanguages,
}

impl SqlDatabase {
    pub fn new(conn: DatabaseConnection) -> Self {
        info!("Opened relational database at {:?}", conn.path());
        Self {
            languages: SqlLanguages { conn: conn.clone() },
            conn,
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

impl Database for SqlDatabase {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn root(&self) -> FolderRef {
        Box::new(SqlFolder::new(self.conn.clone(), ROOT_FOLDER_ID, Vec::new()))
    }

    fn languages(&self) -> &dyn Mapping<LanguageInfo> {
        &self.languages
    }

    fn start_transaction(&self) -> Result<()> {
        self.conn.begin()
    }

    fn commit_transaction(&self) -> Result<()> {
        self.conn.commit()
    }

    fn rollback_transaction(&self) -> Result<()> {
        self.conn.rollback()
    }
}

struct SqlLanguages {
    conn: DatabaseConnection,
}

impl SqlLanguages {
    fn ensure(&self, key: &str) -> Result<LanguageInfo> {
        let info = LanguageInfo::from_key(key)?;
        let payload = serde_json::to_string(&info)?;
        self.conn.execute(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO languages (key, payload) VALUES (?1, ?2)",
                params![info.key(), payload],
            )?;
            if inserted > 0 {
                info!("Registering language {} ({})", info.key(), info.name);
            }
            Ok(())
        })?;
        self.get(&info.key())
    }
}

impl Mapping<LanguageInfo> for SqlLanguages {
    fn keys(&self) -> Result<Vec<String>> {
        self.conn
            .execute(|conn| query_strings(conn, "SELECT key FROM languages ORDER BY key", []))
    }

    fn get(&self, key: &str) -> Result<LanguageInfo> {
        let normalized = LanguageInfo::from_key(key)?.key();
        let payload: Option<String> = self.conn.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT payload FROM languages WHERE key = ?1",
                    [&normalized],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(StorageError::not_found(format!("language '{}'", key))),
        }
    }

    fn add(&self, key: &str) -> Result<LanguageInfo> {
        let normalized = LanguageInfo::from_key(key)?.key();
        if self.contains_key(&normalized)? {
            return Err(StorageError::KeyExists(normalized));
        }
        self.ensure(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let normalized = LanguageInfo::from_key(key)?.key();
        let removed = self.conn.execute(|conn| {
            Ok(conn.execute("DELETE FROM languages WHERE key = ?1", [&normalized])?)
        })?;
        if removed == 0 {
            return Err(StorageError::not_found(format!("language '{}'", key)));
        }
        Ok(())
    }
}

fn query_strings<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn child_path(path: &[String], key: &str) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(key.to_string());
    child
}

fn load_annotations(conn: &DatabaseConnection, table: &str, id: i64) -> Result<Annotations> {
    let text: String = conn.execute(|conn| {
        Ok(conn.query_row(
            &format!("SELECT annotations FROM {} WHERE id = ?1", table),
            [id],
            |row| row.get(0),
        )?)
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn store_annotation(
    conn: &DatabaseConnection,
    table: &str,
    id: i64,
    key: &str,
    value: serde_json::Value,
) -> Result<()> {
    let mut annotations = load_annotations(conn, table, id)?;
    annotations.insert(key.to_string(), value);
    let text = serde_json::to_string(&annotations)?;
    conn.execute(|conn| {
        conn.execute(
            &format!("UPDATE {} SET annotations = ?1 WHERE id = ?2", table),
            params![text, id],
        )?;
        Ok(())
    })
}

/// Fails with `KeyExists` if `key` names a subfolder or a module of the folder
fn ensure_free_key(conn: &Connection, folder_id: i64, key: &str) -> Result<()> {
    let taken: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM folders WHERE parent_id = ?1 AND key = ?2)
              + (SELECT COUNT(*) FROM modules WHERE folder_id = ?1 AND key = ?2)",
        params![folder_id, key],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(StorageError::KeyExists(key.to_string()));
    }
    Ok(())
}

pub struct SqlFolder {
    conn: DatabaseConnection,
    id: i64,
    path: Vec<String>,
    subfolders: SqlSubfolders,
    modules: SqlModules,
}

impl SqlFolder {
    fn new(conn: DatabaseConnection, id: i64, path: Vec<String>) -> Self {
        Self {
            subfolders: SqlSubfolders {
                conn: conn.clone(),
                folder_id: id,
                path: path.clone(),
            },
            modules: SqlModules {
                conn: conn.clone(),
                folder_id: id,
                path: path.clone(),
            },
            conn,
            id,
            path,
        }
    }
}

impl Folder for SqlFolder {
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
        load_annotations(&self.conn, "folders", self.id)
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        store_annotation(&self.conn, "folders", self.id, key, value)
    }
}

impl HaveStatistics for SqlFolder {
    fn statistics(&self) -> Result<Statistics> {
        capability::folder_statistics(self)
    }
}

impl Searchable for SqlFolder {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_folder(self, needle, options)
    }
}

struct SqlSubfolders {
    conn: DatabaseConnection,
    folder_id: i64,
    path: Vec<String>,
}

impl Mapping<FolderRef> for SqlSubfolders {
    fn keys(&self) -> Result<Vec<String>> {
        self.conn.execute(|conn| {
            query_strings(
                conn,
                "SELECT key FROM folders WHERE parent_id = ?1 ORDER BY key",
                [self.folder_id],
            )
        })
    }

    fn get(&self, key: &str) -> Result<FolderRef> {
        let id: Option<i64> = self.conn.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM folders WHERE parent_id = ?1 AND key = ?2",
                    params![self.folder_id, key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match id {
            Some(id) => Ok(Box::new(SqlFolder::new(
                self.conn.clone(),
                id,
                child_path(&self.path, key),
            ))),
            None => Err(StorageError::not_found(format!("folder '{}'", key))),
        }
    }

    fn add(&self, key: &str) -> Result<FolderRef> {
        validate_key(key)?;
        let id = self.conn.transaction(|conn| {
            ensure_free_key(conn, self.folder_id, key)?;
            conn.execute(
                "INSERT INTO folders (parent_id, key) VALUES (?1, ?2)",
                params![self.folder_id, key],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        debug!("Created folder {} (row {})", child_path(&self.path, key).join("/"), id);
        Ok(Box::new(SqlFolder::new(
            self.conn.clone(),
            id,
            child_path(&self.path, key),
        )))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let removed = self.conn.execute(|conn| {
            Ok(conn.execute(
                "DELETE FROM folders WHERE parent_id = ?1 AND key = ?2",
                params![self.folder_id, key],
            )?)
        })?;
        if removed == 0 {
            return Err(StorageError::not_found(format!("folder '{}'", key)));
        }
        Ok(())
    }
}

struct SqlModules {
    conn: DatabaseConnection,
    folder_id: i64,
    path: Vec<String>,
}

impl Mapping<ModuleRef> for SqlModules {
    fn keys(&self) -> Result<Vec<String>> {
        self.conn.execute(|conn| {
            query_strings(
                conn,
                "SELECT key FROM modules WHERE folder_id = ?1 ORDER BY key",
                [self.folder_id],
            )
        })
    }

    fn get(&self, key: &str) -> Result<ModuleRef> {
        let id: Option<i64> = self.conn.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM modules WHERE folder_id = ?1 AND key = ?2",
                    params![self.folder_id, key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match id {
            Some(id) => Ok(Box::new(SqlModule {
                conn: self.conn.clone(),
                id,
                path: child_path(&self.path, key),
                languages: SqlLanguages {
                    conn: self.conn.clone(),
                },
            })),
            None => Err(StorageError::not_found(format!("module '{}'", key))),
        }
    }

    fn add(&self, key: &str) -> Result<ModuleRef> {
        validate_key(key)?;
        let id = self.conn.transaction(|conn| {
            ensure_free_key(conn, self.folder_id, key)?;
            conn.execute(
                "INSERT INTO modules (folder_id, key, name) VALUES (?1, ?2, ?2)",
                params![self.folder_id, key],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        debug!("Created module {} (row {})", child_path(&self.path, key).join("/"), id);
        Ok(Box::new(SqlModule {
            conn: self.conn.clone(),
            id,
            path: child_path(&self.path, key),
            languages: SqlLanguages {
                conn: self.conn.clone(),
            },
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let removed = self.conn.execute(|conn| {
            Ok(conn.execute(
                "DELETE FROM modules WHERE folder_id = ?1 AND key = ?2",
                params![self.folder_id, key],
            )?)
        })?;
        if removed == 0 {
            return Err(StorageError::not_found(format!("module '{}'", key)));
        }
        Ok(())
    }
}

/// Language key of the template row
const TEMPLATE_KEY: &str = "";

pub struct SqlModule {
    conn: DatabaseConnection,
    id: i64,
    path: Vec<String>,
    languages: SqlLanguages,
}

impl SqlModule {
    fn store_id(&self, lang_key: &str) -> Result<Option<i64>> {
        self.conn.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM stores WHERE module_id = ?1 AND lang_key = ?2",
                    params![self.id, lang_key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn insert_store(&self, lang_key: &str) -> Result<i64> {
        self.conn.transaction(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM stores WHERE module_id = ?1 AND lang_key = ?2",
                params![self.id, lang_key],
                |row| row.get(0),
            )?;
            if exists > 0 {
                return Err(StorageError::KeyExists(if lang_key.is_empty() {
                    format!("template of module '{}'", self.key())
                } else {
                    lang_key.to_string()
                }));
            }
            conn.execute(
                "INSERT INTO stores (module_id, lang_key) VALUES (?1, ?2)",
                params![self.id, lang_key],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

impl Mapping<StoreRef> for SqlModule {
    fn keys(&self) -> Result<Vec<String>> {
        self.conn.execute(|conn| {
            query_strings(
                conn,
                "SELECT lang_key FROM stores WHERE module_id = ?1 AND lang_key != '' ORDER BY lang_key",
                [self.id],
            )
        })
    }

    fn get(&self, key: &str) -> Result<StoreRef> {
        let lang_key = LanguageInfo::from_key(key)?.key();
        match self.store_id(&lang_key)? {
            Some(id) => Ok(Box::new(SqlStore {
                conn: self.conn.clone(),
                id,
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
        let id = self.insert_store(&language.key())?;
        debug!("Created store {}/{}", self.path.join("/"), language.key());
        Ok(Box::new(SqlStore {
            conn: self.conn.clone(),
            id,
            language: Some(language),
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let lang_key = LanguageInfo::from_key(key)?.key();
        let removed = self.conn.execute(|conn| {
            Ok(conn.execute(
                "DELETE FROM stores WHERE module_id = ?1 AND lang_key = ?2",
                params![self.id, lang_key],
            )?)
        })?;
        if removed == 0 {
            return Err(StorageError::not_found(format!("store '{}'", key)));
        }
        Ok(())
    }
}

impl Module for SqlModule {
    fn key(&self) -> String {
        self.path.last().cloned().unwrap_or_default()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn info(&self) -> Result<ModuleInfo> {
        let (name, description, checker): (String, Option<String>, String) =
            self.conn.execute(|conn| {
                Ok(conn.query_row(
                    "SELECT name, description, checker FROM modules WHERE id = ?1",
                    [self.id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?)
            })?;
        Ok(ModuleInfo {
            name,
            description,
            checker: serde_json::from_str(&checker)?,
        })
    }

    fn set_info(&self, info: ModuleInfo) -> Result<()> {
        let checker = serde_json::to_string(&info.checker)?;
        self.conn.execute(|conn| {
            conn.execute(
                "UPDATE modules SET name = ?1, description = ?2, checker = ?3 WHERE id = ?4",
                params![info.name, info.description, checker, self.id],
            )?;
            Ok(())
        })
    }

    fn template(&self) -> Result<Option<StoreRef>> {
        Ok(self.store_id(TEMPLATE_KEY)?.map(|id| {
            Box::new(SqlStore {
                conn: self.conn.clone(),
                id,
                language: None,
            }) as StoreRef
        }))
    }

    fn add_template(&self) -> Result<StoreRef> {
        let id = self.insert_store(TEMPLATE_KEY)?;
        Ok(Box::new(SqlStore {
            conn: self.conn.clone(),
            id,
            language: None,
        }))
    }

    fn annotations(&self) -> Result<Annotations> {
        load_annotations(&self.conn, "modules", self.id)
    }

    fn set_annotation(&self, key: &str, value: serde_json::Value) -> Result<()> {
        store_annotation(&self.conn, "modules", self.id, key, value)
    }
}

impl HaveStatistics for SqlModule {
    fn statistics(&self) -> Result<Statistics> {
        capability::module_statistics(self)
    }
}

impl Searchable for SqlModule {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_module(self, needle, options)
    }
}

pub struct SqlStore {
    conn: DatabaseConnection,
    id: i64,
    language: Option<LanguageInfo>,
}

impl TranslationStore for SqlStore {
    fn key(&self) -> Option<String> {
        self.language.as_ref().map(LanguageInfo::key)
    }

    fn language(&self) -> Option<LanguageInfo> {
        self.language.clone()
    }

    fn header(&self) -> Result<Header> {
        let text: String = self.conn.execute(|conn| {
            Ok(conn.query_row("SELECT header FROM stores WHERE id = ?1", [self.id], |row| {
                row.get(0)
            })?)
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn set_header(&self, header: Header) -> Result<()> {
        let text = serde_json::to_string(&header)?;
        self.conn.execute(|conn| {
            conn.execute(
                "UPDATE stores SET header = ?1 WHERE id = ?2",
                params![text, self.id],
            )?;
            Ok(())
        })
    }

    fn units(&self) -> Result<Vec<TranslationUnit>> {
        let payloads = self.conn.execute(|conn| {
            query_strings(
                conn,
                "SELECT payload FROM units WHERE store_id = ?1 ORDER BY position",
                [self.id],
            )
        })?;
        payloads
            .iter()
            .map(|payload| Ok(serde_json::from_str(payload)?))
            .collect()
    }

    fn fill(&self, units: Vec<TranslationUnit>) -> Result<()> {
        let payloads = units
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<String>>>()?;
        self.conn.transaction(|conn| {
            conn.execute("DELETE FROM units WHERE store_id = ?1", [self.id])?;
            let mut stmt =
                conn.prepare("INSERT INTO units (store_id, position, payload) VALUES (?1, ?2, ?3)")?;
            for (i, payload) in payloads.iter().enumerate() {
                stmt.execute(params![self.id, i as i64 + 1, payload])?;
            }
            Ok(())
        })?;
        debug!("Filled store row {} with {} units", self.id, units.len());
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.execute(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM units WHERE store_id = ?1",
                [self.id],
                |row| row.get(0),
            )?)
        })?;
        Ok(count as usize)
    }

    fn unit(&self, index: usize) -> Result<TranslationUnit> {
        let payload: Option<String> = self.conn.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT payload FROM units WHERE store_id = ?1 AND position = ?2",
                    params![self.id, index as i64 + 1],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(StorageError::Range {
                id: index as i64 + 1,
                len: self.len()?,
            }),
        }
    }
}

impl HaveStatistics for SqlStore {
    fn statistics(&self) -> Result<Statistics> {
        capability::store_statistics(self)
    }
}

impl Searchable for SqlStore {
    fn find(&self, needle: &str, options: &SearchOptions) -> Result<Vec<TranslationUnit>> {
        search::find_in_store(self, needle, options)
    }
}
