/*!
 * SQLite connection management.
 *
 * This module handles SQLite connection creation and schema initialization,
 * and provides serialized access to the single shared connection.
 */

use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;
use crate::errors::Result;

/// Path reported for in-memory databases
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct DatabaseConnection {
    /// Path to the database file
    db_path: PathBuf,
    /// Shared connection, one statement at a time
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open (or create) the database file at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory()?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(IN_MEMORY_PATH),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a database operation with the connection
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connection.lock();
        f(&conn)
    }

    /// Run several statements atomically
    ///
    /// Uses a savepoint, so it nests inside a transaction opened with
    /// [`DatabaseConnection::begin`].
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.connection.lock();
        let sp = conn.savepoint()?;
        let result = f(&sp)?;
        sp.commit()?;
        Ok(result)
    }

    /// Open an explicit transaction spanning several calls
    pub fn begin(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch("BEGIN")?;
            Ok(())
        })
    }

    pub fn commit(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
    }

    pub fn rollback(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch("ROLLBACK")?;
            Ok(())
        })
    }

    /// Vacuum the database to reclaim space
    pub fn vacuum(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("VACUUM", [])?;
            Ok(())
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let count = |table: &str| -> Result<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
            };

            // Get file size if not in-memory
            let file_size = if self.db_path.to_string_lossy() != IN_MEMORY_PATH {
                std::fs::metadata(&self.db_path)
                    .map(|m| m.len())
                    .unwrap_or(0)
            } else {
                0
            };

            Ok(DatabaseStats {
                folder_count: count("folders")?,
                module_count: count("modules")?,
                store_count: count("stores")?,
                unit_count: count("units")?,
                file_size_bytes: file_size,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Number of folders, including the root
    pub folder_count: i64,
    pub module_count: i64,
    /// Number of stores, templates included
    pub store_count: i64,
    pub unit_count: i64,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Folders: {}, Modules: {}, Stores: {}, Units: {}, Size: {} KB",
            self.folder_count,
            self.module_count,
            self.store_count,
            self.unit_count,
            self.file_size_bytes / 1024
        )
    }
}
