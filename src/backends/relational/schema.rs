/*!
 * Database schema definitions.
 *
 * This module contains the SQL schema of the relational backend and
 * bootstraps it on first open. There is no migration path: a database
 * written by a newer schema version is refused.
 */

use log::{debug, info};
use rusqlite::Connection;

use crate::errors::{Result, StorageError};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Id of the root folder row
pub const ROOT_FOLDER_ID: i64 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Foreign keys are per connection
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version != SCHEMA_VERSION {
        return Err(StorageError::Unsupported(format!(
            "database schema v{} (this build reads v{})",
            current_version, SCHEMA_VERSION
        )));
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Folders form a tree; the root has no parent
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER REFERENCES folders(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            annotations TEXT NOT NULL DEFAULT '{}',
            UNIQUE(parent_id, key)
        );

        CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);

        INSERT OR IGNORE INTO folders (id, parent_id, key) VALUES (1, NULL, '');
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            checker TEXT NOT NULL DEFAULT '[]',
            annotations TEXT NOT NULL DEFAULT '{}',
            UNIQUE(folder_id, key)
        );

        CREATE INDEX IF NOT EXISTS idx_modules_folder ON modules(folder_id);
        "#,
    )?;

    // The template is the store with an empty language key
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS stores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            lang_key TEXT NOT NULL,
            header TEXT NOT NULL DEFAULT '{"entries":[]}',
            UNIQUE(module_id, lang_key)
        );

        CREATE INDEX IF NOT EXISTS idx_stores_module ON stores(module_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            store_id INTEGER NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            payload TEXT NOT NULL,
            PRIMARY KEY (store_id, position)
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS languages (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL
        );
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}
