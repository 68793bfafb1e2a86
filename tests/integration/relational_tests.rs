/*!
 * Integration tests for the SQLite backend
 */

use anyhow::Result;

use locstore::backends::relational::{DatabaseConnection, SqlDatabase};
use locstore::capability::{Database, Folder, Mapping, Module, TranslationStore};
use locstore::errors::StorageError;
use locstore::model::TranslationUnit;
use crate::common;

/// Data written through one connection is read back by a new one
#[test]
fn test_reopen_shouldKeepTree() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("po.db");
    {
        let db = SqlDatabase::new(DatabaseConnection::new(&path)?);
        let (module, _) = common::sample_module(&db, "nautilus", "fr")?;
        module.set_annotation("upstream", serde_json::json!("gitlab"))?;
    }

    let db = SqlDatabase::new(DatabaseConnection::new(&path)?);
    let module = db.root().subfolders().get("gnome")?.modules().get("nautilus")?;
    let store = module.get("fr")?;
    assert_eq!(store.len()?, 4);
    assert_eq!(store.unit(1)?.trans[1].1, "Fichiers");
    assert_eq!(store.header()?.plural_forms().map(|(n, _)| n), Some(2));
    assert_eq!(module.annotations()?["upstream"], "gitlab");
    assert!(db.languages().contains_key("fr")?);

    let stats = db.connection().stats()?;
    assert_eq!(stats.module_count, 1);
    assert_eq!(stats.unit_count, 4);
    Ok(())
}

/// A rolled back transaction leaves no trace
#[test]
fn test_rollbackTransaction_shouldDiscardChanges() -> Result<()> {
    let db = SqlDatabase::in_memory()?;
    let (_, store) = common::sample_module(&db, "gedit", "fr")?;

    db.start_transaction()?;
    store.fill(vec![TranslationUnit::singular("Only", "Seul")])?;
    db.root().subfolders().add("kde")?;
    db.rollback_transaction()?;

    assert_eq!(store.len()?, 4);
    assert!(!db.root().subfolders().contains_key("kde")?);

    db.start_transaction()?;
    store.fill(vec![TranslationUnit::singular("Only", "Seul")])?;
    db.commit_transaction()?;
    assert_eq!(store.len()?, 1);
    Ok(())
}

/// Each module has at most one template, kept apart from the language stores
#[test]
fn test_template_shouldBeSeparateFromStores() -> Result<()> {
    let db = SqlDatabase::in_memory()?;
    let (module, _) = common::sample_module(&db, "totem", "fr")?;
    assert!(module.template()?.is_none());

    let template = common::sample_template(module.as_ref())?;

    assert!(template.key().is_none());
    assert_eq!(module.keys()?, vec!["fr".to_string()]);
    assert_eq!(module.template()?.map(|t| t.len()).transpose()?, Some(4));
    assert!(matches!(module.add_template(), Err(StorageError::KeyExists(_))));
    Ok(())
}

/// Unit positions are 1-based and contiguous after a fill
#[test]
fn test_unit_outOfRange_shouldFailWithRange() -> Result<()> {
    let db = SqlDatabase::in_memory()?;
    let (_, store) = common::sample_module(&db, "gedit", "fr")?;

    assert_eq!(store.unit(3)?.source(), "Quit");
    assert!(matches!(store.unit(4), Err(StorageError::Range { id: 5, len: 4 })));
    Ok(())
}

/// Removing a folder removes everything below it
#[test]
fn test_removeFolder_shouldCascade() -> Result<()> {
    let db = SqlDatabase::in_memory()?;
    common::sample_module(&db, "gedit", "fr")?;

    db.root().subfolders().remove("gnome")?;

    let stats = db.connection().stats()?;
    assert_eq!(stats.folder_count, 1);
    assert_eq!(stats.module_count, 0);
    assert_eq!(stats.store_count, 0);
    assert_eq!(stats.unit_count, 0);
    Ok(())
}

/// Only SQLite is available among relational engines
#[test]
fn test_connect_withOtherEngine_shouldBeUnsupported() {
    let config = locstore::Config::default();
    let result = locstore::backends::relational::connect("mysql://localhost/po", &config);
    assert!(matches!(result, Err(StorageError::Unsupported(_))));
}
