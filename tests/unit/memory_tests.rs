/*!
 * Tests for the in-memory backend and the tree navigation it shares with the others
 */

use anyhow::Result;
use locstore::backends::memory::MemoryDatabase;
use locstore::capability::{
    Child, Database, Folder, Mapping, Module, ModuleInfo, Node, Searchable, TranslationStore,
};
use locstore::errors::StorageError;
use locstore::search::SearchOptions;
use crate::common;

/// Lookups walk folders, modules and stores by path
#[test]
fn test_lookup_withPaths_shouldResolveEveryLevel() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, _) = common::sample_module(&db, "nautilus", "fr")?;
    common::sample_template(module.as_ref())?;

    assert!(matches!(db.lookup("")?, Node::Folder(f) if f.key().is_none()));
    assert!(matches!(db.lookup("gnome")?, Node::Folder(_)));
    assert!(matches!(db.lookup("gnome/nautilus")?, Node::Module(m) if m.key() == "nautilus"));
    match db.lookup("gnome/nautilus/fr")? {
        Node::Store(store) => assert_eq!(store.key().as_deref(), Some("fr")),
        _ => panic!("expected a store"),
    }
    match db.lookup("gnome/nautilus/template")? {
        Node::Store(store) => assert!(store.key().is_none()),
        _ => panic!("expected the template"),
    }
    assert!(matches!(db.lookup("gnome/missing"), Err(StorageError::NotFound(_))));
    assert!(matches!(db.lookup("gnome/nautilus/fr/x"), Err(StorageError::NotFound(_))));
    Ok(())
}

/// A folder child resolves subfolders before modules
#[test]
fn test_child_shouldFindModulesAndFolders() -> Result<()> {
    let db = MemoryDatabase::new();
    let root = db.root();
    root.subfolders().add("gnome")?;
    root.modules().add("coreutils")?;

    assert!(matches!(root.child("gnome")?, Child::Folder(_)));
    assert!(matches!(root.child("coreutils")?, Child::Module(_)));
    assert!(matches!(root.child("kde"), Err(StorageError::NotFound(_))));
    assert_eq!(root.len()?, 2);
    Ok(())
}

/// Unit ids outside the store are range errors naming the 1-based id
#[test]
fn test_unit_outOfRange_shouldFailWithRange() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "gedit", "fr")?;

    match store.unit(4) {
        Err(StorageError::Range { id, len }) => {
            assert_eq!(id, 5);
            assert_eq!(len, 4);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(store.slice(2, 100)?.len(), 2);
    assert!(store.slice(9, 3)?.is_empty());
    Ok(())
}

/// Translation lookup by source and plural slot
#[test]
fn test_translate_shouldMatchSourceAndSlot() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "gedit", "fr")?;

    assert_eq!(store.translate("Open", 0)?.as_deref(), Some("Ouvrir"));
    assert_eq!(store.translate("Files", 1)?.as_deref(), Some("Fichiers"));
    assert_eq!(store.translate("Files", 0)?, None);
    assert_eq!(store.translate("Unknown", 0)?, None);
    Ok(())
}

/// Search honours sides, limit and offset at the level it was asked on
#[test]
fn test_find_withOptions_shouldFilterAndWindow() -> Result<()> {
    let db = MemoryDatabase::new();
    common::sample_module(&db, "nautilus", "fr")?;
    common::sample_module(&db, "gedit", "fr")?;

    let all = db.find("F", &SearchOptions::default())?;
    // "File"/"Fichier" and "Fermer" in each module
    assert_eq!(all.len(), 4);

    let source_only = db.find("Fermer", &SearchOptions::source_only())?;
    assert!(source_only.is_empty());
    let target_only = db.find("Fermer", &SearchOptions::target_only())?;
    assert_eq!(target_only.len(), 2);

    let window = db.find("F", &SearchOptions::default().with_offset(1).with_limit(2))?;
    assert_eq!(window, all[1..3].to_vec());
    Ok(())
}

/// The template is not searched
#[test]
fn test_moduleFind_withTemplate_shouldSkipTemplate() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, _) = common::sample_module(&db, "nautilus", "fr")?;
    common::sample_template(module.as_ref())?;

    assert!(module.find("Save As", &SearchOptions::default())?.is_empty());
    Ok(())
}

/// Container search matches folder and module keys below the folder
#[test]
fn test_findContainers_shouldMatchKeysRecursively() -> Result<()> {
    let db = MemoryDatabase::new();
    common::sample_module(&db, "gnome-shell", "fr")?;
    common::sample_module(&db, "nautilus", "fr")?;

    let matches = db.root().find_containers("gnome")?;

    assert_eq!(matches.folders, vec!["gnome".to_string()]);
    assert_eq!(matches.modules, vec!["gnome/gnome-shell".to_string()]);
    Ok(())
}

/// Module metadata and annotations are stored per module
#[test]
fn test_moduleInfo_andAnnotations_shouldPersistOnNode() -> Result<()> {
    let db = MemoryDatabase::new();
    let folder = db.root().subfolders().add("gnome")?;
    let module = folder.modules().add("gedit")?;
    assert_eq!(module.info()?, ModuleInfo::named("gedit"));

    let mut info = ModuleInfo::named("Gedit");
    info.description = Some("Text editor".to_string());
    info.checker = vec!["gnome".to_string()];
    module.set_info(info.clone())?;
    module.set_annotation("maintainer", serde_json::json!("someone"))?;
    folder.set_annotation("vcs", serde_json::json!({"type": "git"}))?;

    let again = db.root().subfolders().get("gnome")?.modules().get("gedit")?;
    assert_eq!(again.info()?, info);
    assert_eq!(again.annotations()?["maintainer"], "someone");
    assert_eq!(db.root().subfolders().get("gnome")?.annotations()?["vcs"]["type"], "git");
    Ok(())
}

/// Store keys are normalized language keys, and languages register on first use
#[test]
fn test_addStore_shouldNormalizeKeyAndRegisterLanguage() -> Result<()> {
    let db = MemoryDatabase::new();
    let module = db.root().modules().add("coreutils")?;

    let store = module.add("pt_br")?;

    assert_eq!(store.key().as_deref(), Some("pt_BR"));
    assert_eq!(module.keys()?, vec!["pt_BR".to_string()]);
    assert!(module.get("pt_BR").is_ok());
    assert!(db.languages().contains_key("pt_BR")?);
    assert!(matches!(module.add("pt_BR"), Err(StorageError::KeyExists(_))));
    Ok(())
}

/// Removing entries leaves siblings alone
#[test]
fn test_remove_shouldOnlyDropNamedEntry() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, _) = common::sample_module(&db, "nautilus", "fr")?;
    module.add("de")?;

    module.remove("fr")?;

    assert_eq!(module.keys()?, vec!["de".to_string()]);
    assert!(matches!(module.remove("fr"), Err(StorageError::NotFound(_))));
    Ok(())
}
