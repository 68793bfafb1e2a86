/*!
 * Behaviour shared by every backend, checked against each of them
 */

use anyhow::Result;

use locstore::capability::{Database, Folder, Mapping, Module, ModuleInfo, Node, TranslationStore};
use locstore::codec::write_po;
use locstore::errors::StorageError;
use locstore::merge::SimpleMerger;
use locstore::model::{Statistics, TranslationUnit};
use locstore::search::SearchOptions;
use crate::common;

/// Run `check` on a fresh database of every backend
fn for_each_backend(check: impl Fn(&dyn Database) -> Result<()>) -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    for db in common::all_databases(&temp_dir)? {
        check(db.as_ref()).map_err(|e| e.context(format!("backend {}", db.kind())))?;
    }
    Ok(())
}

/// Keys are unique across the subfolders and modules of one folder
#[test]
fn test_folderKeys_shouldBeUniqueAcrossChildren() -> Result<()> {
    for_each_backend(|db| {
        let root = db.root();
        root.subfolders().add("gnome")?;
        root.modules().add("coreutils")?;

        assert!(matches!(root.modules().add("gnome"), Err(StorageError::KeyExists(_))));
        assert!(matches!(root.subfolders().add("coreutils"), Err(StorageError::KeyExists(_))));
        assert!(matches!(root.subfolders().add("gnome"), Err(StorageError::KeyExists(_))));
        assert!(root.subfolders().add("a/b").is_err());
        assert!(matches!(root.subfolders().get("kde"), Err(StorageError::NotFound(_))));
        assert_eq!(root.subfolders().keys()?, vec!["gnome".to_string()]);
        assert_eq!(root.modules().keys()?, vec!["coreutils".to_string()]);
        Ok(())
    })
}

/// Imported catalogs read back identically everywhere
#[test]
fn test_sampleCatalog_shouldReadBackIdentically() -> Result<()> {
    for_each_backend(|db| {
        let (_, store) = common::sample_module(db, "nautilus", "fr")?;

        assert_eq!(write_po(store.as_ref())?, common::SAMPLE_PO);
        assert_eq!(store.statistics()?, Statistics::new(4, 2, 1));
        assert_eq!(store.language().map(|l| l.key()).as_deref(), Some("fr"));
        Ok(())
    })
}

/// Paths resolve the same way on every backend
#[test]
fn test_lookup_shouldResolveStoresAndTemplates() -> Result<()> {
    for_each_backend(|db| {
        let (module, _) = common::sample_module(db, "nautilus", "fr")?;
        common::sample_template(module.as_ref())?;

        match db.lookup("gnome/nautilus/template")? {
            Node::Store(template) => assert_eq!(template.len()?, 4),
            _ => panic!("expected the template"),
        }
        match db.lookup("/gnome/nautilus/fr/")? {
            Node::Store(store) => assert_eq!(store.unit(0)?.target(), "Ouvrir"),
            _ => panic!("expected a store"),
        }
        assert!(matches!(db.lookup("gnome/nautilus/de"), Err(StorageError::NotFound(_))));
        Ok(())
    })
}

/// Merge, statistics and search agree across backends
#[test]
fn test_mergeThenSearch_shouldAgree() -> Result<()> {
    for_each_backend(|db| {
        let (module, store) = common::sample_module(db, "nautilus", "fr")?;
        let template = common::sample_template(module.as_ref())?;

        SimpleMerger::new().merge(store.as_ref(), template.as_ref())?;
        store.save()?;

        assert_eq!(store.len()?, 4);
        assert_eq!(module.statistics()?, Statistics::new(4, 3, 0));
        let found = db.find("Save", &SearchOptions::default())?;
        assert_eq!(found, vec![TranslationUnit::singular("Save As", "")]);
        let limited = db.find("e", &SearchOptions::source_only().with_limit(1))?;
        assert_eq!(limited.len(), 1);
        Ok(())
    })
}

/// Module metadata round-trips through every backend
#[test]
fn test_moduleInfo_shouldRoundTrip() -> Result<()> {
    for_each_backend(|db| {
        let module = db.root().modules().add("gtk")?;
        assert_eq!(module.info()?.name, "gtk");

        let info = ModuleInfo {
            name: "GTK".to_string(),
            description: Some("Widget toolkit".to_string()),
            checker: vec!["gnome".to_string(), "xml".to_string()],
        };
        module.set_info(info.clone())?;
        db.root().set_annotation("origin", serde_json::json!(["gnome", 1]))?;

        assert_eq!(db.root().modules().get("gtk")?.info()?, info);
        assert_eq!(db.root().annotations()?["origin"][1], 1);
        Ok(())
    })
}

/// Header edits keep the units
#[test]
fn test_setHeader_shouldKeepUnits() -> Result<()> {
    for_each_backend(|db| {
        let (_, store) = common::sample_module(db, "gedit", "lt")?;
        let mut header = store.header()?;
        header.set("Language", "lt");

        store.set_header(header.clone())?;

        assert_eq!(store.header()?, header);
        assert_eq!(store.len()?, 4);
        Ok(())
    })
}
