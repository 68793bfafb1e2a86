/*!
 * Tests for statistics aggregation
 */

use anyhow::Result;
use locstore::backends::memory::MemoryDatabase;
use locstore::capability::{Database, Folder, HaveStatistics, Mapping, TranslationStore};
use locstore::model::{Statistics, TranslationUnit};
use crate::common;

/// Store statistics classify each unit once
#[test]
fn test_storeStatistics_withSampleCatalog_shouldClassifyUnits() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "nautilus", "fr")?;

    let stats = store.statistics()?;

    assert_eq!(stats, Statistics::new(4, 2, 1));
    assert_eq!(stats.untranslated(), 1);
    Ok(())
}

/// Module, folder and database statistics are sums of their children
#[test]
fn test_statistics_acrossTree_shouldBeAdditive() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, fr) = common::sample_module(&db, "nautilus", "fr")?;
    let de = module.add("de")?;
    de.fill(vec![
        TranslationUnit::singular("Open", "Öffnen"),
        TranslationUnit::singular("Quit", ""),
    ])?;
    let (_, other) = common::sample_module(&db, "gedit", "lt")?;

    let mut expected = fr.statistics()?;
    expected.accum(&de.statistics()?);
    assert_eq!(module.statistics()?, expected);

    expected.accum(&other.statistics()?);
    let gnome = db.root().subfolders().get("gnome")?;
    assert_eq!(gnome.statistics()?, expected);
    assert_eq!(db.statistics()?, expected);
    assert_eq!(db.statistics()?.total, 10);
    Ok(())
}

/// The template carries no translations and is left out of the sums
#[test]
fn test_moduleStatistics_withTemplate_shouldIgnoreTemplate() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, store) = common::sample_module(&db, "totem", "fr")?;
    common::sample_template(module.as_ref())?;

    assert_eq!(module.statistics()?, store.statistics()?);
    Ok(())
}

/// Empty containers report all zeros
#[test]
fn test_statistics_withEmptyFolder_shouldBeZero() -> Result<()> {
    let db = MemoryDatabase::new();
    let folder = db.root().subfolders().add("kde")?;

    assert_eq!(folder.statistics()?, Statistics::default());
    assert_eq!(folder.statistics()?.translated_percent(), 0.0);
    Ok(())
}
