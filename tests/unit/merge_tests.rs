/*!
 * Tests for the template merger
 */

use anyhow::Result;
use locstore::backends::memory::MemoryDatabase;
use locstore::capability::{Module, TranslationStore};
use locstore::merge::SimpleMerger;
use locstore::model::TranslationUnit;
use crate::common;

/// Translated sources are adopted, everything else comes from the template
#[test]
fn test_merge_withNewTemplate_shouldAdoptExistingTranslations() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, store) = common::sample_module(&db, "nautilus", "fr")?;
    let template = common::sample_template(module.as_ref())?;

    SimpleMerger::new().merge(store.as_ref(), template.as_ref())?;

    let units = store.units()?;
    assert_eq!(units.len(), 4);
    assert_eq!(units[0].source(), "Open");
    assert_eq!(units[0].target(), "Ouvrir");
    assert_eq!(
        units[1].trans,
        vec![
            ("File".to_string(), "Fichier".to_string()),
            ("Files".to_string(), "Fichiers".to_string()),
        ]
    );
    // The fuzzy flag lived on the translation, not the template
    assert_eq!(units[2].target(), "Fermer");
    assert!(!units[2].is_fuzzy());
    assert_eq!(units[3].source(), "Save As");
    assert_eq!(units[3].target(), "");
    Ok(())
}

/// Sources dropped from the template disappear from the translation
#[test]
fn test_merge_withRemovedSource_shouldDropUnit() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, store) = common::sample_module(&db, "gedit", "fr")?;
    let template = module.add_template()?;
    template.fill(vec![TranslationUnit::singular("Quit", "")])?;

    SimpleMerger::new().merge(store.as_ref(), template.as_ref())?;

    let units = store.units()?;
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].source(), "Quit");
    Ok(())
}

/// An empty translation never overwrites the template's target
#[test]
fn test_mergedUnits_withEmptyTranslation_shouldKeepTemplateTarget() -> Result<()> {
    let db = MemoryDatabase::new();
    let (module, store) = common::sample_module(&db, "totem", "fr")?;
    let template = module.add_template()?;
    template.fill(vec![TranslationUnit::singular("Quit", "Quitter?")])?;

    let merged = SimpleMerger::new().merged_units(store.as_ref(), template.as_ref())?;

    assert_eq!(merged[0].target(), "Quitter?");
    // Nothing was written
    assert_eq!(store.len()?, 4);
    Ok(())
}
