/*!
 * Tests for PO import and export through translation stores
 */

use anyhow::Result;
use locstore::backends::memory::MemoryDatabase;
use locstore::capability::TranslationStore;
use locstore::codec::{PoCodec, UnitCodec, read_po, write_po};
use locstore::errors::StorageError;
use locstore::model::{CommentKind, Suggestion, TranslationUnit};
use crate::common;

/// Reading sample PO text fills header and units in order
#[test]
fn test_readPo_withSampleCatalog_shouldFillStore() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "nautilus", "fr")?;

    let header = store.header()?;
    assert_eq!(header.get("Content-Type"), Some("text/plain; charset=UTF-8"));
    assert_eq!(header.plural_forms().map(|(n, _)| n), Some(2));

    let units = store.units()?;
    assert_eq!(units.len(), 4);
    assert_eq!(units[0].comments.get(CommentKind::Source), ["src/window.c:12"]);
    assert!(units[1].has_plural());
    assert!(units[2].is_fuzzy());
    Ok(())
}

/// Canonical text survives import followed by export unchanged
#[test]
fn test_writePo_afterReadPo_shouldReproduceCanonicalText() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "nautilus", "fr")?;

    assert_eq!(write_po(store.as_ref())?, common::SAMPLE_PO);
    Ok(())
}

/// Annotations and suggestions are carried by unit text
#[test]
fn test_encodeUnit_withAnnotationsAndSuggestions_shouldRoundTrip() -> Result<()> {
    let mut unit = TranslationUnit::singular("Rename", "Renommer");
    unit.context = Some("menu".to_string());
    unit.annotations.insert("reviewed".to_string(), "yes".to_string());
    unit.add_suggestion(Suggestion::new("Renommer…", Some("marie".to_string())));

    let raw = PoCodec.encode_unit(&unit)?;
    let decoded = PoCodec.validate_unit(&raw)?;

    assert_eq!(decoded, unit);
    Ok(())
}

/// Comment lines cannot smuggle extra lines into the unit text
#[test]
fn test_encodeUnit_withMultiLineComment_shouldBeRejected() {
    let mut unit = TranslationUnit::singular("Hello", "Bonjour");
    unit.comments.add(CommentKind::Translator, "first line\nsecond line");
    assert!(matches!(PoCodec.encode_unit(&unit), Err(StorageError::Validation(_))));

    let mut unit = TranslationUnit::singular("Hello", "Bonjour");
    unit.comments.add(CommentKind::Automatic, "x\nmsgid \"A\"\nmsgstr \"\"\n\n#");
    assert!(matches!(PoCodec.encode_unit(&unit), Err(StorageError::Validation(_))));

    let mut unit = TranslationUnit::singular("Hello", "Bonjour");
    unit.annotations.insert("note".to_string(), "one\r\ntwo".to_string());
    assert!(matches!(PoCodec.encode_unit(&unit), Err(StorageError::Validation(_))));
}

/// Annotation keys with colons survive unless they would split differently
#[test]
fn test_encodeUnit_withColonsInAnnotationKeys_shouldRoundTripOrFail() -> Result<()> {
    let mut unit = TranslationUnit::singular("Hello", "Bonjour");
    unit.annotations.insert("review:status".to_string(), "done: twice".to_string());
    unit.annotations.insert("ends:".to_string(), "x".to_string());
    unit.comments.add(CommentKind::Translator, "  indented, with trailing space ");
    let raw = PoCodec.encode_unit(&unit)?;
    assert_eq!(PoCodec.decode_unit(&raw)?, unit);

    let mut ambiguous = TranslationUnit::singular("Hello", "Bonjour");
    ambiguous.annotations.insert("a: b".to_string(), "c".to_string());
    assert!(matches!(PoCodec.encode_unit(&ambiguous), Err(StorageError::Validation(_))));
    Ok(())
}

/// Text with a duplicated keyword is malformed
#[test]
fn test_decodeUnit_withDuplicateKeyword_shouldFail() {
    let raw = "msgid \"a\"\nmsgid \"b\"\nmsgstr \"\"\n\n";

    assert!(matches!(PoCodec.decode_unit(raw), Err(StorageError::Codec(_))));
}

/// Importing into a store replaces what was there
#[test]
fn test_readPo_twice_shouldReplaceUnits() -> Result<()> {
    let db = MemoryDatabase::new();
    let (_, store) = common::sample_module(&db, "gedit", "fr")?;

    let count = read_po("msgid \"Undo\"\nmsgstr \"Annuler\"\n\n", store.as_ref())?;

    assert_eq!(count, 1);
    assert_eq!(store.units()?, vec![TranslationUnit::singular("Undo", "Annuler")]);
    assert!(store.header()?.is_empty());
    Ok(())
}
