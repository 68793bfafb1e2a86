/*!
 * Integration tests for the filesystem backend: pending edits, merges, locks and indexes
 */

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

use locstore::app_config::Config;
use locstore::backends::filesystem::FsDatabase;
use locstore::backends::filesystem::index::{INDEX_FILE, Index, RECORD_LEN};
use locstore::backends::filesystem::lock::{LOCK_FILE, Lease, LockGuard};
use locstore::backends::filesystem::store_dir::{PENDING_DIR, StoreDir};
use locstore::capability::{Database, Folder, Mapping, Node, TranslationStore};
use locstore::codec::{PoCodec, UnitCodec};
use locstore::errors::StorageError;
use locstore::model::{CommentKind, Header, TranslationUnit};
use crate::common;

/// Filesystem database with the sample catalog at `gnome/nautilus/fr`
fn sample_store() -> Result<(TempDir, FsDatabase, StoreDir)> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let db = FsDatabase::open(temp_dir.path().join("po"), &Config::default())?;
    common::sample_module(&db, "nautilus", "fr")?;
    let store = db.store_dir("gnome/nautilus/fr")?;
    Ok((temp_dir, db, store))
}

fn encoded(source: &str, target: &str) -> Result<String> {
    Ok(PoCodec.encode_unit(&TranslationUnit::singular(source, target))?)
}

/// Pending edits are visible to reads but leave the revision untouched
#[test]
fn test_set_shouldBeVisibleBeforeMerge() -> Result<()> {
    let (_temp_dir, db, store) = sample_store()?;
    let before = store.current_content()?;
    let revision = store.current_revision()?;

    store.set(4, &encoded("Quit", "Quitter")?)?;

    assert_eq!(store.get(4)?.0.target(), "Quitter");
    assert_eq!(store.pending_ids()?, vec![4]);
    assert_eq!(store.current_content()?, before);
    assert_eq!(store.current_revision()?, revision);

    let handle = match db.lookup("gnome/nautilus/fr")? {
        Node::Store(store) => store,
        _ => panic!("expected a store"),
    };
    assert_eq!(handle.units()?[3].target(), "Quitter");
    assert_eq!(handle.unit(3)?.target(), "Quitter");
    Ok(())
}

/// Merging splices only the edited units into a new revision
#[test]
fn test_merge_shouldReplaceOnlyEditedUnits() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    let before = PoCodec.parse_store(&store.current_content()?)?;
    let revision = store.current_revision()?;

    store.set(1, &encoded("Open", "Ouvrir…")?)?;
    store.set(2, &encoded("Edit", "Modifier")?)?;
    store.set(4, &encoded("Quit", "Quitter")?)?;
    let merged = store.merge()?;

    assert_eq!(merged, Some(revision + 1));
    assert!(!store.has_pending()?);
    let after = PoCodec.parse_store(&store.current_content()?)?;
    assert_eq!(after.header, before.header);
    assert_eq!(after.units.len(), before.units.len());
    assert_eq!(after.units[0].target(), "Ouvrir…");
    assert_eq!(after.units[1].source(), "Edit");
    assert_eq!(after.units[2], before.units[2]);
    assert_eq!(after.units[3].target(), "Quitter");
    // The previous revision is kept
    assert!(store.revision_path(revision).exists());
    Ok(())
}

/// A merge with nothing pending changes nothing
#[test]
fn test_merge_withNothingPending_shouldBeNoOp() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    store.set(3, &encoded("Close", "Fermer")?)?;
    store.merge()?;
    let content = store.current_content()?;
    let revision = store.current_revision()?;

    assert_eq!(store.merge()?, None);

    assert_eq!(store.current_content()?, content);
    assert_eq!(store.current_revision()?, revision);
    Ok(())
}

/// A second edit to the same unit folds the first one in before queuing
#[test]
fn test_set_withPendingEditToSameId_shouldForceMerge() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    let revision = store.current_revision()?;

    store.set(4, &encoded("Quit", "Quitter")?)?;
    store.set(4, &encoded("Quit", "Sortir")?)?;

    assert_eq!(store.current_revision()?, revision + 1);
    assert!(store.current_content()?.contains("msgstr \"Quitter\""));
    assert_eq!(store.pending_ids()?, vec![4]);
    assert_eq!(store.get(4)?.0.target(), "Sortir");
    Ok(())
}

/// A fresh sentinel of unknown origin blocks writers but not readers
#[test]
fn test_lock_withEmptySentinel_shouldBlockWriters() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    store.set(1, &encoded("Open", "Ouvrir…")?)?;
    common::create_test_file(store.root(), LOCK_FILE, "")?;

    assert!(store.is_locked()?);
    assert!(matches!(
        store.set(2, &encoded("File", "Fichier")?),
        Err(StorageError::LockConflict { .. })
    ));
    assert!(matches!(store.merge(), Err(StorageError::LockConflict { .. })));
    assert_eq!(store.get(1)?.0.target(), "Ouvrir…");
    assert_eq!(store.get(3)?.0.target(), "Fermer");

    fs::remove_file(store.root().join(LOCK_FILE))?;
    assert!(store.merge()?.is_some());
    Ok(())
}

/// Holding the lock excludes a second holder until it is dropped
#[test]
fn test_lockGuard_whileHeld_shouldExcludeMerges() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    store.set(1, &encoded("Open", "Ouvrir…")?)?;

    let guard = LockGuard::acquire(store.root(), 60)?;
    let err = store.merge().unwrap_err();
    assert!(err.is_transient());
    drop(guard);

    assert!(store.merge()?.is_some());
    Ok(())
}

/// An expired lease left by a crashed writer is taken over
#[test]
fn test_lock_withExpiredLease_shouldBeTakenOver() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    let now = chrono::Utc::now();
    let lease = Lease {
        holder: "crashed".to_string(),
        acquired_at: now - chrono::Duration::seconds(3600),
        expires_at: now - chrono::Duration::seconds(60),
    };
    common::create_test_file(store.root(), LOCK_FILE, &serde_json::to_string(&lease)?)?;

    store.set(2, &encoded("File", "Fichier")?)?;

    assert!(!store.root().join(LOCK_FILE).exists());
    Ok(())
}

/// The index has one 32-byte record per boundary plus a header, matching the content
#[test]
fn test_index_afterMerge_shouldDescribeCurrentRevision() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    store.set(2, &encoded("A much longer replacement source", "Cible")?)?;
    store.merge()?;

    let text = fs::read_to_string(store.root().join(INDEX_FILE))?;
    let index = Index::decode(&text)?;
    let content = store.current_content()?;
    let parsed = PoCodec.parse_store(&content)?;

    assert_eq!(text.len(), RECORD_LEN * (parsed.units.len() + 2));
    assert_eq!(index.boundaries, parsed.boundaries);
    assert_eq!(index.content_len(), content.len());
    for id in 1..=parsed.units.len() {
        let (start, end) = index.span(id).unwrap_or_default();
        assert_eq!(PoCodec.decode_unit(&content[start..end])?, parsed.units[id - 1]);
    }
    Ok(())
}

/// A damaged or missing index is rebuilt on the next read
#[test]
fn test_get_withCorruptIndex_shouldRebuildAndSucceed() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    let expected = store.get(3)?.0;

    fs::write(store.index_path(), "garbage")?;
    assert_eq!(store.get(3)?.0, expected);
    assert!(Index::decode(&fs::read_to_string(store.index_path())?).is_ok());

    fs::remove_file(store.index_path())?;
    assert_eq!(store.unit_count()?, 4);
    assert_eq!(store.get(3)?.0, expected);

    // Offsets of another revision
    let mut wrong = Index::decode(&fs::read_to_string(store.index_path())?)?;
    for boundary in wrong.boundaries.iter_mut() {
        *boundary += 7;
    }
    fs::write(store.index_path(), wrong.encode())?;
    assert_eq!(store.get(3)?.0, expected);
    Ok(())
}

/// Merges splice on the revision's own offsets even when the index is damaged
#[test]
fn test_merge_withCorruptInteriorOffset_shouldRebuildAndSucceed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = StoreDir::new(temp_dir.path().join("store"), std::sync::Arc::new(PoCodec), 300);
    store.fill(
        &Header::new(),
        &[
            TranslationUnit::singular("Open", "Öffnen"),
            TranslationUnit::singular("Quit", ""),
        ],
    )?;

    // Point the second unit's start into the middle of a two-byte character
    let content = store.current_content()?;
    let inside = content.find('Ö').map(|at| at + 1).expect("umlaut in content");
    assert!(!content.is_char_boundary(inside));
    let mut wrong = Index::decode(&fs::read_to_string(store.index_path())?)?;
    wrong.boundaries[1] = inside;
    fs::write(store.index_path(), wrong.encode())?;

    store.set(2, &encoded("Quit", "Beenden")?)?;
    store.merge()?;

    let units = store.load()?.units;
    assert_eq!(units[0].target(), "Öffnen");
    assert_eq!(units[1].target(), "Beenden");
    let index = Index::decode(&fs::read_to_string(store.index_path())?)?;
    assert_eq!(index.boundaries, PoCodec.parse_store(&store.current_content()?)?.boundaries);

    // Reads recover from the same damage
    let mut wrong = index.clone();
    wrong.boundaries[1] = store.current_content()?.find('Ö').map(|at| at + 1).expect("umlaut");
    fs::write(store.index_path(), wrong.encode())?;
    assert_eq!(store.get(1)?.0.target(), "Öffnen");
    Ok(())
}

/// Filling refuses units whose text would not read back as given
#[test]
fn test_fill_withUnitsThatDoNotReadBack_shouldBeRejected() -> Result<()> {
    let (_temp_dir, db, store) = sample_store()?;
    let revision = store.current_revision()?;
    let handle = match db.lookup("gnome/nautilus/fr")? {
        Node::Store(store) => store,
        _ => panic!("expected a store"),
    };

    let mut injected = TranslationUnit::singular("Hello", "");
    injected
        .comments
        .add(CommentKind::Translator, "x\nmsgid \"A\"\nmsgstr \"\"\n\n#");
    assert!(matches!(handle.fill(vec![injected]), Err(StorageError::Validation(_))));

    let empty = TranslationUnit::new(Vec::new());
    let err = handle.fill(vec![TranslationUnit::singular("Hello", ""), empty]);
    assert!(matches!(err, Err(StorageError::Validation(_))));

    assert_eq!(store.current_revision()?, revision);
    assert_eq!(handle.len()?, 4);
    Ok(())
}

/// Keys that would leave the folder layout are refused
#[test]
fn test_pathSegments_withParentReference_shouldBeRefused() -> Result<()> {
    let (temp_dir, db, _) = sample_store()?;
    fs::create_dir_all(temp_dir.path().join("po").join("outside"))?;

    let root = db.root();
    assert!(matches!(root.subfolders().get(".."), Err(StorageError::Validation(_))));
    assert!(matches!(root.modules().get(".."), Err(StorageError::Validation(_))));
    assert!(matches!(root.subfolders().remove(".."), Err(StorageError::Validation(_))));
    assert!(matches!(db.store_dir("../../gnome/nautilus/fr"), Err(StorageError::Validation(_))));
    assert!(matches!(db.store_dir("gnome/../fr"), Err(StorageError::Validation(_))));
    assert!(matches!(db.lookup("gnome/.."), Err(StorageError::Validation(_))));

    assert!(temp_dir.path().join("po").join("folders").join("gnome").is_dir());
    assert!(temp_dir.path().join("po").join("outside").is_dir());
    Ok(())
}

/// Nonblocking content reads refuse to merge; blocking ones merge first
#[test]
fn test_readContent_withPendingEdits_shouldBlockOrMerge() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;
    store.set(4, &encoded("Quit", "Quitter")?)?;

    let err = store.read_content(true).unwrap_err();
    assert!(matches!(err, StorageError::WouldBlock(_)));
    assert!(store.has_pending()?);

    let content = store.read_content(false)?;
    assert!(content.contains("msgstr \"Quitter\""));
    assert!(!store.has_pending()?);
    assert_eq!(store.read_content(true)?, content);
    Ok(())
}

/// Whole-store replacement is refused while edits are pending
#[test]
fn test_fill_withPendingEdits_shouldBeUnsupported() -> Result<()> {
    let (_temp_dir, db, store) = sample_store()?;
    store.set(1, &encoded("Open", "Ouvrir…")?)?;

    let handle = match db.lookup("gnome/nautilus/fr")? {
        Node::Store(store) => store,
        _ => panic!("expected a store"),
    };
    let result = handle.fill(vec![TranslationUnit::singular("New", "Nouveau")]);
    assert!(matches!(result, Err(StorageError::Unsupported(_))));

    handle.save()?;
    handle.fill(vec![TranslationUnit::singular("New", "Nouveau")])?;
    assert_eq!(handle.len()?, 1);
    Ok(())
}

/// Ids are 1-based and bounded by the current unit count
#[test]
fn test_ids_outsideStore_shouldFailWithRange() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;

    assert!(matches!(store.get(0), Err(StorageError::Range { id: 0, .. })));
    assert!(matches!(store.get(-3), Err(StorageError::Range { .. })));
    assert!(matches!(store.get(5), Err(StorageError::Range { id: 5, len: 4 })));
    assert!(matches!(
        store.set(5, &encoded("Extra", "")?),
        Err(StorageError::Range { id: 5, len: 4 })
    ));
    assert!(!store.has_pending()?);
    Ok(())
}

/// Unit text must be canonical and hold exactly one entry
#[test]
fn test_set_withNonCanonicalText_shouldBeRejected() -> Result<()> {
    let (_temp_dir, _db, store) = sample_store()?;

    let sloppy = "msgid \"\"\n\"Quit\"\nmsgstr \"Quitter\"\n\n";
    assert!(matches!(store.set(4, sloppy), Err(StorageError::Validation(_))));

    let two = format!("{}{}", encoded("A", "a")?, encoded("B", "b")?);
    assert!(store.set(4, &two).is_err());
    assert!(!store.root().join(PENDING_DIR).join("00000004").exists());
    Ok(())
}

/// An empty store has no units and a single boundary
#[test]
fn test_emptyStore_shouldHaveNoUnits() -> Result<()> {
    let (_temp_dir, db, _) = sample_store()?;
    let module = match db.lookup("gnome/nautilus")? {
        Node::Module(module) => module,
        _ => panic!("expected a module"),
    };
    module.add("de")?;
    let store = db.store_dir("gnome/nautilus/de")?;

    assert_eq!(store.current_revision()?, 0);
    assert_eq!(store.unit_count()?, 0);
    assert!(matches!(store.get(1), Err(StorageError::Range { id: 1, len: 0 })));
    Ok(())
}

/// Opening a missing directory honours `create_missing`
#[test]
fn test_open_withMissingRoot_shouldFollowConfig() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = Config::default();
    config.filesystem.create_missing = false;

    let err = FsDatabase::open(temp_dir.path().join("absent"), &config).err();
    assert!(matches!(err, Some(StorageError::NotFound(_))));

    config.filesystem.create_missing = true;
    let db = FsDatabase::open(temp_dir.path().join("absent"), &config)?;
    assert!(db.path().is_dir());
    Ok(())
}
