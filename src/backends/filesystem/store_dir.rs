/*!
 * On-disk layout of one translation store and its pending-edit machinery.
 *
 * ```text
 * <store>/current             revision id, ASCII
 * <store>/revisions/00000003  immutable full content
 * <store>/pending/00000017    raw text of unit 17, not merged yet
 * <store>/index               fixed-width boundary table of `current`
 * <store>/lock                lease sentinel
 * ```
 *
 * Single units are read through the index without loading the revision
 * and written as pending files. `merge` folds the pending files into a new
 * revision. Unit ids are 1-based positions in the current revision; any
 * operation that would reorder units while edits are pending is refused.
 */

use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::{INDEX_FILE, Index, IndexReader};
use super::lock::{self, LockGuard};
use crate::codec::{ParsedStore, UnitCodec};
use crate::errors::{Result, StorageError};
use crate::file_utils::FileManager;
use crate::model::{Header, TranslationUnit};

pub const CURRENT_FILE: &str = "current";
pub const REVISIONS_DIR: &str = "revisions";
pub const PENDING_DIR: &str = "pending";

/// Handle on one store directory
#[derive(Clone)]
pub struct StoreDir {
    root: PathBuf,
    codec: Arc<dyn UnitCodec>,
    lease_secs: u64,
}

impl StoreDir {
    pub fn new(root: PathBuf, codec: Arc<dyn UnitCodec>, lease_secs: u64) -> Self {
        Self {
            root,
            codec,
            lease_secs,
        }
    }

    /// Create the directory skeleton if missing
    pub fn ensure_layout(&self) -> Result<()> {
        FileManager::ensure_dir(self.root.join(REVISIONS_DIR))?;
        FileManager::ensure_dir(self.root.join(PENDING_DIR))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn revision_path(&self, revision: u64) -> PathBuf {
        self.root.join(REVISIONS_DIR).join(format!("{:08}", revision))
    }

    pub fn pending_path(&self, id: usize) -> PathBuf {
        self.root.join(PENDING_DIR).join(format!("{:08}", id))
    }

    /// Id of the current revision; 0 before the first fill
    pub fn current_revision(&self) -> Result<u64> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(text) => text.trim().parse().map_err(|_| {
                StorageError::Codec(format!(
                    "malformed revision pointer in {:?}",
                    self.root
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Full content of the current revision, ignoring pending edits
    pub fn current_content(&self) -> Result<String> {
        match self.current_revision()? {
            0 => Ok(String::new()),
            revision => FileManager::read_to_string(self.revision_path(revision)),
        }
    }

    fn current_len(&self) -> Result<usize> {
        match self.current_revision()? {
            0 => Ok(0),
            revision => Ok(fs::metadata(self.revision_path(revision))?.len() as usize),
        }
    }

    /// Ids with a pending edit, ascending
    pub fn pending_ids(&self) -> Result<Vec<usize>> {
        let mut ids: Vec<usize> = FileManager::list_file_names(self.root.join(PENDING_DIR))?
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn has_pending(&self) -> Result<bool> {
        Ok(!self.pending_ids()?.is_empty())
    }

    /// Whether another holder currently owns the store lock
    pub fn is_locked(&self) -> Result<bool> {
        lock::is_locked(&self.root, self.lease_secs)
    }

    /// Rebuild the index from the current revision
    pub fn update_index(&self) -> Result<Index> {
        let content = self.current_content()?;
        let parsed = self.codec.parse_store(&content)?;
        let index = Index::from_boundaries(parsed.boundaries);
        FileManager::write_atomic(self.index_path(), &index.encode())?;
        debug!(
            "Rebuilt index of {:?}: {} units",
            self.root,
            index.unit_count()
        );
        Ok(index)
    }

    /// Load the whole index, rebuilding it if it is missing or does not describe `content_len`
    fn load_index(&self, content_len: usize) -> Result<Index> {
        let loaded = FileManager::read_to_string(self.index_path())
            .and_then(|text| Index::decode(&text))
            .and_then(|index| {
                if index.content_len() == content_len {
                    Ok(index)
                } else {
                    Err(StorageError::Codec("index is stale".to_string()))
                }
            });
        match loaded {
            Ok(index) => Ok(index),
            Err(e) if is_index_damage(&e) => {
                warn!("Index of {:?} unusable ({}), rebuilding", self.root, e);
                self.update_index()
            }
            Err(e) => Err(e),
        }
    }

    /// Number of units in the current revision
    pub fn unit_count(&self) -> Result<usize> {
        let len = self.current_len()?;
        Ok(self.load_index(len)?.unit_count())
    }

    /// `(start, end, stat)` of a unit, straight from the index file
    fn locate(&self, id: usize) -> Result<(usize, usize, u64)> {
        let content_len = self.current_len()?;
        let mut reader = IndexReader::open(&self.index_path())?;
        let count = reader.boundary_count();
        if count == 0 {
            return Err(StorageError::Codec("corrupt index: no boundaries".to_string()));
        }
        let (last, _) = reader.boundary(count - 1)?;
        if last != content_len {
            return Err(StorageError::Codec("index is stale".to_string()));
        }
        let units = count - 1;
        if id > units {
            return Err(StorageError::Range {
                id: id as i64,
                len: units,
            });
        }
        let (start, stat) = reader.boundary(id - 1)?;
        let (end, _) = reader.boundary(id)?;
        if start > end {
            return Err(StorageError::Codec("corrupt index: offsets decrease".to_string()));
        }
        Ok((start, end, stat))
    }

    fn read_revision_range(&self, start: usize, end: usize) -> Result<String> {
        let revision = self.current_revision()?;
        let mut file = File::open(self.revision_path(revision))?;
        file.seek(SeekFrom::Start(start as u64))?;
        let mut buf = vec![0u8; end - start];
        file.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|_| StorageError::Codec(format!("unit span {}..{} is not UTF-8", start, end)))
    }

    fn checked_id(&self, id: i64) -> Result<usize> {
        if id < 1 {
            return Err(StorageError::Range {
                id,
                len: self.unit_count().unwrap_or(0),
            });
        }
        Ok(id as usize)
    }

    /// Raw and parsed text of unit `id` read through the index
    fn read_indexed(&self, id: usize) -> Result<(String, TranslationUnit, u64)> {
        let (start, end, stat) = self.locate(id)?;
        let raw = self.read_revision_range(start, end)?;
        let unit = self.codec.decode_unit(&raw)?;
        Ok((raw, unit, stat))
    }

    /// Read unit `id` through the index, rebuilding a damaged index and retrying once
    fn read_indexed_with_recovery(&self, id: usize) -> Result<(String, TranslationUnit, u64)> {
        match self.read_indexed(id) {
            Err(e) if is_index_damage(&e) => {
                warn!("Index of {:?} unusable ({}), rebuilding", self.root, e);
                self.update_index()?;
                self.read_indexed(id)
            }
            other => other,
        }
    }

    fn read_pending(&self, id: usize) -> Result<Option<String>> {
        match fs::read_to_string(self.pending_path(id)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw text of unit `id` and its stat field; a pending edit wins
    pub fn get_raw(&self, id: i64) -> Result<(String, u64)> {
        let id = self.checked_id(id)?;
        if let Some(raw) = self.read_pending(id)? {
            return Ok((raw, 0));
        }
        let (raw, _, stat) = self.read_indexed_with_recovery(id)?;
        Ok((raw, stat))
    }

    /// Parsed unit `id` and its stat field
    pub fn get(&self, id: i64) -> Result<(TranslationUnit, u64)> {
        let checked = self.checked_id(id)?;
        debug!("Read unit {} of {:?}", id, self.root);
        if let Some(raw) = self.read_pending(checked)? {
            return Ok((self.codec.decode_unit(&raw)?, 0));
        }
        let (_, unit, stat) = self.read_indexed_with_recovery(checked)?;
        Ok((unit, stat))
    }

    /// Queue new raw text for unit `id`
    ///
    /// The text must survive a decode/encode round trip. A second edit to an
    /// id that already has one forces a merge first.
    pub fn set(&self, id: i64, raw: &str) -> Result<()> {
        self.codec.validate_unit(raw)?;
        let id = self.checked_id(id)?;

        let guard = LockGuard::acquire(&self.root, self.lease_secs)?;
        let units = self.unit_count()?;
        if id > units {
            return Err(StorageError::Range {
                id: id as i64,
                len: units,
            });
        }
        if self.pending_path(id).exists() {
            debug!("Unit {} of {:?} already pending, merging first", id, self.root);
            self.merge_held(&guard)?;
        }
        FileManager::write_atomic(self.pending_path(id), raw)?;
        debug!("Queued edit of unit {} in {:?}", id, self.root);
        Ok(())
    }

    /// Fold pending edits into a new revision
    ///
    /// Returns the new revision id, or `None` when nothing was pending.
    pub fn merge(&self) -> Result<Option<u64>> {
        let guard = LockGuard::acquire(&self.root, self.lease_secs)?;
        self.merge_held(&guard)
    }

    fn merge_held(&self, _guard: &LockGuard) -> Result<Option<u64>> {
        let ids = self.pending_ids()?;
        if ids.is_empty() {
            return Ok(None);
        }

        // Splice on offsets parsed from the content, not the index file
        let content = self.current_content()?;
        let current = self.codec.parse_store(&content)?;
        let index = self.load_index(content.len())?;
        if index.boundaries != current.boundaries {
            warn!("Index of {:?} does not match its revision, rebuilding", self.root);
            self.update_index()?;
        }
        let boundaries = current.boundaries;
        let units = boundaries.len() - 1;
        if let Some(bad) = ids.iter().find(|id| **id == 0 || **id > units) {
            return Err(StorageError::Range {
                id: *bad as i64,
                len: units,
            });
        }

        let mut merged = String::with_capacity(content.len());
        let mut cursor = 0;
        for (start, end) in collapse_ranges(&ids) {
            merged.push_str(&content[cursor..boundaries[start - 1]]);
            for id in start..end {
                merged.push_str(&FileManager::read_to_string(self.pending_path(id))?);
            }
            cursor = boundaries[end - 1];
        }
        merged.push_str(&content[cursor..]);

        let parsed = self.codec.parse_store(&merged)?;
        if parsed.units.len() != units {
            return Err(StorageError::Validation(format!(
                "merge of {:?} would change the unit count from {} to {}",
                self.root,
                units,
                parsed.units.len()
            )));
        }

        let revision = self.commit_revision(&merged, parsed)?;
        for id in &ids {
            match fs::remove_file(self.pending_path(*id)) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        info!(
            "Merged {} pending edits of {:?} into revision {}",
            ids.len(),
            self.root,
            revision
        );
        Ok(Some(revision))
    }

    /// Write `content` as the next revision, then its index, then the pointer
    fn commit_revision(&self, content: &str, parsed: ParsedStore) -> Result<u64> {
        let revision = self.current_revision()? + 1;
        FileManager::write_atomic(self.revision_path(revision), content)?;
        let index = Index::from_boundaries(parsed.boundaries);
        FileManager::write_atomic(self.index_path(), &index.encode())?;
        FileManager::write_atomic(self.root.join(CURRENT_FILE), &format!("{:08}\n", revision))?;
        Ok(revision)
    }

    /// Current content with pending edits merged in
    ///
    /// A nonblocking read fails with `WouldBlock` instead of merging.
    pub fn read_content(&self, nonblocking: bool) -> Result<String> {
        if self.has_pending()? {
            if nonblocking {
                return Err(StorageError::WouldBlock(format!(
                    "{:?} has pending edits",
                    self.root
                )));
            }
            self.merge()?;
        }
        self.current_content()
    }

    /// Header and units of the current revision with pending edits overlaid
    pub fn load(&self) -> Result<ParsedStore> {
        let mut parsed = self.codec.parse_store(&self.current_content()?)?;
        for id in self.pending_ids()? {
            if let Some(slot) = id.checked_sub(1).and_then(|i| parsed.units.get_mut(i)) {
                *slot = self.codec.decode_unit(&FileManager::read_to_string(self.pending_path(id))?)?;
            }
        }
        Ok(parsed)
    }

    /// Replace the whole content with a new revision
    ///
    /// Refused while edits are pending, since they address units by position.
    pub fn fill(&self, header: &Header, units: &[TranslationUnit]) -> Result<u64> {
        self.ensure_layout()?;
        let guard = LockGuard::acquire(&self.root, self.lease_secs)?;
        if self.has_pending()? {
            return Err(StorageError::Unsupported(format!(
                "replacing the units of {:?} while edits are pending; merge first",
                self.root
            )));
        }
        let content = self.codec.encode_store(header, units)?;
        let parsed = self.codec.parse_store(&content)?;
        if parsed.units != units || parsed.header != *header {
            return Err(StorageError::Validation(format!(
                "content for {:?} does not read back as the {} units given",
                self.root,
                units.len()
            )));
        }
        let revision = self.commit_revision(&content, parsed)?;
        drop(guard);
        info!(
            "Wrote revision {} of {:?} with {} units",
            revision,
            self.root,
            units.len()
        );
        Ok(revision)
    }
}

/// Index problems that a rebuild can fix
fn is_index_damage(e: &StorageError) -> bool {
    match e {
        StorageError::Codec(_) => true,
        StorageError::Io(io) => io.kind() == ErrorKind::NotFound,
        _ => false,
    }
}

/// Collapse ascending ids into maximal half-open runs `[start, end)`
pub fn collapse_ranges(ids: &[usize]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &id in ids {
        match ranges.last_mut() {
            Some((_, end)) if *end == id => *end = id + 1,
            _ => ranges.push((id, id + 1)),
        }
    }
    ranges
}
