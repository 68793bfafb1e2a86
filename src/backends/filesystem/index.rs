/*!
 * Fixed-width offset index of a store revision.
 *
 * Every record is 32 bytes, so record `n` lives at byte `32 * n` and a
 * single unit can be located with two seeks. Record 0 is the header,
 * `%010d` boundary count padded with 21 spaces. Records `1..=N+1` are
 * `%010d %020d`: a byte offset into the revision and a reserved per-unit
 * stat field, currently always zero.
 */

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::errors::{Result, StorageError};

pub const INDEX_FILE: &str = "index";
pub const RECORD_LEN: usize = 32;

/// Boundaries of the unit blocks of one revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    /// Start of every unit, then the content length
    pub boundaries: Vec<usize>,
    /// Reserved stat field per boundary
    pub stats: Vec<u64>,
}

impl Index {
    pub fn from_boundaries(boundaries: Vec<usize>) -> Self {
        let stats = vec![0; boundaries.len()];
        Self { boundaries, stats }
    }

    pub fn unit_count(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Final boundary, the length of the indexed content
    pub fn content_len(&self) -> usize {
        self.boundaries.last().copied().unwrap_or(0)
    }

    /// Byte span of a 1-based unit id
    pub fn span(&self, id: usize) -> Option<(usize, usize)> {
        if id == 0 || id > self.unit_count() {
            return None;
        }
        Some((self.boundaries[id - 1], self.boundaries[id]))
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(RECORD_LEN * (self.boundaries.len() + 1));
        out.push_str(&format!("{:010}{:21}\n", self.boundaries.len(), ""));
        for (offset, stat) in self.boundaries.iter().zip(&self.stats) {
            out.push_str(&format!("{:010} {:020}\n", offset, stat));
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() < RECORD_LEN || bytes.len() % RECORD_LEN != 0 {
            return Err(corrupt("length is not a whole number of records"));
        }
        let count = parse_header(&bytes[..RECORD_LEN])?;
        if bytes.len() != RECORD_LEN * (count + 1) {
            return Err(corrupt("record count does not match header"));
        }

        let mut index = Index::default();
        for record in bytes[RECORD_LEN..].chunks(RECORD_LEN) {
            let (offset, stat) = parse_record(record)?;
            if index.boundaries.last().is_some_and(|prev| *prev > offset) {
                return Err(corrupt("offsets decrease"));
            }
            index.boundaries.push(offset);
            index.stats.push(stat);
        }
        Ok(index)
    }
}

/// Seeking reader over an index file
pub struct IndexReader {
    file: File,
    count: usize,
}

impl IndexReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; RECORD_LEN];
        read_exact(&mut file, &mut header)?;
        let count = parse_header(&header)?;
        Ok(Self { file, count })
    }

    /// Number of boundaries, `N + 1` for N units
    pub fn boundary_count(&self) -> usize {
        self.count
    }

    /// `(offset, stat)` of 0-based boundary `n`
    pub fn boundary(&mut self, n: usize) -> Result<(usize, u64)> {
        if n >= self.count {
            return Err(corrupt("boundary past the end of the index"));
        }
        let mut record = [0u8; RECORD_LEN];
        self.file
            .seek(SeekFrom::Start((RECORD_LEN * (n + 1)) as u64))?;
        read_exact(&mut self.file, &mut record)?;
        parse_record(&record)
    }
}

fn corrupt(reason: &str) -> StorageError {
    StorageError::Codec(format!("corrupt index: {}", reason))
}

fn read_exact(file: &mut File, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            corrupt("truncated")
        } else {
            e.into()
        }
    })
}

fn parse_digits(field: &[u8]) -> Result<u64> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(corrupt("expected digits"));
    }
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("number out of range"))
}

fn parse_header(record: &[u8]) -> Result<usize> {
    if record.len() != RECORD_LEN
        || record[RECORD_LEN - 1] != b'\n'
        || !record[10..RECORD_LEN - 1].iter().all(|b| *b == b' ')
    {
        return Err(corrupt("malformed header"));
    }
    let count = parse_digits(&record[..10])? as usize;
    if count == 0 {
        return Err(corrupt("no boundaries"));
    }
    Ok(count)
}

fn parse_record(record: &[u8]) -> Result<(usize, u64)> {
    if record.len() != RECORD_LEN || record[10] != b' ' || record[RECORD_LEN - 1] != b'\n' {
        return Err(corrupt("malformed record"));
    }
    let offset = parse_digits(&record[..10])? as usize;
    let stat = parse_digits(&record[11..RECORD_LEN - 1])?;
    Ok((offset, stat))
}
