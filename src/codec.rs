/*!
 * Unit text codec.
 *
 * Stores on disk and pending edits hold units as text blocks. A block is a
 * run of non-blank lines; blocks are separated by blank lines. The
 * canonical form written by [`PoCodec`] is:
 *
 * ```text
 * # translator comment
 * #. automatic comment
 * #: source/location.c:42
 * #, fuzzy, c-format
 * #_ visible comment
 * #| msgid comment
 * #~ obsolete line
 * #@ annotation-key: value
 * #> {"target":"...","date":"..."}
 * msgctxt "context"
 * msgid "%d file"
 * msgid_plural "%d files"
 * msgstr[0] "%d Datei"
 * msgstr[1] "%d Dateien"
 *
 * ```
 *
 * A store is its header block (`msgid ""` with `Key: Value` lines in the
 * `msgstr`) followed by the unit blocks. Continuation lines (a bare quoted
 * string) are accepted when decoding but never written.
 */

use std::collections::BTreeMap;

use crate::capability::TranslationStore;
use crate::errors::{Result, StorageError};
use crate::model::{CommentKind, Comments, Header, Suggestion, TranslationUnit};

const ANNOTATION_PREFIX: &str = "#@";
const SUGGESTION_PREFIX: &str = "#>";

/// Encode/decode contract between the engine and unit text
///
/// `decode_unit(encode_unit(u)) == u` must hold for every unit with at
/// least one `(source, target)` slot.
pub trait UnitCodec: Send + Sync {
    fn encode_unit(&self, unit: &TranslationUnit) -> Result<String>;

    fn decode_unit(&self, raw: &str) -> Result<TranslationUnit>;

    fn encode_header(&self, header: &Header) -> String;

    /// Split full store content into header, units and unit boundaries
    fn parse_store(&self, content: &str) -> Result<ParsedStore>;

    fn encode_store(&self, header: &Header, units: &[TranslationUnit]) -> Result<String> {
        let mut out = self.encode_header(header);
        for unit in units {
            out.push_str(&self.encode_unit(unit)?);
        }
        Ok(out)
    }

    /// Decode, re-encode and compare; content that does not survive is rejected
    fn validate_unit(&self, raw: &str) -> Result<TranslationUnit> {
        let unit = self.decode_unit(raw)?;
        let encoded = self.encode_unit(&unit)?;
        if encoded != raw {
            return Err(StorageError::Validation(
                "unit text does not survive an encode/decode round trip".to_string(),
            ));
        }
        Ok(unit)
    }
}

/// Result of parsing full store content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStore {
    pub header: Header,
    pub units: Vec<TranslationUnit>,
    /// Byte offset where each unit block starts, plus the content length
    pub boundaries: Vec<usize>,
}

/// Gettext-style line codec
#[derive(Debug, Clone, Copy, Default)]
pub struct PoCodec;

impl UnitCodec for PoCodec {
    fn encode_unit(&self, unit: &TranslationUnit) -> Result<String> {
        let mut out = String::new();
        for kind in CommentKind::ALL {
            for comment in unit.comments.get(kind) {
                push_line(&mut out, comment_prefix(kind), single_line(comment, "comment")?);
            }
        }
        for (key, value) in &unit.annotations {
            if key.contains(": ") {
                return Err(StorageError::Validation(format!(
                    "annotation key '{}' cannot be written as a comment line",
                    key.escape_debug()
                )));
            }
            single_line(key, "annotation key")?;
            single_line(value, "annotation value")?;
            push_line(&mut out, ANNOTATION_PREFIX, &format!("{}: {}", key, value));
        }
        for suggestion in &unit.suggestions {
            push_line(&mut out, SUGGESTION_PREFIX, &serde_json::to_string(suggestion)?);
        }

        if let Some(context) = &unit.context {
            push_keyword(&mut out, "msgctxt", context);
        }
        match unit.trans.as_slice() {
            [] => {
                push_keyword(&mut out, "msgid", "");
                push_keyword(&mut out, "msgstr", "");
            }
            [(source, target)] => {
                push_keyword(&mut out, "msgid", source);
                push_keyword(&mut out, "msgstr", target);
            }
            [(source, _), (plural, _), ..] => {
                push_keyword(&mut out, "msgid", source);
                push_keyword(&mut out, "msgid_plural", plural);
                for (i, (_, target)) in unit.trans.iter().enumerate() {
                    push_keyword(&mut out, &format!("msgstr[{}]", i), target);
                }
            }
        }
        out.push('\n');
        Ok(out)
    }

    fn decode_unit(&self, raw: &str) -> Result<TranslationUnit> {
        let blocks = split_blocks(raw);
        match blocks.as_slice() {
            [(start, end)] => parse_entry(&raw[*start..*end])?.into_unit(),
            [] => Err(StorageError::Codec("empty unit text".to_string())),
            more => Err(StorageError::Codec(format!(
                "expected one unit, found {} entries",
                more.len()
            ))),
        }
    }

    fn encode_header(&self, header: &Header) -> String {
        let mut out = String::new();
        push_keyword(&mut out, "msgid", "");
        push_keyword(&mut out, "msgstr", "");
        for (key, value) in header.iter() {
            out.push('"');
            out.push_str(&escape(&format!("{}: {}\n", key, value)));
            out.push_str("\"\n");
        }
        out.push('\n');
        out
    }

    fn parse_store(&self, content: &str) -> Result<ParsedStore> {
        let blocks = split_blocks(content);
        let mut parsed = ParsedStore::default();
        let mut unit_starts = Vec::with_capacity(blocks.len());

        for (i, (start, end)) in blocks.iter().enumerate() {
            let entry = parse_entry(&content[*start..*end])?;
            if i == 0 && entry.is_header() {
                parsed.header = entry.into_header();
                continue;
            }
            parsed.units.push(entry.into_unit()?);
            unit_starts.push(*start);
        }

        parsed.boundaries = unit_starts;
        parsed.boundaries.push(content.len());
        Ok(parsed)
    }
}

/// Replace a store's header and units with the content of PO text
///
/// Returns the number of units read.
pub fn read_po<S: TranslationStore + ?Sized>(text: &str, store: &S) -> Result<usize> {
    let parsed = PoCodec.parse_store(text)?;
    let count = parsed.units.len();
    store.set_header(parsed.header)?;
    store.fill(parsed.units)?;
    log::debug!("Read {} units from PO text into store {:?}", count, store.key());
    Ok(count)
}

/// Serialize a store's header and units as PO text
pub fn write_po<S: TranslationStore + ?Sized>(store: &S) -> Result<String> {
    PoCodec.encode_store(&store.header()?, &store.units()?)
}

fn comment_prefix(kind: CommentKind) -> &'static str {
    match kind {
        CommentKind::Translator => "#",
        CommentKind::Automatic => "#.",
        CommentKind::Source => "#:",
        CommentKind::Type => "#,",
        CommentKind::Visible => "#_",
        CommentKind::Msgid => "#|",
        CommentKind::Obsolete => "#~",
    }
}

/// Comment lines carry their text raw, so it must stay on one line
fn single_line<'a>(text: &'a str, what: &str) -> Result<&'a str> {
    if text.contains(['\n', '\r']) {
        return Err(StorageError::Validation(format!(
            "{} spans several lines: {:?}",
            what, text
        )));
    }
    Ok(text)
}

fn push_line(out: &mut String, prefix: &str, text: &str) {
    out.push_str(prefix);
    out.push(' ');
    out.push_str(text);
    out.push('\n');
}

fn push_keyword(out: &mut String, keyword: &str, value: &str) {
    out.push_str(keyword);
    out.push_str(" \"");
    out.push_str(&escape(value));
    out.push_str("\"\n");
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn unquote(text: &str, line_no: usize) -> Result<String> {
    let text = text.trim();
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| {
            StorageError::Codec(format!("line {}: expected a quoted string", line_no + 1))
        })?;
    Ok(unescape(inner))
}

/// `(start, end)` byte ranges of the non-blank line runs in `content`
///
/// `end` stops before the blank separator; trailing blank lines belong to
/// the gap, which is why callers derive spans from the next block's start.
fn split_blocks(content: &str) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    let mut current = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(start) = current.take() {
                blocks.push((start, offset));
            }
        } else if current.is_none() {
            current = Some(offset);
        }
        offset += line.len();
    }
    if let Some(start) = current {
        blocks.push((start, offset));
    }
    blocks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Msgid,
    MsgidPlural,
    Msgstr,
    MsgstrPlural(usize),
}

#[derive(Debug, Default)]
struct Entry {
    comments: Comments,
    annotations: BTreeMap<String, String>,
    suggestions: Vec<Suggestion>,
    context: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Option<String>,
    msgstr_plural: BTreeMap<usize, String>,
}

impl Entry {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Context => self.context.get_or_insert_with(String::new),
            Field::Msgid => self.msgid.get_or_insert_with(String::new),
            Field::MsgidPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Msgstr => self.msgstr.get_or_insert_with(String::new),
            Field::MsgstrPlural(i) => self.msgstr_plural.entry(i).or_default(),
        }
    }

    fn has_field(&self, field: Field) -> bool {
        match field {
            Field::Context => self.context.is_some(),
            Field::Msgid => self.msgid.is_some(),
            Field::MsgidPlural => self.msgid_plural.is_some(),
            Field::Msgstr => self.msgstr.is_some(),
            Field::MsgstrPlural(i) => self.msgstr_plural.contains_key(&i),
        }
    }

    fn is_header(&self) -> bool {
        self.msgid.as_deref() == Some("")
            && self.context.is_none()
            && self.msgid_plural.is_none()
    }

    fn into_header(self) -> Header {
        let mut header = Header::new();
        for line in self.msgstr.unwrap_or_default().split('\n') {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if !key.is_empty() {
                    header.set(key, value.strip_prefix(' ').unwrap_or(value));
                }
            }
        }
        header
    }

    fn into_unit(self) -> Result<TranslationUnit> {
        let source = self
            .msgid
            .ok_or_else(|| StorageError::Codec("entry has no msgid".to_string()))?;

        let trans = match self.msgid_plural {
            Some(plural) => {
                let slots = self
                    .msgstr_plural
                    .keys()
                    .next_back()
                    .map(|last| last + 1)
                    .unwrap_or(0)
                    .max(2);
                let mut targets = self.msgstr_plural;
                (0..slots)
                    .map(|i| {
                        let s = if i == 0 { source.clone() } else { plural.clone() };
                        (s, targets.remove(&i).unwrap_or_default())
                    })
                    .collect()
            }
            None => vec![(source, self.msgstr.unwrap_or_default())],
        };

        Ok(TranslationUnit {
            context: self.context,
            trans,
            comments: self.comments,
            annotations: self.annotations,
            suggestions: self.suggestions,
        })
    }
}

fn parse_comment(line: &str, entry: &mut Entry, line_no: usize) -> Result<()> {
    let prefix = match line.get(..2) {
        Some(p @ ("#." | "#:" | "#," | "#_" | "#|" | "#~" | "#@" | "#>")) => p,
        _ => "#",
    };
    let rest = &line[prefix.len()..];
    let text = rest.strip_prefix(' ').unwrap_or(rest);

    let kind = match prefix {
        "#." => CommentKind::Automatic,
        "#:" => CommentKind::Source,
        "#," => CommentKind::Type,
        "#_" => CommentKind::Visible,
        "#|" => CommentKind::Msgid,
        "#~" => CommentKind::Obsolete,
        ANNOTATION_PREFIX => {
            let (key, value) = text.split_once(": ").ok_or_else(|| {
                StorageError::Codec(format!("line {}: malformed annotation", line_no + 1))
            })?;
            entry.annotations.insert(key.to_string(), value.to_string());
            return Ok(());
        }
        SUGGESTION_PREFIX => {
            let suggestion: Suggestion = serde_json::from_str(text).map_err(|e| {
                StorageError::Codec(format!("line {}: malformed suggestion: {}", line_no + 1, e))
            })?;
            entry.suggestions.push(suggestion);
            return Ok(());
        }
        _ => CommentKind::Translator,
    };
    entry.comments.add(kind, text);
    Ok(())
}

fn parse_keyword(keyword: &str, line_no: usize) -> Result<Field> {
    let field = match keyword {
        "msgctxt" => Field::Context,
        "msgid" => Field::Msgid,
        "msgid_plural" => Field::MsgidPlural,
        "msgstr" => Field::Msgstr,
        other => {
            let index = other
                .strip_prefix("msgstr[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| {
                    StorageError::Codec(format!(
                        "line {}: unknown keyword '{}'",
                        line_no + 1,
                        other
                    ))
                })?;
            Field::MsgstrPlural(index)
        }
    };
    Ok(field)
}

fn parse_entry(text: &str) -> Result<Entry> {
    let mut entry = Entry::default();
    let mut last = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('#') {
            parse_comment(line, &mut entry, line_no)?;
            last = None;
            continue;
        }
        if line.trim_start().starts_with('"') {
            let field = last.ok_or_else(|| {
                StorageError::Codec(format!(
                    "line {}: continuation without a keyword",
                    line_no + 1
                ))
            })?;
            let value = unquote(line, line_no)?;
            entry.field_mut(field).push_str(&value);
            continue;
        }

        let (keyword, rest) = line.split_once(' ').ok_or_else(|| {
            StorageError::Codec(format!("line {}: expected keyword and string", line_no + 1))
        })?;
        let field = parse_keyword(keyword, line_no)?;
        if entry.has_field(field) {
            return Err(StorageError::Codec(format!(
                "line {}: duplicate '{}'",
                line_no + 1,
                keyword
            )));
        }
        let value = unquote(rest, line_no)?;
        entry.field_mut(field).push_str(&value);
        last = Some(field);
    }
    Ok(entry)
}
