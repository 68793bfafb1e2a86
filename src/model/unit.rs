/*!
 * Translation units, their comments and suggestions.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flag that marks a unit as fuzzy
pub const FUZZY_FLAG: &str = "fuzzy";

/// The seven comment sequences a unit carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Written by translators
    Translator,
    /// Extracted from the source code for developers
    Automatic,
    /// Source locations
    Source,
    /// Type flags such as `fuzzy` or `c-format`
    Type,
    /// Comments visible to translators in the editor
    Visible,
    /// Obsolete message lines
    Obsolete,
    /// Comments embedded in the message id
    Msgid,
}

impl CommentKind {
    /// All kinds, in serialization order
    pub const ALL: [CommentKind; 7] = [
        CommentKind::Translator,
        CommentKind::Automatic,
        CommentKind::Source,
        CommentKind::Type,
        CommentKind::Visible,
        CommentKind::Msgid,
        CommentKind::Obsolete,
    ];
}

/// Comment sequences of one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comments {
    #[serde(default)]
    pub translator: Vec<String>,
    #[serde(default)]
    pub automatic: Vec<String>,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default, rename = "type")]
    pub type_flags: Vec<String>,
    #[serde(default)]
    pub visible: Vec<String>,
    #[serde(default)]
    pub obsolete: Vec<String>,
    #[serde(default)]
    pub msgid: Vec<String>,
}

impl Comments {
    /// Borrow the sequence for one kind
    pub fn get(&self, kind: CommentKind) -> &[String] {
        match kind {
            CommentKind::Translator => &self.translator,
            CommentKind::Automatic => &self.automatic,
            CommentKind::Source => &self.source,
            CommentKind::Type => &self.type_flags,
            CommentKind::Visible => &self.visible,
            CommentKind::Obsolete => &self.obsolete,
            CommentKind::Msgid => &self.msgid,
        }
    }

    /// Mutable access to the sequence for one kind
    pub fn get_mut(&mut self, kind: CommentKind) -> &mut Vec<String> {
        match kind {
            CommentKind::Translator => &mut self.translator,
            CommentKind::Automatic => &mut self.automatic,
            CommentKind::Source => &mut self.source,
            CommentKind::Type => &mut self.type_flags,
            CommentKind::Visible => &mut self.visible,
            CommentKind::Obsolete => &mut self.obsolete,
            CommentKind::Msgid => &mut self.msgid,
        }
    }

    /// Append a comment of the given kind
    pub fn add(&mut self, kind: CommentKind, comment: impl Into<String>) {
        self.get_mut(kind).push(comment.into());
    }

    pub fn is_empty(&self) -> bool {
        CommentKind::ALL.iter().all(|k| self.get(*k).is_empty())
    }
}

/// An alternate translation proposed for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Proposed target text
    pub target: String,
    /// Author's user name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Submission time
    pub date: DateTime<Utc>,
}

impl Suggestion {
    pub fn new(target: impl Into<String>, author: Option<String>) -> Self {
        Self {
            target: target.into(),
            author,
            date: Utc::now(),
        }
    }
}

/// One translatable message
///
/// `trans` holds `(source, target)` pairs: index 0 is the singular, later
/// indices are plural forms. Its length is expected to match the store
/// language's plural count but that is not enforced here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Disambiguating context (`msgctxt`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub trans: Vec<(String, String)>,
    #[serde(default)]
    pub comments: Comments,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl TranslationUnit {
    /// Construct a unit from `(source, target)` pairs
    pub fn new(trans: Vec<(String, String)>) -> Self {
        Self {
            trans,
            ..Default::default()
        }
    }

    /// Singular-only unit
    pub fn singular(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(vec![(source.into(), target.into())])
    }

    /// Singular source text, empty for a unit without slots
    pub fn source(&self) -> &str {
        self.trans.first().map(|(s, _)| s.as_str()).unwrap_or("")
    }

    /// Singular target text
    pub fn target(&self) -> &str {
        self.trans.first().map(|(_, t)| t.as_str()).unwrap_or("")
    }

    pub fn has_plural(&self) -> bool {
        self.trans.len() > 1
    }

    /// Whether a type comment carries the fuzzy flag
    pub fn is_fuzzy(&self) -> bool {
        self.comments
            .type_flags
            .iter()
            .any(|line| line.split(',').any(|flag| flag.trim() == FUZZY_FLAG))
    }

    /// Add or remove the fuzzy flag
    pub fn set_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            if !self.is_fuzzy() {
                self.comments.type_flags.push(FUZZY_FLAG.to_string());
            }
            return;
        }
        self.comments.type_flags = self
            .comments
            .type_flags
            .iter()
            .filter_map(|line| {
                let kept: Vec<&str> = line
                    .split(',')
                    .map(str::trim)
                    .filter(|flag| *flag != FUZZY_FLAG && !flag.is_empty())
                    .collect();
                (!kept.is_empty()).then(|| kept.join(", "))
            })
            .collect();
    }

    /// Every plural slot has a non-empty target
    pub fn is_translated(&self) -> bool {
        !self.trans.is_empty() && self.trans.iter().all(|(_, target)| !target.is_empty())
    }

    /// Whether any slot's source (or target) contains `needle`
    pub fn matches(&self, needle: &str, search_source: bool, search_target: bool) -> bool {
        self.trans.iter().any(|(source, target)| {
            (search_source && source.contains(needle)) || (search_target && target.contains(needle))
        })
    }

    pub fn add_suggestion(&mut self, suggestion: Suggestion) {
        self.suggestions.push(suggestion);
    }
}
