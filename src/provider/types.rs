//! Value records exchanged between providers and the analysis service.
//!
//! Everything here is immutable once built and `Serialize` so a finished
//! [`crate::analysis::WordAnalysis`] can be written out as JSON.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::{has_tone_numbers, numbered_to_marked};

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

/// Rejected input for [`Word::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordError {
    #[error("word is empty")]
    Empty,
    #[error("word contains whitespace: {0:?}")]
    Whitespace(String),
}

/// The Chinese word being analysed.  Identity is the exact character sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(String);

impl Word {
    /// Build a word from user input.  Leading/trailing whitespace is trimmed;
    /// the remainder must be non-empty and contain no inner whitespace.
    pub fn new(text: impl AsRef<str>) -> Result<Self, WordError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(WordError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(WordError::Whitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_single_char(&self) -> bool {
        self.char_count() == 1
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Word {
    type Err = WordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Pinyin
// ---------------------------------------------------------------------------

/// Romanisation of a word, always stored tone-marked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pinyin(String);

impl Pinyin {
    /// Accept either tone-marked or numbered input; numbered syllables are
    /// converted before storing.
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim();
        if has_tone_numbers(text) {
            Self(numbered_to_marked(text))
        } else {
            Self(text.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Pinyin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Text facets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// Gloss text, e.g. `"to study; to learn"`.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
}

impl Definition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            part_of_speech: None,
        }
    }
}

/// One usage of the word in a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub sentence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Per-character breakdown of the sentence.  Only meaningful for
    /// single-character words; providers may always omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub usages: Vec<Usage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
}

/// Component breakdown of the written form (radicals, phonetic parts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralDecomposition {
    pub components: Vec<String>,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// An illustrative image offered by an image provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub mime_type: String,
    /// Local copy of the image.
    pub local_path: PathBuf,
}

impl fmt::Display for ImageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.uri.clone());
        match (&self.label, self.width, self.height) {
            (Some(label), Some(w), Some(h)) => write!(f, "{label} ({name}, {w}x{h})"),
            (Some(label), _, _) => write!(f, "{label} ({name})"),
            (None, Some(w), Some(h)) => write!(f, "{name} ({w}x{h})"),
            (None, _, _) => f.write_str(&name),
        }
    }
}

// ---------------------------------------------------------------------------
// Facet
// ---------------------------------------------------------------------------

/// One independent analysis dimension of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Pinyin,
    Definition,
    Decomposition,
    Examples,
    Explanation,
    Audio,
    Images,
}

impl Facet {
    /// Canonical order; failure reports and listings follow it.
    pub const ALL: [Facet; 7] = [
        Facet::Pinyin,
        Facet::Definition,
        Facet::Decomposition,
        Facet::Examples,
        Facet::Explanation,
        Facet::Audio,
        Facet::Images,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Pinyin => "pinyin",
            Facet::Definition => "definition",
            Facet::Decomposition => "decomposition",
            Facet::Examples => "examples",
            Facet::Explanation => "explanation",
            Facet::Audio => "audio",
            Facet::Images => "images",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facet::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown facet: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Provider metadata
// ---------------------------------------------------------------------------

/// Coarse backend category, shown in provider listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderKind {
    Ai,
    Dictionary,
    Local,
    Dummy,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Ai => "AI",
            ProviderKind::Dictionary => "DICTIONARY",
            ProviderKind::Local => "LOCAL",
            ProviderKind::Dummy => "DUMMY",
        })
    }
}

/// `(name, description, type)` triple used for discovery and help output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub description: String,
    pub kind: ProviderKind,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_is_trimmed_and_validated() {
        assert_eq!(Word::new(" 学习 ").unwrap().as_str(), "学习");
        assert_eq!(Word::new("   "), Err(WordError::Empty));
        assert!(matches!(Word::new("学 习"), Err(WordError::Whitespace(_))));
    }

    #[test]
    fn word_counts_characters_not_bytes() {
        let w = Word::new("学习").unwrap();
        assert_eq!(w.char_count(), 2);
        assert!(!w.is_single_char());
        assert!(Word::new("好").unwrap().is_single_char());
    }

    #[test]
    fn pinyin_converts_numbered_input() {
        assert_eq!(Pinyin::new("xue2 xi2").as_str(), "xué xí");
        assert_eq!(Pinyin::new("xuéxí").as_str(), "xuéxí");
    }

    #[test]
    fn facet_parses_case_insensitively() {
        assert_eq!("Audio".parse::<Facet>(), Ok(Facet::Audio));
        assert_eq!(" examples ".parse::<Facet>(), Ok(Facet::Examples));
        assert!("etymology".parse::<Facet>().is_err());
    }

    #[test]
    fn facet_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&Facet::Decomposition).unwrap(), "\"decomposition\"");
    }

    #[test]
    fn provider_kind_display() {
        assert_eq!(ProviderKind::Ai.to_string(), "AI");
        assert_eq!(ProviderKind::Dictionary.to_string(), "DICTIONARY");
    }
}
