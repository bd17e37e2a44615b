//! Dictionary-backed provider over pre-parsed `(word, pinyin, gloss)` entries.
//!
//! Parsing the dictionary export (CC-CEDICT, a CSV deck, …) happens
//! elsewhere; this provider only receives the parsed entries.  Pinyin in
//! numbered form is converted to tone marks on the way out.  A word missing
//! from the dictionary is a graceful decline, not an error.

use std::collections::HashMap;

use async_trait::async_trait;

use super::capability::{DefinitionProvider, PinyinProvider, Provider};
use super::error::{ProviderResult, Reply};
use super::types::{Definition, Pinyin, ProviderKind, Word};

/// One parsed dictionary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub word: String,
    /// As written in the source (numbered or marked).
    pub pinyin: String,
    pub gloss: String,
}

impl DictionaryEntry {
    pub fn new(word: impl Into<String>, pinyin: impl Into<String>, gloss: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            pinyin: pinyin.into(),
            gloss: gloss.into(),
        }
    }
}

/// What the dictionary knows about one word, already converted: marked
/// pinyin of the first reading and the glosses of every reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRecord {
    pub pinyin: Pinyin,
    /// `None` when every reading has an empty gloss.
    pub definition: Option<Definition>,
}

pub struct DictionaryProvider {
    name: String,
    description: String,
    entries: HashMap<String, Vec<DictionaryEntry>>,
}

impl DictionaryProvider {
    /// Build from parsed entries.  Several entries for one word (different
    /// readings) are kept in input order; the first one wins for pinyin.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        entries: impl IntoIterator<Item = DictionaryEntry>,
    ) -> Self {
        let mut map: HashMap<String, Vec<DictionaryEntry>> = HashMap::new();
        for entry in entries {
            map.entry(entry.word.trim().to_string()).or_default().push(entry);
        }
        Self {
            name: name.into(),
            description: description.into(),
            entries: map,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entries for `word`, if any.
    pub fn entries(&self, word: &Word) -> Option<&[DictionaryEntry]> {
        self.entries.get(word.as_str()).map(Vec::as_slice)
    }

    /// The converted record for `word`, if the dictionary has it.
    pub fn lookup(&self, word: &Word) -> Option<DictionaryRecord> {
        let entries = self.entries(word)?;
        let first = entries.first()?;
        let glosses: Vec<&str> = entries
            .iter()
            .map(|e| e.gloss.trim())
            .filter(|g| !g.is_empty())
            .collect();
        Some(DictionaryRecord {
            pinyin: Pinyin::new(&first.pinyin),
            definition: (!glosses.is_empty()).then(|| Definition::new(glosses.join("; "))),
        })
    }

    fn not_found(&self, word: &Word) -> String {
        format!("{word} is not in the {} dictionary", self.name)
    }
}

impl Provider for DictionaryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Dictionary
    }
}

#[async_trait]
impl PinyinProvider for DictionaryProvider {
    async fn get_pinyin(&self, word: &Word) -> ProviderResult<Pinyin> {
        Ok(match self.lookup(word) {
            Some(record) => Reply::Found(record.pinyin),
            None => Reply::declined(self.not_found(word)),
        })
    }
}

#[async_trait]
impl DefinitionProvider for DictionaryProvider {
    /// Glosses of all readings, joined with `"; "`.
    async fn get_definition(&self, word: &Word) -> ProviderResult<Definition> {
        Ok(match self.lookup(word) {
            Some(DictionaryRecord {
                definition: Some(definition),
                ..
            }) => Reply::Found(definition),
            Some(_) => Reply::declined(format!("{word} has no gloss")),
            None => Reply::declined(self.not_found(word)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> DictionaryProvider {
        DictionaryProvider::new(
            "cedict",
            "CC-CEDICT export",
            [
                DictionaryEntry::new("学习", "xue2 xi2", "to learn; to study"),
                DictionaryEntry::new("行", "xing2", "to walk"),
                DictionaryEntry::new("行", "hang2", "row; line"),
            ],
        )
    }

    fn word(s: &str) -> Word {
        Word::new(s).unwrap()
    }

    #[tokio::test]
    async fn numbered_pinyin_is_marked() {
        let reply = provider().get_pinyin(&word("学习")).await.unwrap();
        assert_eq!(reply, Reply::Found(Pinyin::new("xué xí")));
    }

    #[tokio::test]
    async fn unknown_word_is_declined() {
        let p = provider();
        assert!(matches!(
            p.get_pinyin(&word("电脑")).await.unwrap(),
            Reply::Declined { .. }
        ));
        assert!(matches!(
            p.get_definition(&word("电脑")).await.unwrap(),
            Reply::Declined { .. }
        ));
    }

    #[tokio::test]
    async fn multiple_readings_join_glosses() {
        let p = provider();
        let def = p.get_definition(&word("行")).await.unwrap().found().unwrap();
        assert_eq!(def.text, "to walk; row; line");
        let pinyin = p.get_pinyin(&word("行")).await.unwrap().found().unwrap();
        assert_eq!(pinyin.as_str(), "xíng");
    }

    #[test]
    fn lookup_counts_distinct_words() {
        let p = provider();
        assert_eq!(p.len(), 2);
        assert_eq!(p.entries(&word("行")).map(<[_]>::len), Some(2));
        assert!(p.lookup(&word("电脑")).is_none());
    }

    #[test]
    fn lookup_returns_converted_record() {
        let record = provider().lookup(&word("学习")).unwrap();
        assert_eq!(record.pinyin.as_str(), "xué xí");
        assert_eq!(record.definition.unwrap().text, "to learn; to study");
    }

    #[tokio::test]
    async fn blank_gloss_is_declined_but_pinyin_found() {
        let p = DictionaryProvider::new("d", "d", [DictionaryEntry::new("好", "hao3", "  ")]);
        let record = p.lookup(&word("好")).unwrap();
        assert!(record.definition.is_none());
        assert!(matches!(
            p.get_definition(&word("好")).await.unwrap(),
            Reply::Declined { .. }
        ));
        assert_eq!(p.get_pinyin(&word("好")).await.unwrap().found().unwrap().as_str(), "hǎo");
    }
}
