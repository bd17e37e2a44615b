//! Deterministic offline provider for every text facet.
//!
//! Used as the default selection on first run and by the tests.  Answers
//! are derived from the word alone, so two runs over the same word produce
//! identical records.  It has no audio: pronunciation requests are declined.

use async_trait::async_trait;

use crate::audio::AudioCandidate;

use super::capability::{
    AudioProvider, DecompositionProvider, DefinitionProvider, ExamplesProvider,
    ExplanationProvider, PinyinProvider, Provider,
};
use super::error::{ProviderResult, Reply};
use super::types::{
    Definition, Example, Explanation, Pinyin, ProviderKind, StructuralDecomposition, Usage, Word,
};

pub struct DummyProvider {
    name: String,
}

impl DummyProvider {
    pub const NAME: &'static str = "dummy";

    pub fn new() -> Self {
        Self {
            name: Self::NAME.to_string(),
        }
    }

    /// Same behaviour under a different registry name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for DummyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Offline placeholder answers (testing)"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Dummy
    }
}

#[async_trait]
impl PinyinProvider for DummyProvider {
    async fn get_pinyin(&self, word: &Word) -> ProviderResult<Pinyin> {
        let syllables = vec!["zi4"; word.char_count()];
        Ok(Reply::Found(Pinyin::new(syllables.join(" "))))
    }
}

#[async_trait]
impl DefinitionProvider for DummyProvider {
    async fn get_definition(&self, word: &Word) -> ProviderResult<Definition> {
        Ok(Reply::Found(Definition {
            text: format!("placeholder definition of {word}"),
            part_of_speech: Some("noun".into()),
        }))
    }
}

#[async_trait]
impl DecompositionProvider for DummyProvider {
    async fn get_decomposition(&self, word: &Word) -> ProviderResult<StructuralDecomposition> {
        Ok(Reply::Found(StructuralDecomposition {
            components: word.as_str().chars().map(String::from).collect(),
            description: format!("{} character(s)", word.char_count()),
        }))
    }
}

#[async_trait]
impl ExamplesProvider for DummyProvider {
    async fn get_examples(
        &self,
        word: &Word,
        definition: Option<&Definition>,
    ) -> ProviderResult<Example> {
        // Breakdowns are only produced for single characters.
        let breakdown = word
            .is_single_char()
            .then(|| format!("{word}: the character itself"));
        let translation = definition.map(|d| format!("(sense: {})", d.text));

        let usages = (1..=2)
            .map(|i| Usage {
                sentence: format!("例句{i}：{word}。"),
                pinyin: None,
                translation: translation.clone(),
                breakdown: breakdown.clone(),
            })
            .collect();
        Ok(Reply::Found(Example { usages }))
    }
}

#[async_trait]
impl ExplanationProvider for DummyProvider {
    async fn get_explanation(&self, word: &Word) -> ProviderResult<Explanation> {
        Ok(Reply::Found(Explanation {
            text: format!("{word} has no explanation in offline mode."),
        }))
    }
}

#[async_trait]
impl AudioProvider for DummyProvider {
    async fn get_pronunciations(
        &self,
        _word: &Word,
        _pinyin: Option<&Pinyin>,
    ) -> ProviderResult<Vec<AudioCandidate>> {
        Ok(Reply::declined("the dummy provider has no audio"))
    }
}
