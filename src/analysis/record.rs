//! Inputs and outputs of one analysis run.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::audio::CachedAudio;
use crate::config::ProviderSelection;
use crate::provider::{
    Definition, Example, Explanation, Facet, ImageCandidate, Pinyin, ProviderError,
    StructuralDecomposition, Word,
};
use crate::registry::RegistryError;

// ---------------------------------------------------------------------------
// ProviderConfiguration
// ---------------------------------------------------------------------------

/// Facet → provider name for one run.  Facets without an entry are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfiguration {
    providers: BTreeMap<Facet, String>,
    /// Hand the definition to the examples provider (delays examples until
    /// the definition is known).
    pub examples_use_definition: bool,
    /// Hand the pinyin to the audio provider (delays audio until the pinyin
    /// is known; the pinyin also becomes part of the audio cache key).
    pub audio_use_pinyin: bool,
}

impl ProviderConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, facet: Facet, provider: impl Into<String>) -> Self {
        self.set(facet, provider);
        self
    }

    pub fn set(&mut self, facet: Facet, provider: impl Into<String>) {
        self.providers.insert(facet, provider.into());
    }

    pub fn clear(&mut self, facet: Facet) {
        self.providers.remove(&facet);
    }

    pub fn provider(&self, facet: Facet) -> Option<&str> {
        self.providers.get(&facet).map(String::as_str)
    }

    /// Configured facets in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Facet, &str)> {
        self.providers.iter().map(|(f, n)| (*f, n.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl From<&ProviderSelection> for ProviderConfiguration {
    fn from(selection: &ProviderSelection) -> Self {
        Self {
            providers: selection.to_map(),
            examples_use_definition: selection.examples_use_definition,
            audio_use_pinyin: selection.audio_use_pinyin,
        }
    }
}

// ---------------------------------------------------------------------------
// WordAnalysis
// ---------------------------------------------------------------------------

/// The assembled record for one word.  Absent facets are `None` / empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordAnalysis {
    pub word: Word,
    pub pinyin: Option<Pinyin>,
    pub definition: Option<Definition>,
    /// Escaped definition text with the selected images as thumbnails.
    pub definition_html: Option<String>,
    pub decomposition: Option<StructuralDecomposition>,
    pub examples: Option<Example>,
    pub explanation: Option<Explanation>,
    pub audio: Vec<CachedAudio>,
    pub images: Vec<ImageCandidate>,
}

impl WordAnalysis {
    pub fn empty(word: Word) -> Self {
        Self {
            word,
            pinyin: None,
            definition: None,
            definition_html: None,
            decomposition: None,
            examples: None,
            explanation: None,
            audio: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Facets that carry a value, in canonical order.
    pub fn present_facets(&self) -> Vec<Facet> {
        Facet::ALL
            .into_iter()
            .filter(|f| match f {
                Facet::Pinyin => self.pinyin.is_some(),
                Facet::Definition => self.definition.is_some(),
                Facet::Decomposition => self.decomposition.is_some(),
                Facet::Examples => self.examples.is_some(),
                Facet::Explanation => self.explanation.is_some(),
                Facet::Audio => !self.audio.is_empty(),
                Facet::Images => !self.images.is_empty(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// A facet whose provider failed fatally.
#[derive(Debug)]
pub struct FacetFailure {
    pub facet: Facet,
    pub provider: String,
    pub error: ProviderError,
}

impl fmt::Display for FacetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.facet, self.provider, self.error)
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A configured provider name is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{facet} provider {provider:?} failed: {source}")]
    Provider {
        facet: Facet,
        provider: String,
        #[source]
        source: ProviderError,
    },
}

impl From<FacetFailure> for AnalysisError {
    fn from(f: FacetFailure) -> Self {
        AnalysisError::Provider {
            facet: f.facet,
            provider: f.provider,
            source: f.error,
        }
    }
}

/// Everything a run produced: the record plus every fatal facet failure.
#[derive(Debug)]
pub struct AnalysisReport {
    pub analysis: WordAnalysis,
    /// In canonical facet order.
    pub failures: Vec<FacetFailure>,
}

impl AnalysisReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&FacetFailure> {
        self.failures.first()
    }

    /// The record, or the first fatal failure.
    pub fn into_result(self) -> Result<WordAnalysis, AnalysisError> {
        match self.failures.into_iter().next() {
            None => Ok(self.analysis),
            Some(failure) => Err(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_from_selection_skips_unset() {
        let mut selection = ProviderSelection::default();
        selection.set(Facet::Audio, Some("tts".into()));
        selection.set(Facet::Examples, None);
        let config = ProviderConfiguration::from(&selection);
        assert_eq!(config.provider(Facet::Audio), Some("tts"));
        assert_eq!(config.provider(Facet::Examples), None);
        assert_eq!(config.provider(Facet::Pinyin), Some("dummy"));
        assert!(!config.audio_use_pinyin);

        selection.audio_use_pinyin = true;
        assert!(ProviderConfiguration::from(&selection).audio_use_pinyin);
    }

    #[test]
    fn configuration_iterates_in_facet_order() {
        let config = ProviderConfiguration::new()
            .with(Facet::Audio, "tts")
            .with(Facet::Pinyin, "cedict");
        let facets: Vec<Facet> = config.iter().map(|(f, _)| f).collect();
        assert_eq!(facets, [Facet::Pinyin, Facet::Audio]);
    }

    #[test]
    fn report_surfaces_first_failure() {
        let report = AnalysisReport {
            analysis: WordAnalysis::empty(Word::new("学").unwrap()),
            failures: vec![
                FacetFailure {
                    facet: Facet::Definition,
                    provider: "a".into(),
                    error: ProviderError::EmptyResponse,
                },
                FacetFailure {
                    facet: Facet::Audio,
                    provider: "b".into(),
                    error: ProviderError::Timeout,
                },
            ],
        };
        assert!(!report.is_success());
        assert_eq!(report.first_failure().map(|f| f.facet), Some(Facet::Definition));
        match report.into_result() {
            Err(AnalysisError::Provider { facet, provider, .. }) => {
                assert_eq!(facet, Facet::Definition);
                assert_eq!(provider, "a");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn present_facets_tracks_values() {
        let mut a = WordAnalysis::empty(Word::new("学").unwrap());
        assert!(a.present_facets().is_empty());
        a.pinyin = Some(Pinyin::new("xue2"));
        assert_eq!(a.present_facets(), [Facet::Pinyin]);
    }
}
