//! One async trait per facet.
//!
//! Every backend implements [`Provider`] (metadata) plus the facet traits it
//! actually supports.  A single backend may implement several facets (the
//! AI provider answers five of them) and is then registered once per facet.
//!
//! Implementors must be `Send + Sync` so they can be shared as
//! `Arc<dyn …Provider>` and called from concurrently spawned tasks.  They
//! hold no per-word state.

use async_trait::async_trait;

use crate::audio::AudioCandidate;

use super::error::{ProviderResult, Reply};
use super::types::{
    Definition, Example, Explanation, ImageCandidate, Pinyin, ProviderInfo, ProviderKind,
    StructuralDecomposition, Word,
};

// ---------------------------------------------------------------------------
// Provider (metadata)
// ---------------------------------------------------------------------------

/// Identity shared by all facet traits.
pub trait Provider: Send + Sync {
    /// Stable lookup key; also a component of audio cache keys.
    fn name(&self) -> &str;

    /// Human-readable one-liner for help output.
    fn description(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new(self.name(), self.description(), self.kind())
    }
}

// ---------------------------------------------------------------------------
// Text facets
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PinyinProvider: Provider {
    async fn get_pinyin(&self, word: &Word) -> ProviderResult<Pinyin>;
}

#[async_trait]
pub trait DefinitionProvider: Provider {
    async fn get_definition(&self, word: &Word) -> ProviderResult<Definition>;
}

#[async_trait]
pub trait DecompositionProvider: Provider {
    async fn get_decomposition(&self, word: &Word) -> ProviderResult<StructuralDecomposition>;
}

#[async_trait]
pub trait ExamplesProvider: Provider {
    /// `definition`, when supplied, lets the backend pick examples for the
    /// intended sense of the word.
    async fn get_examples(
        &self,
        word: &Word,
        definition: Option<&Definition>,
    ) -> ProviderResult<Example>;
}

#[async_trait]
pub trait ExplanationProvider: Provider {
    async fn get_explanation(&self, word: &Word) -> ProviderResult<Explanation>;
}

// ---------------------------------------------------------------------------
// Media facets
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AudioProvider: Provider {
    /// All candidate pronunciations, best first.
    async fn get_pronunciations(
        &self,
        word: &Word,
        pinyin: Option<&Pinyin>,
    ) -> ProviderResult<Vec<AudioCandidate>>;

    /// Only the first candidate.  An empty candidate list is a decline.
    async fn get_pronunciation(
        &self,
        word: &Word,
        pinyin: Option<&Pinyin>,
    ) -> ProviderResult<AudioCandidate> {
        match self.get_pronunciations(word, pinyin).await? {
            Reply::Found(candidates) => Ok(candidates
                .into_iter()
                .next()
                .map(Reply::Found)
                .unwrap_or_else(|| Reply::declined("no pronunciation available"))),
            Reply::Declined { reason } => Ok(Reply::Declined { reason }),
        }
    }
}

#[async_trait]
pub trait ImageProvider: Provider {
    async fn get_images(&self, word: &Word) -> ProviderResult<Vec<ImageCandidate>>;
}
