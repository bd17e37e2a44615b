//! Provider registry: facet → name → provider.
//!
//! Filled once at start-up, then only read.  Lookups perform no I/O and the
//! registry holds no per-word state, so it is shared as `Arc<ProviderRegistry>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::provider::{
    AudioProvider, ChatProvider, DecompositionProvider, DefinitionProvider, DummyProvider,
    ExamplesProvider, ExplanationProvider, Facet, ImageProvider, LocalAudioProvider,
    LocalImageProvider, PinyinProvider, ProviderInfo, RetryPolicy, SpeechProvider,
};

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no {facet} provider named {name:?} (available: {})", available.join(", "))]
    NotFound {
        facet: Facet,
        name: String,
        available: Vec<String>,
    },

    #[error("a {facet} provider named {name:?} is already registered")]
    DuplicateName { facet: Facet, name: String },
}

// ---------------------------------------------------------------------------
// FacetProvider
// ---------------------------------------------------------------------------

/// A provider registered for exactly one facet.
#[derive(Clone)]
pub enum FacetProvider {
    Pinyin(Arc<dyn PinyinProvider>),
    Definition(Arc<dyn DefinitionProvider>),
    Decomposition(Arc<dyn DecompositionProvider>),
    Examples(Arc<dyn ExamplesProvider>),
    Explanation(Arc<dyn ExplanationProvider>),
    Audio(Arc<dyn AudioProvider>),
    Images(Arc<dyn ImageProvider>),
}

impl FacetProvider {
    pub fn facet(&self) -> Facet {
        match self {
            FacetProvider::Pinyin(_) => Facet::Pinyin,
            FacetProvider::Definition(_) => Facet::Definition,
            FacetProvider::Decomposition(_) => Facet::Decomposition,
            FacetProvider::Examples(_) => Facet::Examples,
            FacetProvider::Explanation(_) => Facet::Explanation,
            FacetProvider::Audio(_) => Facet::Audio,
            FacetProvider::Images(_) => Facet::Images,
        }
    }

    pub fn info(&self) -> ProviderInfo {
        match self {
            FacetProvider::Pinyin(p) => p.info(),
            FacetProvider::Definition(p) => p.info(),
            FacetProvider::Decomposition(p) => p.info(),
            FacetProvider::Examples(p) => p.info(),
            FacetProvider::Explanation(p) => p.info(),
            FacetProvider::Audio(p) => p.info(),
            FacetProvider::Images(p) => p.info(),
        }
    }

    pub fn name(&self) -> String {
        self.info().name
    }
}

impl std::fmt::Debug for FacetProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FacetProvider({}:{})", self.facet(), self.name())
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<Facet, BTreeMap<String, FacetProvider>>,
}

/// Generates a typed getter that resolves and unwraps one facet variant.
macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $trait_name:ident) => {
        pub fn $fn_name(&self, name: &str) -> Result<Arc<dyn $trait_name>, RegistryError> {
            match self.resolve(Facet::$variant, name)? {
                FacetProvider::$variant(p) => Ok(Arc::clone(p)),
                _ => Err(self.not_found(Facet::$variant, name)),
            }
        }
    };
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own name for its facet.
    pub fn register(&mut self, provider: FacetProvider) -> Result<(), RegistryError> {
        let facet = provider.facet();
        let name = provider.name();
        let slot = self.providers.entry(facet).or_default();
        if slot.contains_key(&name) {
            return Err(RegistryError::DuplicateName { facet, name });
        }
        log::debug!("registered {facet} provider {name:?}");
        slot.insert(name, provider);
        Ok(())
    }

    /// Register one backend for every text facet it answers.
    pub fn register_text<P>(&mut self, provider: Arc<P>) -> Result<(), RegistryError>
    where
        P: PinyinProvider
            + DefinitionProvider
            + DecompositionProvider
            + ExamplesProvider
            + ExplanationProvider
            + 'static,
    {
        self.register(FacetProvider::Pinyin(provider.clone()))?;
        self.register(FacetProvider::Definition(provider.clone()))?;
        self.register(FacetProvider::Decomposition(provider.clone()))?;
        self.register(FacetProvider::Examples(provider.clone()))?;
        self.register(FacetProvider::Explanation(provider))
    }

    /// Look up `name` for `facet`.
    pub fn resolve(&self, facet: Facet, name: &str) -> Result<&FacetProvider, RegistryError> {
        self.providers
            .get(&facet)
            .and_then(|slot| slot.get(name))
            .ok_or_else(|| self.not_found(facet, name))
    }

    pub fn contains(&self, facet: Facet, name: &str) -> bool {
        self.resolve(facet, name).is_ok()
    }

    /// `(name, description, type)` of every provider for `facet`, by name.
    pub fn list(&self, facet: Facet) -> Vec<ProviderInfo> {
        self.providers
            .get(&facet)
            .map(|slot| slot.values().map(FacetProvider::info).collect())
            .unwrap_or_default()
    }

    fn not_found(&self, facet: Facet, name: &str) -> RegistryError {
        RegistryError::NotFound {
            facet,
            name: name.to_string(),
            available: self
                .providers
                .get(&facet)
                .map(|slot| slot.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    typed_getter!(pinyin, Pinyin, PinyinProvider);
    typed_getter!(definition, Definition, DefinitionProvider);
    typed_getter!(decomposition, Decomposition, DecompositionProvider);
    typed_getter!(examples, Examples, ExamplesProvider);
    typed_getter!(explanation, Explanation, ExplanationProvider);
    typed_getter!(audio, Audio, AudioProvider);
    typed_getter!(images, Images, ImageProvider);

    /// Every built-in backend, configured from `config`.
    ///
    /// The AI and TTS providers are always registered; they only contact
    /// their endpoints when selected.  Local providers need a directory.
    pub fn with_defaults(config: &AppConfig) -> Result<Self, RegistryError> {
        let retry = RetryPolicy::from_config(&config.retry);
        let mut registry = Self::new();

        let dummy = Arc::new(DummyProvider::new());
        registry.register_text(dummy.clone())?;
        registry.register(FacetProvider::Audio(dummy))?;

        registry.register_text(Arc::new(ChatProvider::from_config(&config.ai, retry.clone())))?;
        registry.register(FacetProvider::Audio(Arc::new(SpeechProvider::from_config(
            &config.tts,
            retry,
        ))))?;

        if let Some(dir) = &config.local.audio_dir {
            registry.register(FacetProvider::Audio(Arc::new(LocalAudioProvider::new(dir))))?;
        }
        if let Some(dir) = &config.local.image_dir {
            registry.register(FacetProvider::Images(Arc::new(LocalImageProvider::new(dir))))?;
        }
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
