//! Word analysis service: single-facet calls and the concurrent aggregate.
//!
//! # Aggregate flow
//!
//! ```text
//! resolve every configured provider (unknown name → Err, nothing launched)
//!   └─▶ tokio::spawn one task per facet
//!         definition ──oneshot──▶ examples   (when examples_use_definition)
//!         pinyin     ──oneshot──▶ audio      (when audio_use_pinyin)
//!         audio      ──▶ AudioCache::ensure_with per candidate
//!   └─▶ await every handle (no sibling is cancelled)
//!   └─▶ spawn_blocking(selector) for multi-candidate audio / images
//!   └─▶ assemble WordAnalysis + failures in facet order
//! ```

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::audio::{AudioCache, AudioCandidate, AudioFetcher, CacheKey, CachedAudio};
use crate::provider::{
    AudioProvider, Definition, Example, Explanation, Facet, ImageCandidate, ImageProvider,
    Pinyin, ProviderError, ProviderResult, Reply, StructuralDecomposition, Word,
};
use crate::registry::{ProviderRegistry, RegistryError};
use crate::select::{CandidateSelector, SelectionOutcome};
use crate::text::compose_definition;

use super::record::{
    AnalysisError, AnalysisReport, FacetFailure, ProviderConfiguration, WordAnalysis,
};

// ---------------------------------------------------------------------------
// Task plumbing
// ---------------------------------------------------------------------------

/// The value one facet task produced.
enum FacetValue {
    Pinyin(Pinyin),
    Definition(Definition),
    Decomposition(StructuralDecomposition),
    Examples(Example),
    Explanation(Explanation),
    Audio(Vec<CachedAudio>),
    Images(Vec<ImageCandidate>),
}

type TaskOutput = ProviderResult<FacetValue>;

struct FacetTask {
    facet: Facet,
    provider: String,
    handle: JoinHandle<TaskOutput>,
}

fn found_clone<T: Clone>(result: &ProviderResult<T>) -> Option<T> {
    match result {
        Ok(Reply::Found(v)) => Some(v.clone()),
        _ => None,
    }
}

/// Value from an upstream facet, or `None` when it is not wired, absent or
/// its task died.
async fn upstream<T>(rx: Option<oneshot::Receiver<Option<T>>>) -> Option<T> {
    match rx {
        Some(rx) => rx.await.ok().flatten(),
        None => None,
    }
}

fn channel<T>(wired: bool) -> (Option<oneshot::Sender<T>>, Option<oneshot::Receiver<T>>) {
    if wired {
        let (tx, rx) = oneshot::channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    }
}

fn resolve<P: ?Sized>(
    name: Option<&str>,
    get: impl FnOnce(&str) -> Result<Arc<P>, RegistryError>,
) -> Result<Option<(String, Arc<P>)>, RegistryError> {
    name.map(|n| get(n).map(|p| (n.to_string(), p))).transpose()
}

fn provider_error(facet: Facet, provider: &str, source: ProviderError) -> AnalysisError {
    AnalysisError::Provider {
        facet,
        provider: provider.to_string(),
        source,
    }
}

async fn cache_candidate(
    cache: &AudioCache,
    fetcher: &AudioFetcher,
    word: &Word,
    pinyin: Option<&Pinyin>,
    candidate: AudioCandidate,
) -> Result<CachedAudio, ProviderError> {
    let key = CacheKey::new(
        &candidate.provider,
        word.as_str(),
        pinyin.map(Pinyin::as_str).unwrap_or(""),
        &candidate.source_id,
    );
    let path = cache
        .ensure_with(&key, || fetcher.materialize(&candidate.source))
        .await?;
    Ok(CachedAudio {
        provider: candidate.provider,
        source_id: candidate.source_id,
        label: candidate.label,
        path,
    })
}

async fn cache_candidates(
    cache: &AudioCache,
    fetcher: &AudioFetcher,
    word: &Word,
    pinyin: Option<&Pinyin>,
    candidates: Vec<AudioCandidate>,
) -> ProviderResult<Vec<CachedAudio>> {
    if candidates.is_empty() {
        return Ok(Reply::declined("no pronunciation available"));
    }
    let mut cached = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        cached.push(cache_candidate(cache, fetcher, word, pinyin, candidate).await?);
    }
    Ok(Reply::Found(cached))
}

/// Keep the items whose index is in `indices`, in original order.
fn pick<T>(items: Vec<T>, indices: &[usize]) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| indices.contains(&i).then_some(item))
        .collect()
}

// ---------------------------------------------------------------------------
// WordAnalysisService
// ---------------------------------------------------------------------------

pub struct WordAnalysisService {
    registry: Arc<ProviderRegistry>,
    cache: Arc<AudioCache>,
    fetcher: AudioFetcher,
    selector: Option<Arc<dyn CandidateSelector>>,
}

impl WordAnalysisService {
    pub fn new(registry: Arc<ProviderRegistry>, cache: Arc<AudioCache>) -> Self {
        Self {
            registry,
            cache,
            fetcher: AudioFetcher::default(),
            selector: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: AudioFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Ask a human when a provider returns several audio takes or images.
    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    // -- single-facet operations --------------------------------------------

    pub async fn get_pinyin(
        &self,
        word: &Word,
        provider: &str,
    ) -> Result<Reply<Pinyin>, AnalysisError> {
        let p = self.registry.pinyin(provider)?;
        p.get_pinyin(word)
            .await
            .map_err(|e| provider_error(Facet::Pinyin, provider, e))
    }

    pub async fn get_definition(
        &self,
        word: &Word,
        provider: &str,
    ) -> Result<Reply<Definition>, AnalysisError> {
        let p = self.registry.definition(provider)?;
        p.get_definition(word)
            .await
            .map_err(|e| provider_error(Facet::Definition, provider, e))
    }

    pub async fn get_decomposition(
        &self,
        word: &Word,
        provider: &str,
    ) -> Result<Reply<StructuralDecomposition>, AnalysisError> {
        let p = self.registry.decomposition(provider)?;
        p.get_decomposition(word)
            .await
            .map_err(|e| provider_error(Facet::Decomposition, provider, e))
    }

    pub async fn get_examples(
        &self,
        word: &Word,
        provider: &str,
        definition: Option<&Definition>,
    ) -> Result<Reply<Example>, AnalysisError> {
        let p = self.registry.examples(provider)?;
        p.get_examples(word, definition)
            .await
            .map_err(|e| provider_error(Facet::Examples, provider, e))
    }

    pub async fn get_explanation(
        &self,
        word: &Word,
        provider: &str,
    ) -> Result<Reply<Explanation>, AnalysisError> {
        let p = self.registry.explanation(provider)?;
        p.get_explanation(word)
            .await
            .map_err(|e| provider_error(Facet::Explanation, provider, e))
    }

    /// The provider's first pronunciation, cached.
    pub async fn get_pronunciation(
        &self,
        word: &Word,
        pinyin: Option<&Pinyin>,
        provider: &str,
    ) -> Result<Reply<CachedAudio>, AnalysisError> {
        let p = self.registry.audio(provider)?;
        let fail = |e: ProviderError| provider_error(Facet::Audio, provider, e);
        match p.get_pronunciation(word, pinyin).await.map_err(fail)? {
            Reply::Found(candidate) => {
                cache_candidate(&self.cache, &self.fetcher, word, pinyin, candidate)
                    .await
                    .map(Reply::Found)
                    .map_err(fail)
            }
            Reply::Declined { reason } => Ok(Reply::Declined { reason }),
        }
    }

    /// Every pronunciation the provider offers, cached, without selection.
    pub async fn get_pronunciations(
        &self,
        word: &Word,
        pinyin: Option<&Pinyin>,
        provider: &str,
    ) -> Result<Reply<Vec<CachedAudio>>, AnalysisError> {
        let p = self.registry.audio(provider)?;
        let fail = |e: ProviderError| provider_error(Facet::Audio, provider, e);
        match p.get_pronunciations(word, pinyin).await.map_err(fail)? {
            Reply::Found(candidates) => {
                cache_candidates(&self.cache, &self.fetcher, word, pinyin, candidates)
                    .await
                    .map_err(fail)
            }
            Reply::Declined { reason } => Ok(Reply::Declined { reason }),
        }
    }

    pub async fn get_images(
        &self,
        word: &Word,
        provider: &str,
    ) -> Result<Reply<Vec<ImageCandidate>>, AnalysisError> {
        let p = self.registry.images(provider)?;
        p.get_images(word)
            .await
            .map_err(|e| provider_error(Facet::Images, provider, e))
    }

    // -- aggregate ----------------------------------------------------------

    /// Run every configured facet concurrently and assemble the record.
    ///
    /// Returns `Err` only when a configured provider name is unknown.  Fatal
    /// provider failures are collected in [`AnalysisReport::failures`] while
    /// the other facets are still populated; declined facets are absent.
    pub async fn complete_analysis(
        &self,
        word: &Word,
        config: &ProviderConfiguration,
    ) -> Result<AnalysisReport, AnalysisError> {
        let registry = &self.registry;
        let pinyin = resolve(config.provider(Facet::Pinyin), |n| registry.pinyin(n))?;
        let definition = resolve(config.provider(Facet::Definition), |n| registry.definition(n))?;
        let decomposition =
            resolve(config.provider(Facet::Decomposition), |n| registry.decomposition(n))?;
        let examples = resolve(config.provider(Facet::Examples), |n| registry.examples(n))?;
        let explanation =
            resolve(config.provider(Facet::Explanation), |n| registry.explanation(n))?;
        let audio = resolve(config.provider(Facet::Audio), |n| registry.audio(n))?;
        let images = resolve(config.provider(Facet::Images), |n| registry.images(n))?;

        log::info!(
            "analysing {word}: {}",
            config
                .iter()
                .map(|(f, n)| format!("{f}={n}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (definition_tx, definition_rx) = channel::<Option<Definition>>(
            config.examples_use_definition && definition.is_some() && examples.is_some(),
        );
        let (pinyin_tx, pinyin_rx) = channel::<Option<Pinyin>>(
            config.audio_use_pinyin && pinyin.is_some() && audio.is_some(),
        );

        // Pushed in facet order so failures come out in facet order.
        let mut tasks: Vec<FacetTask> = Vec::new();

        if let Some((provider, p)) = pinyin {
            let word = word.clone();
            let handle = tokio::spawn(async move {
                let result = p.get_pinyin(&word).await;
                if let Some(tx) = pinyin_tx {
                    let _ = tx.send(found_clone(&result));
                }
                result.map(|r| r.map(FacetValue::Pinyin))
            });
            tasks.push(FacetTask { facet: Facet::Pinyin, provider, handle });
        }

        if let Some((provider, p)) = definition {
            let word = word.clone();
            let handle = tokio::spawn(async move {
                let result = p.get_definition(&word).await;
                if let Some(tx) = definition_tx {
                    let _ = tx.send(found_clone(&result));
                }
                result.map(|r| r.map(FacetValue::Definition))
            });
            tasks.push(FacetTask { facet: Facet::Definition, provider, handle });
        }

        if let Some((provider, p)) = decomposition {
            let word = word.clone();
            let handle = tokio::spawn(async move {
                p.get_decomposition(&word)
                    .await
                    .map(|r| r.map(FacetValue::Decomposition))
            });
            tasks.push(FacetTask { facet: Facet::Decomposition, provider, handle });
        }

        if let Some((provider, p)) = examples {
            let word = word.clone();
            let handle = tokio::spawn(async move {
                let definition = upstream(definition_rx).await;
                p.get_examples(&word, definition.as_ref())
                    .await
                    .map(|r| r.map(FacetValue::Examples))
            });
            tasks.push(FacetTask { facet: Facet::Examples, provider, handle });
        }

        if let Some((provider, p)) = explanation {
            let word = word.clone();
            let handle = tokio::spawn(async move {
                p.get_explanation(&word)
                    .await
                    .map(|r| r.map(FacetValue::Explanation))
            });
            tasks.push(FacetTask { facet: Facet::Explanation, provider, handle });
        }

        if let Some((provider, p)) = audio {
            let word = word.clone();
            let cache = Arc::clone(&self.cache);
            let fetcher = self.fetcher.clone();
            let handle = tokio::spawn(async move {
                let pinyin = upstream(pinyin_rx).await;
                audio_task(p, word, pinyin, cache, fetcher).await
            });
            tasks.push(FacetTask { facet: Facet::Audio, provider, handle });
        }

        if let Some((provider, p)) = images {
            let word = word.clone();
            let handle = tokio::spawn(images_task(p, word));
            tasks.push(FacetTask { facet: Facet::Images, provider, handle });
        }

        // Join everything; one failure never cancels a sibling.
        let mut analysis = WordAnalysis::empty(word.clone());
        let mut failures = Vec::new();
        for FacetTask { facet, provider, handle } in tasks {
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(ProviderError::Task(e.to_string())));
            match outcome {
                Ok(Reply::Found(value)) => {
                    log::debug!("{facet}: {provider} answered");
                    store(&mut analysis, value);
                }
                Ok(Reply::Declined { reason }) => {
                    log::info!("{facet}: {provider} has no answer ({reason}); facet left empty");
                }
                Err(error) => {
                    if error.is_exhausted_retry() {
                        log::error!("{facet}: {provider} exhausted its retries: {error}");
                    } else {
                        log::error!("{facet}: {provider} failed: {error}");
                    }
                    failures.push(FacetFailure { facet, provider, error });
                }
            }
        }

        if let Some(selector) = &self.selector {
            let audio = std::mem::take(&mut analysis.audio);
            analysis.audio = self.select_audio(selector, word, audio).await;
            let images = std::mem::take(&mut analysis.images);
            analysis.images = self.select_images(selector, word, images).await;
        }

        analysis.definition_html = analysis
            .definition
            .as_ref()
            .map(|d| compose_definition(&d.text, &analysis.images));

        if failures.is_empty() {
            log::info!("{word}: analysis complete ({} facets)", analysis.present_facets().len());
        } else {
            log::warn!("{word}: {} facet(s) failed", failures.len());
        }
        Ok(AnalysisReport { analysis, failures })
    }

    /// Aborted keeps every take: no human was there to drop any.
    async fn select_audio(
        &self,
        selector: &Arc<dyn CandidateSelector>,
        word: &Word,
        audio: Vec<CachedAudio>,
    ) -> Vec<CachedAudio> {
        if audio.len() < 2 {
            return audio;
        }
        let labels = audio.iter().map(ToString::to_string).collect();
        match ask(Arc::clone(selector), Facet::Audio, word, labels).await {
            SelectionOutcome::Confirmed(indices) => pick(audio, &indices),
            SelectionOutcome::Aborted => audio,
            SelectionOutcome::Skipped => Vec::new(),
        }
    }

    /// Images are decoration: only a confirmed choice keeps any.
    async fn select_images(
        &self,
        selector: &Arc<dyn CandidateSelector>,
        word: &Word,
        images: Vec<ImageCandidate>,
    ) -> Vec<ImageCandidate> {
        if images.len() < 2 {
            return images;
        }
        let labels = images.iter().map(ToString::to_string).collect();
        match ask(Arc::clone(selector), Facet::Images, word, labels).await {
            SelectionOutcome::Confirmed(indices) => pick(images, &indices),
            SelectionOutcome::Aborted | SelectionOutcome::Skipped => Vec::new(),
        }
    }
}

async fn audio_task(
    provider: Arc<dyn AudioProvider>,
    word: Word,
    pinyin: Option<Pinyin>,
    cache: Arc<AudioCache>,
    fetcher: AudioFetcher,
) -> TaskOutput {
    match provider.get_pronunciations(&word, pinyin.as_ref()).await? {
        Reply::Found(candidates) => {
            let cached =
                cache_candidates(&cache, &fetcher, &word, pinyin.as_ref(), candidates).await?;
            Ok(cached.map(FacetValue::Audio))
        }
        Reply::Declined { reason } => Ok(Reply::Declined { reason }),
    }
}

async fn images_task(provider: Arc<dyn ImageProvider>, word: Word) -> TaskOutput {
    match provider.get_images(&word).await? {
        Reply::Found(list) if list.is_empty() => Ok(Reply::declined("no images")),
        other => Ok(other.map(FacetValue::Images)),
    }
}

fn store(analysis: &mut WordAnalysis, value: FacetValue) {
    match value {
        FacetValue::Pinyin(v) => analysis.pinyin = Some(v),
        FacetValue::Definition(v) => analysis.definition = Some(v),
        FacetValue::Decomposition(v) => analysis.decomposition = Some(v),
        FacetValue::Examples(v) => analysis.examples = Some(v),
        FacetValue::Explanation(v) => analysis.explanation = Some(v),
        FacetValue::Audio(v) => analysis.audio = v,
        FacetValue::Images(v) => analysis.images = v,
    }
}

/// Run the blocking selector off the async runtime.
async fn ask(
    selector: Arc<dyn CandidateSelector>,
    facet: Facet,
    word: &Word,
    labels: Vec<String>,
) -> SelectionOutcome<usize> {
    let word = word.clone();
    let outcome = tokio::task::spawn_blocking(move || selector.select(facet, &word, &labels))
        .await
        .unwrap_or_else(|e| {
            log::warn!("{facet}: selector task failed ({e})");
            SelectionOutcome::Aborted
        });
    log::info!("{facet}: selection {}", outcome.label());
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use crate::audio::AudioSource;
    use crate::provider::{
        AudioProvider, DecompositionProvider, DefinitionProvider, DictionaryEntry,
        DictionaryProvider, DummyProvider, ExamplesProvider, ExplanationProvider, ImageProvider,
        PinyinProvider, Provider, ProviderKind, Usage,
    };
    use crate::registry::FacetProvider;

    // -- test doubles -------------------------------------------------------

    #[derive(Clone, Copy)]
    enum Behaviour {
        Answer,
        Decline,
        Fail,
        Panic,
    }

    /// Answers every facet the same way, after an optional delay.
    struct Scripted {
        name: String,
        behaviour: Behaviour,
        delay: Duration,
    }

    impl Scripted {
        fn new(name: &str, behaviour: Behaviour) -> Self {
            Self {
                name: name.into(),
                behaviour,
                delay: Duration::ZERO,
            }
        }

        fn slow(name: &str, millis: u64) -> Self {
            Self {
                delay: Duration::from_millis(millis),
                ..Self::new(name, Behaviour::Answer)
            }
        }

        async fn reply<T>(&self, value: T) -> ProviderResult<T> {
            tokio::time::sleep(self.delay).await;
            match self.behaviour {
                Behaviour::Answer => Ok(Reply::Found(value)),
                Behaviour::Decline => Ok(Reply::declined("content policy")),
                Behaviour::Fail => Err(ProviderError::Parse("garbled".into())),
                Behaviour::Panic => panic!("provider bug"),
            }
        }
    }

    impl Provider for Scripted {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "scripted"
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Dummy
        }
    }

    #[async_trait]
    impl PinyinProvider for Scripted {
        async fn get_pinyin(&self, _word: &Word) -> ProviderResult<Pinyin> {
            self.reply(Pinyin::new("xue2 xi2")).await
        }
    }

    #[async_trait]
    impl DefinitionProvider for Scripted {
        async fn get_definition(&self, _word: &Word) -> ProviderResult<Definition> {
            self.reply(Definition::new("to study")).await
        }
    }

    #[async_trait]
    impl DecompositionProvider for Scripted {
        async fn get_decomposition(&self, _word: &Word) -> ProviderResult<StructuralDecomposition> {
            self.reply(StructuralDecomposition {
                components: vec!["子".into()],
                description: "child".into(),
            })
            .await
        }
    }

    #[async_trait]
    impl ExamplesProvider for Scripted {
        async fn get_examples(
            &self,
            word: &Word,
            _definition: Option<&Definition>,
        ) -> ProviderResult<Example> {
            self.reply(Example {
                usages: vec![Usage {
                    sentence: format!("我们{word}。"),
                    pinyin: None,
                    translation: None,
                    breakdown: None,
                }],
            })
            .await
        }
    }

    #[async_trait]
    impl ExplanationProvider for Scripted {
        async fn get_explanation(&self, _word: &Word) -> ProviderResult<Explanation> {
            self.reply(Explanation { text: "etymology".into() }).await
        }
    }

    #[async_trait]
    impl AudioProvider for Scripted {
        async fn get_pronunciations(
            &self,
            _word: &Word,
            _pinyin: Option<&Pinyin>,
        ) -> ProviderResult<Vec<AudioCandidate>> {
            let takes = ["alloy", "nova"]
                .iter()
                .map(|v| {
                    AudioCandidate::new(
                        self.name.clone(),
                        AudioSource::Inline(format!("ID3 {v}").into_bytes()),
                        *v,
                        format!("voice {v}"),
                    )
                })
                .collect();
            self.reply(takes).await
        }
    }

    #[async_trait]
    impl ImageProvider for Scripted {
        async fn get_images(&self, _word: &Word) -> ProviderResult<Vec<ImageCandidate>> {
            let images = (1..=3)
                .map(|i| ImageCandidate {
                    uri: format!("https://img.example/{i}.png"),
                    thumbnail_uri: None,
                    label: None,
                    width: Some(64),
                    height: Some(64),
                    mime_type: "image/png".into(),
                    local_path: format!("/tmp/images/学习_{i}.png").into(),
                })
                .collect();
            self.reply(images).await
        }
    }

    /// Audio provider that records when it was called and with what pinyin.
    #[derive(Default)]
    struct Stamped {
        called_at: Mutex<Option<Instant>>,
        pinyin_seen: Mutex<Option<Option<String>>>,
    }

    impl Provider for Stamped {
        fn name(&self) -> &str {
            "stamped"
        }
        fn description(&self) -> &str {
            "records its call"
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Dummy
        }
    }

    #[async_trait]
    impl AudioProvider for Stamped {
        async fn get_pronunciations(
            &self,
            _word: &Word,
            pinyin: Option<&Pinyin>,
        ) -> ProviderResult<Vec<AudioCandidate>> {
            *self.called_at.lock().unwrap() = Some(Instant::now());
            *self.pinyin_seen.lock().unwrap() = Some(pinyin.map(|p| p.as_str().to_string()));
            Ok(Reply::Found(vec![AudioCandidate::new(
                "stamped",
                AudioSource::Inline(b"ID3 stamped".to_vec()),
                "only",
                "only take",
            )]))
        }
    }

    /// Points at a recording that is not on disk.
    struct MissingRecording;

    impl Provider for MissingRecording {
        fn name(&self) -> &str {
            "missing-recording"
        }
        fn description(&self) -> &str {
            "dangling file"
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Local
        }
    }

    #[async_trait]
    impl AudioProvider for MissingRecording {
        async fn get_pronunciations(
            &self,
            _word: &Word,
            _pinyin: Option<&Pinyin>,
        ) -> ProviderResult<Vec<AudioCandidate>> {
            Ok(Reply::Found(vec![AudioCandidate::new(
                "missing-recording",
                AudioSource::File("/nonexistent/hanzi-cards/gone.wav".into()),
                "gone.wav",
                "gone",
            )]))
        }
    }

    /// Returns a fixed outcome and remembers what it was shown.
    struct FixedSelector {
        outcome: SelectionOutcome<usize>,
        seen: Mutex<Vec<(Facet, usize)>>,
    }

    impl FixedSelector {
        fn new(outcome: SelectionOutcome<usize>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl CandidateSelector for FixedSelector {
        fn select(&self, facet: Facet, _word: &Word, labels: &[String]) -> SelectionOutcome<usize> {
            self.seen.lock().unwrap().push((facet, labels.len()));
            self.outcome.clone()
        }
    }

    // -- fixtures -----------------------------------------------------------

    fn register_scripted(r: &mut ProviderRegistry, p: Scripted) {
        let p = Arc::new(p);
        r.register_text(p.clone()).unwrap();
        r.register(FacetProvider::Audio(p.clone())).unwrap();
        r.register(FacetProvider::Images(p)).unwrap();
    }

    fn registry() -> ProviderRegistry {
        let mut r = ProviderRegistry::new();
        register_scripted(&mut r, Scripted::new("ok", Behaviour::Answer));
        register_scripted(&mut r, Scripted::new("declines", Behaviour::Decline));
        register_scripted(&mut r, Scripted::new("fails", Behaviour::Fail));
        register_scripted(&mut r, Scripted::new("panics", Behaviour::Panic));
        r.register_text(Arc::new(DummyProvider::new())).unwrap();
        let dict = Arc::new(DictionaryProvider::new(
            "cedict",
            "test dictionary",
            [DictionaryEntry::new("学习", "xue2 xi2", "to study")],
        ));
        r.register(FacetProvider::Definition(dict)).unwrap();
        r
    }

    fn service(cache_dir: &std::path::Path, registry: ProviderRegistry) -> WordAnalysisService {
        WordAnalysisService::new(Arc::new(registry), Arc::new(AudioCache::new(cache_dir, None)))
    }

    fn word() -> Word {
        Word::new("学习").unwrap()
    }

    fn all_facets(provider: &str) -> ProviderConfiguration {
        let mut c = ProviderConfiguration::new();
        for facet in Facet::ALL {
            c.set(facet, provider);
        }
        c
    }

    // -- aggregate ----------------------------------------------------------

    #[tokio::test]
    async fn every_facet_is_assembled() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let report = svc.complete_analysis(&word(), &all_facets("ok")).await.unwrap();
        assert!(report.is_success());
        let a = report.analysis;
        assert_eq!(a.present_facets(), Facet::ALL.to_vec());
        assert_eq!(a.pinyin.unwrap().as_str(), "xué xí");
        assert_eq!(a.audio.len(), 2);
        assert_eq!(a.images.len(), 3);
        assert!(a.definition_html.unwrap().starts_with("to study"));
    }

    #[tokio::test]
    async fn graceful_decline_leaves_facet_absent_and_run_successful() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let config = all_facets("ok").with(Facet::Definition, "declines");
        let report = svc.complete_analysis(&word(), &config).await.unwrap();
        assert!(report.is_success());
        assert!(report.analysis.definition.is_none());
        assert!(report.analysis.definition_html.is_none());
        assert!(report.analysis.explanation.is_some());
    }

    #[tokio::test]
    async fn fatal_failure_is_reported_and_siblings_populated() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let config = all_facets("ok")
            .with(Facet::Explanation, "fails")
            .with(Facet::Decomposition, "fails");
        let report = svc.complete_analysis(&word(), &config).await.unwrap();

        let failed: Vec<Facet> = report.failures.iter().map(|f| f.facet).collect();
        assert_eq!(failed, [Facet::Decomposition, Facet::Explanation]);
        assert_eq!(report.failures[0].provider, "fails");
        assert!(report.analysis.pinyin.is_some());
        assert!(report.analysis.examples.is_some());
        assert_eq!(report.analysis.audio.len(), 2);

        match report.into_result() {
            Err(AnalysisError::Provider { facet, .. }) => assert_eq!(facet, Facet::Decomposition),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_provider_is_a_task_failure() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let mut config = all_facets("ok").with(Facet::Pinyin, "panics");
        config.audio_use_pinyin = true;
        let report = svc.complete_analysis(&word(), &config).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, ProviderError::Task(_)));
        // Audio still ran, just without pinyin in its cache key.
        assert_eq!(report.analysis.audio.len(), 2);
        assert!(report.analysis.definition.is_some());
    }

    #[tokio::test]
    async fn unknown_provider_fails_before_launching() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let config = all_facets("ok").with(Facet::Audio, "nope");
        let err = svc.complete_analysis(&word(), &config).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Registry(RegistryError::NotFound { .. })));
        // Nothing was cached.
        assert_eq!(svc.cache().stats().misses, 0);
    }

    #[tokio::test]
    async fn unconfigured_facets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let config = ProviderConfiguration::new().with(Facet::Pinyin, "ok");
        let a = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        assert_eq!(a.present_facets(), [Facet::Pinyin]);
    }

    #[tokio::test]
    async fn result_is_identical_regardless_of_completion_order() {
        let dir = tempfile::tempdir().unwrap();

        let mut fast_first = ProviderRegistry::new();
        register_scripted(&mut fast_first, Scripted::slow("p", 1));
        register_scripted(&mut fast_first, Scripted::slow("q", 40));
        let mut slow_first = ProviderRegistry::new();
        register_scripted(&mut slow_first, Scripted::slow("p", 40));
        register_scripted(&mut slow_first, Scripted::slow("q", 1));

        let config = ProviderConfiguration::new()
            .with(Facet::Pinyin, "p")
            .with(Facet::Definition, "q")
            .with(Facet::Decomposition, "p")
            .with(Facet::Examples, "q")
            .with(Facet::Explanation, "p")
            .with(Facet::Audio, "q");

        let a = service(dir.path(), fast_first)
            .complete_analysis(&word(), &config)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        let b = service(dir.path(), slow_first)
            .complete_analysis(&word(), &config)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[tokio::test]
    async fn examples_receive_definition_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let mut config = ProviderConfiguration::new()
            .with(Facet::Definition, "cedict")
            .with(Facet::Examples, "dummy");

        config.examples_use_definition = true;
        let with = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        let usage = &with.examples.unwrap().usages[0];
        assert_eq!(usage.translation.as_deref(), Some("(sense: to study)"));

        config.examples_use_definition = false;
        let without = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        assert!(without.examples.unwrap().usages[0].translation.is_none());
    }

    #[tokio::test]
    async fn audio_cache_key_uses_pinyin() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let mut config = ProviderConfiguration::new()
            .with(Facet::Pinyin, "ok")
            .with(Facet::Audio, "ok");
        config.audio_use_pinyin = true;
        let a = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        for cached in &a.audio {
            let name = cached.path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("学习_xué-xí_"), "{name}");
            assert!(cached.path.starts_with(dir.path().join("ok")));
        }
    }

    #[tokio::test]
    async fn audio_does_not_wait_for_pinyin_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = registry();
        register_scripted(&mut r, Scripted::slow("slow", 400));
        let stamped = Arc::new(Stamped::default());
        r.register(FacetProvider::Audio(stamped.clone())).unwrap();
        let svc = service(dir.path(), r);
        let config = ProviderConfiguration::new()
            .with(Facet::Pinyin, "slow")
            .with(Facet::Audio, "stamped");

        let started = Instant::now();
        let report = svc.complete_analysis(&word(), &config).await.unwrap();
        let audio_started = (*stamped.called_at.lock().unwrap()).unwrap();

        assert!(report.is_success());
        assert!(report.analysis.pinyin.is_some());
        assert!(audio_started.duration_since(started) < Duration::from_millis(200));
        assert_eq!(*stamped.pinyin_seen.lock().unwrap(), Some(None));
        // Without the pinyin edge the cache key does not depend on pinyin.
        let path = &report.analysis.audio[0].path;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("学习_x_"), "{name}");
    }

    #[tokio::test]
    async fn audio_waits_for_pinyin_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = registry();
        register_scripted(&mut r, Scripted::slow("slow", 100));
        let stamped = Arc::new(Stamped::default());
        r.register(FacetProvider::Audio(stamped.clone())).unwrap();
        let svc = service(dir.path(), r);
        let mut config = ProviderConfiguration::new()
            .with(Facet::Pinyin, "slow")
            .with(Facet::Audio, "stamped");
        config.audio_use_pinyin = true;

        let started = Instant::now();
        svc.complete_analysis(&word(), &config).await.unwrap();
        let audio_started = (*stamped.called_at.lock().unwrap()).unwrap();
        assert!(audio_started.duration_since(started) >= Duration::from_millis(100));
        let seen = stamped.pinyin_seen.lock().unwrap().clone();
        assert_eq!(seen, Some(Some("xué xí".to_string())));
    }

    #[tokio::test]
    async fn failed_audio_copy_is_a_fatal_audio_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = registry();
        r.register(FacetProvider::Audio(Arc::new(MissingRecording))).unwrap();
        let svc = service(dir.path(), r);
        let config = ProviderConfiguration::new()
            .with(Facet::Pinyin, "ok")
            .with(Facet::Definition, "ok")
            .with(Facet::Audio, "missing-recording");

        let report = svc.complete_analysis(&word(), &config).await.unwrap();

        let failed: Vec<Facet> = report.failures.iter().map(|f| f.facet).collect();
        assert_eq!(failed, [Facet::Audio]);
        assert!(matches!(report.failures[0].error, ProviderError::Cache(_)));
        assert_eq!(report.failures[0].provider, "missing-recording");
        assert!(report.analysis.audio.is_empty());
        assert!(report.analysis.pinyin.is_some());
        assert!(report.analysis.definition.is_some());
        let key = CacheKey::new("missing-recording", "学习", "", "gone.wav");
        assert!(svc.cache().lookup(&key).is_none());
    }

    // -- selection ----------------------------------------------------------

    #[tokio::test]
    async fn confirmed_selection_keeps_chosen_takes() {
        let dir = tempfile::tempdir().unwrap();
        let selector = FixedSelector::new(SelectionOutcome::Confirmed(vec![1]));
        let svc = service(dir.path(), registry()).with_selector(selector.clone());
        let config = ProviderConfiguration::new().with(Facet::Audio, "ok");
        let a = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        assert_eq!(a.audio.len(), 1);
        assert_eq!(a.audio[0].source_id, "nova");
        assert_eq!(*selector.seen.lock().unwrap(), [(Facet::Audio, 2)]);
    }

    #[tokio::test]
    async fn aborted_selection_keeps_audio_but_drops_images() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry())
            .with_selector(FixedSelector::new(SelectionOutcome::Aborted));
        let config = ProviderConfiguration::new()
            .with(Facet::Definition, "ok")
            .with(Facet::Audio, "ok")
            .with(Facet::Images, "ok");
        let a = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        assert_eq!(a.audio.len(), 2);
        assert!(a.images.is_empty());
        assert_eq!(a.definition_html.as_deref(), Some("to study"));
    }

    #[tokio::test]
    async fn skipped_selection_leaves_audio_absent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry())
            .with_selector(FixedSelector::new(SelectionOutcome::Skipped));
        let config = ProviderConfiguration::new().with(Facet::Audio, "ok");
        let report = svc.complete_analysis(&word(), &config).await.unwrap();
        assert!(report.is_success());
        assert!(report.analysis.audio.is_empty());
    }

    #[tokio::test]
    async fn selected_images_are_composed_into_definition() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry())
            .with_selector(FixedSelector::new(SelectionOutcome::Confirmed(vec![0, 2])));
        let config = ProviderConfiguration::new()
            .with(Facet::Definition, "ok")
            .with(Facet::Images, "ok");
        let a = svc.complete_analysis(&word(), &config).await.unwrap().analysis;
        assert_eq!(a.images.len(), 2);
        let html = a.definition_html.unwrap();
        assert!(html.contains("src=\"学习_1.png\""), "{html}");
        assert!(html.contains("src=\"学习_3.png\""), "{html}");
        assert!(!html.contains("/tmp/images"));
    }

    // -- single-facet -------------------------------------------------------

    #[tokio::test]
    async fn single_facet_calls_propagate_failures() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let err = svc.get_explanation(&word(), "fails").await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Provider { facet: Facet::Explanation, .. }
        ));
        let declined = svc.get_definition(&word(), "declines").await.unwrap();
        assert!(!declined.is_found());
        assert!(matches!(
            svc.get_pinyin(&word(), "missing").await,
            Err(AnalysisError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn single_pronunciation_is_cached_once() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), registry());
        let pinyin = Pinyin::new("xuéxí");
        let first = svc
            .get_pronunciation(&word(), Some(&pinyin), "ok")
            .await
            .unwrap()
            .found()
            .unwrap();
        let second = svc
            .get_pronunciation(&word(), Some(&pinyin), "ok")
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.source_id, "alloy");
        assert_eq!(std::fs::read(&first.path).unwrap(), b"ID3 alloy");
        let stats = svc.cache().stats();
        assert_eq!((stats.misses, stats.hits), (1, 1));
    }
}
