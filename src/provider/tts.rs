//! Text-to-speech audio provider over an OpenAI-compatible
//! `/v1/audio/speech` endpoint.
//!
//! Produces one [`AudioCandidate`] per configured voice; the voice id is the
//! candidate's source id, so each voice caches under its own file.

use async_trait::async_trait;

use crate::audio::{AudioCandidate, AudioSource};
use crate::config::TtsConfig;

use super::capability::{AudioProvider, Provider};
use super::error::{ProviderError, ProviderResult, Reply};
use super::http::{classify_failure, retry_after};
use super::retry::RetryPolicy;
use super::types::{Pinyin, ProviderKind, Word};

pub struct SpeechProvider {
    name: String,
    client: reqwest::Client,
    config: TtsConfig,
    retry: RetryPolicy,
}

impl SpeechProvider {
    pub const NAME: &'static str = "tts";

    pub fn from_config(config: &TtsConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: Self::NAME.to_string(),
            client,
            config: config.clone(),
            retry,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn voices(&self) -> &[String] {
        &self.config.voices
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Hosted endpoints need a key; a local server usually does not.
    fn check_credentials(&self) -> Result<(), ProviderError> {
        let url = self.config.base_url.as_str();
        let local = url.contains("://localhost") || url.contains("://127.0.0.1");
        if self.api_key().is_none() && !local {
            return Err(ProviderError::Config(format!(
                "{}: api_key is required for {url}",
                self.name
            )));
        }
        Ok(())
    }

    async fn synthesize_once(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        let url = format!(
            "{}/v1/audio/speech",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": voice,
            "response_format": "mp3",
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.api_key() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return classify_failure(status, hint, &text);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(Reply::Found(bytes.to_vec()))
    }
}

impl Provider for SpeechProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "OpenAI-compatible text-to-speech, one take per configured voice"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ai
    }
}

#[async_trait]
impl AudioProvider for SpeechProvider {
    /// The word itself is synthesised; pinyin is not sent because TTS
    /// engines read characters more reliably than romanisation.
    async fn get_pronunciations(
        &self,
        word: &Word,
        _pinyin: Option<&Pinyin>,
    ) -> ProviderResult<Vec<AudioCandidate>> {
        if self.config.voices.is_empty() {
            return Ok(Reply::declined(format!("{}: no voices configured", self.name)));
        }
        self.check_credentials()?;

        let mut candidates = Vec::with_capacity(self.config.voices.len());
        for voice in &self.config.voices {
            let label = format!("{}/{voice}", self.name);
            let reply = self
                .retry
                .run(&label, || self.synthesize_once(word.as_str(), voice))
                .await?;
            match reply {
                Reply::Found(bytes) => candidates.push(AudioCandidate::new(
                    self.name.clone(),
                    AudioSource::Inline(bytes),
                    voice.clone(),
                    format!("TTS voice {voice}"),
                )),
                Reply::Declined { reason } => {
                    log::info!("{label}: declined ({reason})");
                }
            }
        }

        if candidates.is_empty() {
            return Ok(Reply::declined(format!(
                "{}: every voice declined {word}",
                self.name
            )));
        }
        Ok(Reply::Found(candidates))
    }
}
