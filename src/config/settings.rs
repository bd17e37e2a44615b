//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides what it mentions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::provider::Facet;

// ---------------------------------------------------------------------------
// ProviderSelection
// ---------------------------------------------------------------------------

/// Provider name chosen for each facet.  `None` skips the facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSelection {
    pub pinyin: Option<String>,
    pub definition: Option<String>,
    pub decomposition: Option<String>,
    pub examples: Option<String>,
    pub explanation: Option<String>,
    pub audio: Option<String>,
    pub images: Option<String>,
    /// Hand the definition to the examples provider as context.  The
    /// examples call then waits for the definition facet.
    pub examples_use_definition: bool,
    /// Hand the pinyin to the audio provider and put it in the cache key.
    /// The audio call then waits for the pinyin facet.
    pub audio_use_pinyin: bool,
}

impl Default for ProviderSelection {
    fn default() -> Self {
        Self {
            pinyin: Some("dummy".into()),
            definition: Some("dummy".into()),
            decomposition: None,
            examples: Some("dummy".into()),
            explanation: None,
            audio: None,
            images: None,
            examples_use_definition: true,
            audio_use_pinyin: false,
        }
    }
}

impl ProviderSelection {
    /// Facet → provider name for every configured facet.
    pub fn to_map(&self) -> BTreeMap<Facet, String> {
        let slots = [
            (Facet::Pinyin, &self.pinyin),
            (Facet::Definition, &self.definition),
            (Facet::Decomposition, &self.decomposition),
            (Facet::Examples, &self.examples),
            (Facet::Explanation, &self.explanation),
            (Facet::Audio, &self.audio),
            (Facet::Images, &self.images),
        ];
        slots
            .into_iter()
            .filter_map(|(facet, name)| {
                name.as_ref()
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .map(|n| (facet, n.to_string()))
            })
            .collect()
    }

    pub fn set(&mut self, facet: Facet, name: Option<String>) {
        let slot = match facet {
            Facet::Pinyin => &mut self.pinyin,
            Facet::Definition => &mut self.definition,
            Facet::Decomposition => &mut self.decomposition,
            Facet::Examples => &mut self.examples,
            Facet::Explanation => &mut self.explanation,
            Facet::Audio => &mut self.audio,
            Facet::Images => &mut self.images,
        };
        *slot = name;
    }
}

// ---------------------------------------------------------------------------
// AiConfig
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat endpoint used by the AI text provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the API, without `/v1/...`.
    ///
    /// - Ollama: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// `None` for local endpoints that need no authentication.
    pub api_key: Option<String>,
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:7b".into(),
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// OpenAI-compatible `/v1/audio/speech` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// One candidate is generated per voice, in this order.
    pub voices: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            voices: vec!["alloy".into(), "nova".into()],
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalConfig
// ---------------------------------------------------------------------------

/// Directories scanned by the local media providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Recordings named `<word>.<ext>` or `<word>_<take>.<ext>`.
    pub audio_dir: Option<PathBuf>,
    /// Images named the same way.
    pub image_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// NormalizeConfig
// ---------------------------------------------------------------------------

/// External audio normaliser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// When `false`, cached audio is a byte-for-byte copy of the provider's.
    pub enabled: bool,
    /// Program name or path (`ffmpeg`).
    pub program: String,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "ffmpeg".into(),
            bitrate_kbps: 64,
            sample_rate_hz: 44_100,
        }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// Backoff for transient provider failures (rate limits, timeouts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Ask the user to choose between multiple audio/image candidates.
    pub interactive: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { interactive: true }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use hanzi_cards::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application home; the audio cache lives in `<home>/cache`.
    /// `None` uses the platform cache directory.
    pub home_dir: Option<PathBuf>,
    pub providers: ProviderSelection,
    pub ai: AiConfig,
    pub tts: TtsConfig,
    pub local: LocalConfig,
    pub normalize: NormalizeConfig,
    pub retry: RetryConfig,
    pub selection: SelectionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Root of the audio cache.
    pub fn cache_root(&self) -> PathBuf {
        match &self.home_dir {
            Some(home) => home.join("cache"),
            None => AppPaths::new().cache_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A default `AppConfig` survives a TOML round trip.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.providers, loaded.providers);
        assert_eq!(original.ai.base_url, loaded.ai.base_url);
        assert_eq!(original.ai.model, loaded.ai.model);
        assert_eq!(original.tts.voices, loaded.tts.voices);
        assert_eq!(original.normalize.program, loaded.normalize.program);
        assert_eq!(original.retry, loaded.retry);
        assert_eq!(original.selection.interactive, loaded.selection.interactive);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let config = AppConfig::load_from(&dir.path().join("nonexistent.toml"))
            .expect("should not error");
        assert_eq!(config.providers, ProviderSelection::default());
        assert_eq!(config.retry, RetryConfig::default());
    }

    /// A partial file overrides only what it names.
    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
home_dir = "/srv/hanzi"

[providers]
audio = "tts"

[retry]
max_attempts = 2
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.providers.audio.as_deref(), Some("tts"));
        assert_eq!(cfg.providers.pinyin.as_deref(), Some("dummy"));
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.retry.base_delay_ms, 500);
        assert_eq!(cfg.cache_root(), PathBuf::from("/srv/hanzi/cache"));
        assert_eq!(cfg.normalize.program, "ffmpeg");
    }

    #[test]
    fn selection_map_skips_unset_and_blank() {
        let mut sel = ProviderSelection::default();
        sel.set(Facet::Audio, Some("tts".into()));
        sel.set(Facet::Examples, Some("  ".into()));
        sel.set(Facet::Definition, None);

        let map = sel.to_map();
        assert_eq!(map.get(&Facet::Audio).map(String::as_str), Some("tts"));
        assert_eq!(map.get(&Facet::Pinyin).map(String::as_str), Some("dummy"));
        assert!(!map.contains_key(&Facet::Examples));
        assert!(!map.contains_key(&Facet::Definition));
        assert!(!map.contains_key(&Facet::Images));
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();
        assert!(cfg.home_dir.is_none());
        assert_eq!(cfg.retry.max_attempts, 4);
        assert_eq!(cfg.normalize.bitrate_kbps, 64);
        assert_eq!(cfg.tts.voices, vec!["alloy".to_string(), "nova".to_string()]);
        assert!(cfg.selection.interactive);
    }
}
