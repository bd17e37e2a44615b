//! Audio candidates as returned by providers, and their cached form.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Where the raw bytes of a candidate live before caching.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A file already on disk (local recordings).
    File(PathBuf),
    /// A URL to download on cache miss (community recordings).
    Remote(String),
    /// Bytes returned inline by the backend (TTS responses).
    Inline(Vec<u8>),
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(p) => f.debug_tuple("File").field(p).finish(),
            AudioSource::Remote(u) => f.debug_tuple("Remote").field(u).finish(),
            AudioSource::Inline(b) => write!(f, "Inline({} bytes)", b.len()),
        }
    }
}

/// One pronunciation offered by an audio provider, not yet cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCandidate {
    /// Name of the provider that produced it.
    pub provider: String,
    pub source: AudioSource,
    /// Identifies the take within the provider: voice id, file name,
    /// recording URL, speaker name.  Part of the cache key.
    pub source_id: String,
    /// Shown to the user when choosing between takes.
    pub label: String,
}

impl AudioCandidate {
    pub fn new(
        provider: impl Into<String>,
        source: AudioSource,
        source_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            source,
            source_id: source_id.into(),
            label: label.into(),
        }
    }
}

/// A candidate after it went through [`crate::audio::AudioCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedAudio {
    pub provider: String,
    pub source_id: String,
    pub label: String,
    /// Absolute path inside the cache root.
    pub path: PathBuf,
}

impl fmt::Display for CachedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label, self.provider)
    }
}
