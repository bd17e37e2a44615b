//! Turns an [`AudioSource`] into a raw file the cache can read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;

use super::cache::{CacheError, CacheResult};
use super::candidate::AudioSource;

/// Raw audio ready for normalisation.  Temporary files are deleted on drop.
#[derive(Debug)]
pub enum RawAudio {
    File(PathBuf),
    Temp(TempPath),
}

impl RawAudio {
    pub fn path(&self) -> &Path {
        match self {
            RawAudio::File(p) => p,
            RawAudio::Temp(t) => t,
        }
    }
}

/// Downloads remote candidates and spills inline bytes to disk.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: reqwest::Client,
}

impl Default for AudioFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AudioFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Produce a readable file for `source`.
    pub async fn materialize(&self, source: &AudioSource) -> CacheResult<RawAudio> {
        match source {
            AudioSource::File(path) => Ok(RawAudio::File(path.clone())),
            AudioSource::Inline(bytes) => spill(bytes, None).await,
            AudioSource::Remote(url) => {
                log::debug!("downloading audio from {url}");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| CacheError::Fetch(format!("{url}: {e}")))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| CacheError::Fetch(format!("{url}: {e}")))?;
                spill(&bytes, remote_extension(url).as_deref()).await
            }
        }
    }
}

/// Extension of the last path segment of `url`, e.g. `ogg` for
/// `https://host/pron/学习.ogg?v=2`.
fn remote_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Inline bytes carry no format hint; the cache treats them as MP3.
async fn spill(bytes: &[u8], extension: Option<&str>) -> CacheResult<RawAudio> {
    if bytes.is_empty() {
        return Err(CacheError::Fetch("audio payload is empty".into()));
    }
    let suffix = extension.map(|e| format!(".{e}")).unwrap_or_default();
    let tmp = tempfile::Builder::new()
        .prefix("hanzi-cards-raw-")
        .suffix(&suffix)
        .tempfile()?
        .into_temp_path();
    tokio::fs::write(&tmp, bytes).await?;
    Ok(RawAudio::Temp(tmp))
}
