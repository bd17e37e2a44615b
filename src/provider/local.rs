//! Providers backed by a directory of files named after the word.
//!
//! A file matches `word` when its stem is exactly the word (`学习.mp3`) or
//! starts with the word followed by `_` (`学习_female.mp3`).  Matches are
//! returned sorted by file name so repeated runs see the same order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::audio::{AudioCandidate, AudioSource};

use super::capability::{AudioProvider, ImageProvider, Provider};
use super::error::{ProviderError, ProviderResult, Reply};
use super::types::{ImageCandidate, Pinyin, ProviderKind, Word};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn stem_matches(path: &Path, word: &Word) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    match stem.strip_prefix(word.as_str()) {
        Some("") => true,
        Some(rest) => rest.starts_with('_'),
        None => false,
    }
}

/// Files in `dir` for `word` with one of `extensions`, sorted by name.
async fn scan(dir: &Path, word: &Word, extensions: &[&str]) -> Result<Vec<PathBuf>, ProviderError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProviderError::Config(format!(
                "directory {} does not exist",
                dir.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let known = extension(&path).is_some_and(|ext| extensions.contains(&ext.as_str()));
        if known && stem_matches(&path, word) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Part of the stem after `word_`, used as a human label (`female`).
fn suffix_label(path: &Path, word: &Word) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix(word.as_str())?.strip_prefix('_')?;
    (!rest.is_empty()).then(|| rest.to_string())
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

pub struct LocalAudioProvider {
    name: String,
    dir: PathBuf,
}

impl LocalAudioProvider {
    pub const NAME: &'static str = "local-audio";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            dir: dir.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Provider for LocalAudioProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Recordings from a local directory (<word>.mp3, <word>_<take>.mp3)"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}

#[async_trait]
impl AudioProvider for LocalAudioProvider {
    async fn get_pronunciations(
        &self,
        word: &Word,
        _pinyin: Option<&Pinyin>,
    ) -> ProviderResult<Vec<AudioCandidate>> {
        let files = scan(&self.dir, word, AUDIO_EXTENSIONS).await?;
        if files.is_empty() {
            return Ok(Reply::declined(format!(
                "no recording of {word} in {}",
                self.dir.display()
            )));
        }
        let candidates = files
            .into_iter()
            .map(|path| {
                let id = file_name(&path);
                let label = suffix_label(&path, word).unwrap_or_else(|| id.clone());
                AudioCandidate::new(self.name.clone(), AudioSource::File(path), id, label)
            })
            .collect();
        Ok(Reply::Found(candidates))
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn mime_type(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

pub struct LocalImageProvider {
    name: String,
    dir: PathBuf,
}

impl LocalImageProvider {
    pub const NAME: &'static str = "local-images";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            dir: dir.into(),
        }
    }
}

impl Provider for LocalImageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Images from a local directory (<word>.png, <word>_<n>.jpg)"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}

#[async_trait]
impl ImageProvider for LocalImageProvider {
    async fn get_images(&self, word: &Word) -> ProviderResult<Vec<ImageCandidate>> {
        let files = scan(&self.dir, word, IMAGE_EXTENSIONS).await?;
        if files.is_empty() {
            return Ok(Reply::declined(format!(
                "no image of {word} in {}",
                self.dir.display()
            )));
        }
        let candidates = files
            .into_iter()
            .map(|path| {
                let ext = extension(&path).unwrap_or_default();
                let local_path = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
                ImageCandidate {
                    uri: format!("file://{}", local_path.display()),
                    thumbnail_uri: None,
                    label: suffix_label(&path, word),
                    width: None,
                    height: None,
                    mime_type: mime_type(&ext).to_string(),
                    local_path,
                }
            })
            .collect();
        Ok(Reply::Found(candidates))
    }
}
