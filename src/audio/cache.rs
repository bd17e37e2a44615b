//! Content-addressed on-disk cache of normalised pronunciation files.
//!
//! Layout: `<cache-root>/<provider>/<stem>.<ext>`, where the stem is derived
//! from `(provider, word, pinyin, source id)` by [`CacheKey::stem`].  Normalised
//! files are `.mp3`; the copy fallback keeps the raw file's extension.
//!
//! Guarantees:
//! * identical keys resolve to the same path; once the file exists nothing
//!   is fetched, read or normalised again;
//! * files only appear under their final name via rename from a temporary
//!   file in the same directory, so a half-written file is never a hit;
//! * concurrent calls for the same key serialise on a per-key lock and the
//!   second caller reuses the first caller's file.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::fetch::RawAudio;
use super::normalize::AudioNormalizer;

/// Extension of normalised files, and of raw files whose format is unknown.
const CACHE_EXTENSION: &str = "mp3";

/// Longest readable prefix kept in a slug component.
const MAX_COMPONENT_CHARS: usize = 32;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The raw audio could not be obtained (download failed, …).
    #[error("failed to fetch raw audio: {0}")]
    Fetch(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// The identity of one cached pronunciation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub word: String,
    pub pinyin: String,
    pub source_id: String,
}

/// Keep letters and digits (any script), collapse everything else to `-`.
fn sanitize(component: &str) -> String {
    let mut out = String::new();
    for c in component.chars().take(MAX_COMPONENT_CHARS) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    }
}

impl CacheKey {
    pub fn new(
        provider: impl Into<String>,
        word: impl Into<String>,
        pinyin: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            word: word.into(),
            pinyin: pinyin.into(),
            source_id: source_id.into(),
        }
    }

    /// SHA-256 over all four components, hex, first 16 bytes.
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.provider.as_bytes());
        hasher.update(b"|");
        hasher.update(self.word.as_bytes());
        hasher.update(b"|");
        hasher.update(self.pinyin.as_bytes());
        hasher.update(b"|");
        hasher.update(self.source_id.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    /// Filesystem-safe file stem: readable word/pinyin prefix plus digest.
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}",
            sanitize(&self.word),
            sanitize(&self.pinyin),
            self.digest()
        )
    }

    /// File name of the normalised entry.
    pub fn slug(&self) -> String {
        self.slug_with(CACHE_EXTENSION)
    }

    pub fn slug_with(&self, extension: &str) -> String {
        format!("{}.{extension}", self.stem())
    }

    /// Directory name for the provider component.
    pub fn provider_dir(&self) -> String {
        sanitize(&self.provider)
    }
}

// ---------------------------------------------------------------------------
// CacheStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses stored through the normaliser.
    pub normalized: u64,
    /// Misses stored by plain copy.
    pub copied: u64,
}

// ---------------------------------------------------------------------------
// AudioCache
// ---------------------------------------------------------------------------

/// Owns `<cache-root>` exclusively; providers never write there.
pub struct AudioCache {
    root: PathBuf,
    normalizer: Option<Arc<dyn AudioNormalizer>>,
    /// Per-destination write locks.
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    normalized: AtomicU64,
    copied: AtomicU64,
}

impl AudioCache {
    /// `root` is not created until the first write.
    pub fn new(root: impl Into<PathBuf>, normalizer: Option<Arc<dyn AudioNormalizer>>) -> Self {
        Self {
            root: root.into(),
            normalizer,
            locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            normalized: AtomicU64::new(0),
            copied: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of the normalised entry for `key`, whether or not it
    /// exists yet.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.provider_dir()).join(key.slug())
    }

    /// Cached path for `key` under any extension.  Does not touch the
    /// statistics.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let normalized = self.path_for(key);
        if normalized.is_file() {
            return Some(normalized);
        }
        let stem = key.stem();
        std::fs::read_dir(normalized.parent()?)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|p| p.file_stem().is_some_and(|s| s == stem.as_str()) && p.is_file())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            normalized: self.normalized.load(Ordering::Relaxed),
            copied: self.copied.load(Ordering::Relaxed),
        }
    }

    /// Ensure the raw file at `raw_source` is cached (normalised if possible)
    /// under `key` and return the cached path.
    ///
    /// On a hit `raw_source` is not read at all.
    pub async fn ensure_cached_normalized(
        &self,
        raw_source: &Path,
        key: &CacheKey,
    ) -> CacheResult<PathBuf> {
        self.ensure_with(key, || async { Ok(RawAudio::File(raw_source.to_path_buf())) })
            .await
    }

    /// Like [`ensure_cached_normalized`](Self::ensure_cached_normalized) but
    /// the raw audio is produced by `fetch`, which only runs on a miss.
    pub async fn ensure_with<F, Fut>(&self, key: &CacheKey, fetch: F) -> CacheResult<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<RawAudio>>,
    {
        if let Some(hit) = self.lookup(key) {
            log::debug!("audio cache hit: {}", hit.display());
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let slot = self.path_for(key);
        let lock = self.lock_for(&slot);
        let result = {
            let _guard = lock.lock().await;
            self.fill(key, fetch).await
        };
        drop(lock);
        self.release_lock(&slot);
        result
    }

    fn lock_for(&self, dest: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(dest.to_path_buf()).or_default())
    }

    /// Forget the lock once no other caller holds it.
    fn release_lock(&self, dest: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(dest).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(dest);
        }
    }

    /// Must be called with the per-key lock held.
    async fn fill<F, Fut>(&self, key: &CacheKey, fetch: F) -> CacheResult<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<RawAudio>>,
    {
        // Another caller may have filled it while we waited for the lock.
        if let Some(hit) = self.lookup(key) {
            log::debug!("audio cache hit after wait: {}", hit.display());
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("audio cache miss: {}", self.path_for(key).display());

        let dir = self.root.join(key.provider_dir());
        tokio::fs::create_dir_all(&dir).await?;

        let raw = fetch().await?;

        let tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&format!(".{CACHE_EXTENSION}"))
            .tempfile_in(&dir)?
            .into_temp_path();

        let normalized = match &self.normalizer {
            Some(normalizer) => match normalizer.normalize(raw.path(), &tmp).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!(
                        "normalisation failed for {} ({e}); caching the raw file",
                        raw.path().display()
                    );
                    false
                }
            },
            None => false,
        };

        let extension = if normalized {
            self.normalized.fetch_add(1, Ordering::Relaxed);
            CACHE_EXTENSION.to_string()
        } else {
            tokio::fs::copy(raw.path(), &tmp).await?;
            self.copied.fetch_add(1, Ordering::Relaxed);
            raw_extension(raw.path())
        };

        let dest = dir.join(key.slug_with(&extension));
        tmp.persist(&dest).map_err(|e| CacheError::Io(e.error))?;
        Ok(dest)
    }
}

/// Lower-cased extension of a raw file, or `mp3` when it has none usable.
fn raw_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| CACHE_EXTENSION.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
