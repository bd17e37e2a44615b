//! Pronunciation audio: candidates, fetching, normalisation and caching.
//!
//! ```text
//! AudioProvider ──▶ Vec<AudioCandidate>
//!                        │  (cache miss only)
//!                        ▼
//!                  AudioFetcher::materialize ──▶ RawAudio
//!                        │
//!                        ▼
//!                  AudioCache::ensure_with
//!                    ├─ normaliser ok  → tmp ─rename─▶ <root>/<provider>/<slug>.mp3
//!                    └─ normaliser err → copy raw → tmp ─rename─▶ same path
//! ```

pub mod cache;
pub mod candidate;
pub mod fetch;
pub mod normalize;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cache::{AudioCache, CacheError, CacheKey, CacheResult, CacheStats};
pub use candidate::{AudioCandidate, AudioSource, CachedAudio};
pub use fetch::{AudioFetcher, RawAudio};
pub use normalize::{AudioNormalizer, FfmpegNormalizer, NormalizeError};
