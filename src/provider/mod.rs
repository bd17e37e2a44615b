//! Capability providers.
//!
//! This module provides:
//! * One async trait per facet ([`PinyinProvider`], [`AudioProvider`], …) plus
//!   the shared [`Provider`] metadata trait.
//! * [`Reply`] / [`ProviderResult`] — tagged outcome separating a graceful
//!   "no answer" from an operational [`ProviderError`].
//! * [`RetryPolicy`] — bounded exponential backoff for transient failures.
//! * Concrete backends: [`DummyProvider`], [`DictionaryProvider`],
//!   [`ChatProvider`], [`SpeechProvider`], [`LocalAudioProvider`],
//!   [`LocalImageProvider`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use hanzi_cards::provider::{DummyProvider, PinyinProvider, Reply, Word};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = DummyProvider::new();
//!     let word = Word::new("学习").unwrap();
//!     match provider.get_pinyin(&word).await {
//!         Ok(Reply::Found(pinyin)) => println!("{pinyin}"),
//!         Ok(Reply::Declined { reason }) => println!("no answer: {reason}"),
//!         Err(e) => eprintln!("failed: {e}"),
//!     }
//! }
//! ```

pub mod capability;
pub mod dictionary;
pub mod dummy;
pub mod error;
pub mod http;
pub mod local;
pub mod openai;
pub mod prompt;
pub mod retry;
pub mod tts;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use capability::{
    AudioProvider, DecompositionProvider, DefinitionProvider, ExamplesProvider,
    ExplanationProvider, ImageProvider, PinyinProvider, Provider,
};
pub use dictionary::{DictionaryEntry, DictionaryProvider, DictionaryRecord};
pub use dummy::DummyProvider;
pub use error::{ProviderError, ProviderResult, Reply};
pub use local::{LocalAudioProvider, LocalImageProvider};
pub use openai::ChatProvider;
pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;
pub use tts::SpeechProvider;
pub use types::{
    Definition, Example, Explanation, Facet, ImageCandidate, Pinyin, ProviderInfo, ProviderKind,
    StructuralDecomposition, Usage, Word, WordError,
};
