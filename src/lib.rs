//! Multi-facet analysis of Chinese words for flashcards.
//!
//! A word is looked up through swappable providers (one per facet: pinyin,
//! definition, decomposition, examples, explanation, audio, images), run
//! concurrently, with audio normalised into an on-disk cache and ambiguous
//! candidates optionally picked by a human in the terminal.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod provider;
pub mod registry;
pub mod select;
pub mod text;
