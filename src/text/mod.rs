//! Stateless text transforms used by the providers and the export step.
//!
//! * [`numbered_to_marked`] — `xue2 xi2` → `xué xí`.
//! * [`compose_definition`] — escaped definition HTML with inline thumbnails.

pub mod html;
pub mod tone;

pub use html::{compose_definition, escape};
pub use tone::{convert_syllable, has_tone_numbers, numbered_to_marked};
