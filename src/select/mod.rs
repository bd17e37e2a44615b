//! Interactive candidate selection.
//!
//! * [`SelectionSession`] — enum-state loop over an [`InputSource`] and a
//!   [`Renderer`]; testable with [`ScriptedInput`].
//! * [`TerminalSelector`] — the [`CandidateSelector`] used by the analysis
//!   service, driving the session from a real terminal via `crossterm`.

pub mod session;
pub mod terminal;

pub use session::{
    InputEvent, InputSource, NullRenderer, Renderer, ScriptedInput, SelectionOutcome,
    SelectionSession, SelectionView, SessionState,
};
pub use terminal::{
    environment_is_interactive, map_key, CandidateSelector, CrosstermInput, TerminalRenderer,
    TerminalSelector,
};
