//! Candidate selection state machine.
//!
//! ```text
//! Presenting ──render──▶ Selecting ──Up/Down/Toggle──▶ Selecting
//!                                  ──Confirm (≥1 on)─▶ Confirmed
//!                                  ──Confirm (none)──▶ Skipped
//!                                  ──Skip───────────▶ Skipped
//!                                  ──input closed───▶ Aborted
//! Presenting ──non-interactive input──▶ Aborted   (nothing rendered)
//! ```
//!
//! Input comes from an [`InputSource`] and output goes to a [`Renderer`], so
//! the machine runs the same against a real terminal or a scripted test.

use std::collections::VecDeque;
use std::fmt;
use std::io;

use crate::provider::Word;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Discrete user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Up,
    Down,
    /// Flip the candidate under the cursor.
    Toggle,
    Confirm,
    /// Explicitly choose nothing.
    Skip,
}

pub trait InputSource {
    /// `false` when no human can answer (dumb terminal, piped stdin).
    fn is_interactive(&self) -> bool;

    /// Block until the next event.  `Ok(None)` means the input is closed.
    fn next_event(&mut self) -> io::Result<Option<InputEvent>>;
}

/// Replays a fixed list of events.  Counts reads so tests can assert that
/// a non-interactive session never touched its input.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    interactive: bool,
    reads: usize,
}

impl ScriptedInput {
    pub fn new(events: impl IntoIterator<Item = InputEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            interactive: true,
            reads: 0,
        }
    }

    /// Behaves like a dumb terminal.
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl InputSource for ScriptedInput {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn next_event(&mut self) -> io::Result<Option<InputEvent>> {
        self.reads += 1;
        Ok(self.events.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// What a renderer needs to draw one frame.
#[derive(Debug)]
pub struct SelectionView<'a> {
    pub word: &'a Word,
    pub title: &'a str,
    pub labels: &'a [String],
    pub cursor: usize,
    pub selected: &'a [bool],
}

pub trait Renderer {
    fn render(&mut self, view: &SelectionView<'_>) -> io::Result<()>;

    /// Called once when the session reaches a terminal state after having
    /// rendered at least one frame.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Draws nothing; counts frames.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames: usize,
}

impl Renderer for NullRenderer {
    fn render(&mut self, _view: &SelectionView<'_>) -> io::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Presenting,
    Selecting,
    Confirmed,
    Skipped,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Confirmed | SessionState::Skipped | SessionState::Aborted
        )
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome<T> {
    /// Non-empty subset, in original candidate order.
    Confirmed(Vec<T>),
    /// The user chose none.
    Skipped,
    /// No human input was available.
    Aborted,
}

impl<T> SelectionOutcome<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SelectionOutcome<U> {
        match self {
            SelectionOutcome::Confirmed(items) => {
                SelectionOutcome::Confirmed(items.into_iter().map(f).collect())
            }
            SelectionOutcome::Skipped => SelectionOutcome::Skipped,
            SelectionOutcome::Aborted => SelectionOutcome::Aborted,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SelectionOutcome::Confirmed(_) => "confirmed",
            SelectionOutcome::Skipped => "skipped",
            SelectionOutcome::Aborted => "aborted",
        }
    }
}

/// One selection prompt.  Discard after reading the outcome.
pub struct SelectionSession<I, R> {
    input: I,
    renderer: R,
    title: String,
    state: SessionState,
}

impl<I: InputSource, R: Renderer> SelectionSession<I, R> {
    pub fn new(input: I, renderer: R, title: impl Into<String>) -> Self {
        Self {
            input,
            renderer,
            title: title.into(),
            state: SessionState::Presenting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Drive the machine to a terminal state.
    pub fn run<T: fmt::Display>(
        &mut self,
        candidates: Vec<T>,
        word: &Word,
    ) -> io::Result<SelectionOutcome<T>> {
        if !self.input.is_interactive() {
            self.state = SessionState::Aborted;
            return Ok(SelectionOutcome::Aborted);
        }
        if candidates.is_empty() {
            self.state = SessionState::Skipped;
            return Ok(SelectionOutcome::Skipped);
        }

        let labels: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        let mut selected = vec![false; candidates.len()];
        let mut cursor = 0usize;

        while !self.state.is_terminal() {
            match self.state {
                SessionState::Presenting => {
                    self.draw(word, &labels, cursor, &selected)?;
                    self.state = SessionState::Selecting;
                }
                SessionState::Selecting => {
                    let Some(event) = self.input.next_event()? else {
                        self.state = SessionState::Aborted;
                        break;
                    };
                    match event {
                        InputEvent::Up => cursor = cursor.saturating_sub(1),
                        InputEvent::Down => cursor = (cursor + 1).min(labels.len() - 1),
                        InputEvent::Toggle => selected[cursor] = !selected[cursor],
                        InputEvent::Confirm if selected.contains(&true) => {
                            self.state = SessionState::Confirmed
                        }
                        InputEvent::Confirm | InputEvent::Skip => {
                            self.state = SessionState::Skipped
                        }
                    }
                    if !self.state.is_terminal() {
                        self.draw(word, &labels, cursor, &selected)?;
                    }
                }
                _ => break,
            }
        }
        self.renderer.finish()?;

        Ok(match self.state {
            SessionState::Confirmed => SelectionOutcome::Confirmed(
                candidates
                    .into_iter()
                    .zip(selected)
                    .filter_map(|(c, on)| on.then_some(c))
                    .collect(),
            ),
            SessionState::Skipped => SelectionOutcome::Skipped,
            _ => SelectionOutcome::Aborted,
        })
    }

    fn draw(
        &mut self,
        word: &Word,
        labels: &[String],
        cursor: usize,
        selected: &[bool],
    ) -> io::Result<()> {
        self.renderer.render(&SelectionView {
            word,
            title: &self.title,
            labels,
            cursor,
            selected,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use InputEvent::*;

    fn word() -> Word {
        Word::new("学习").unwrap()
    }

    fn run(events: Vec<InputEvent>) -> (SelectionOutcome<&'static str>, SessionState) {
        let mut s = SelectionSession::new(ScriptedInput::new(events), NullRenderer::default(), "t");
        let out = s.run(vec!["A", "B", "C"], &word()).unwrap();
        (out, s.state())
    }

    #[test]
    fn confirmed_subset_keeps_candidate_order() {
        // toggle(C) before toggle(B): result is still [B, C].
        let (out, state) = run(vec![Down, Down, Toggle, Up, Toggle, Confirm]);
        assert_eq!(out, SelectionOutcome::Confirmed(vec!["B", "C"]));
        assert_eq!(state, SessionState::Confirmed);

        let (out, _) = run(vec![Down, Toggle, Down, Toggle, Confirm]);
        assert_eq!(out, SelectionOutcome::Confirmed(vec!["B", "C"]));
    }

    #[test]
    fn double_toggle_is_a_no_op() {
        let (out, _) = run(vec![Toggle, Toggle, Down, Toggle, Confirm]);
        assert_eq!(out, SelectionOutcome::Confirmed(vec!["B"]));
    }

    #[test]
    fn confirm_with_nothing_selected_is_a_skip() {
        assert_eq!(run(vec![Down, Confirm]).0, SelectionOutcome::Skipped);
        assert_eq!(run(vec![Toggle, Skip]).0, SelectionOutcome::Skipped);
    }

    #[test]
    fn cursor_is_clamped() {
        let (out, _) = run(vec![Up, Up, Toggle, Down, Down, Down, Down, Toggle, Confirm]);
        assert_eq!(out, SelectionOutcome::Confirmed(vec!["A", "C"]));
    }

    #[test]
    fn non_interactive_aborts_before_rendering_or_reading() {
        let mut s = SelectionSession::new(
            ScriptedInput::non_interactive(),
            NullRenderer::default(),
            "t",
        );
        let out = s.run(vec!["A", "B"], &word()).unwrap();
        assert_eq!(out, SelectionOutcome::Aborted);
        assert_eq!(s.state(), SessionState::Aborted);
        assert_eq!(s.input().reads(), 0);
        assert_eq!(s.renderer().frames, 0);
    }

    #[test]
    fn closed_input_aborts() {
        let (out, state) = run(vec![Toggle]);
        assert_eq!(out, SelectionOutcome::Aborted);
        assert_eq!(state, SessionState::Aborted);
    }

    #[test]
    fn renders_once_per_non_terminal_event() {
        let mut s = SelectionSession::new(
            ScriptedInput::new([Down, Toggle, Confirm]),
            NullRenderer::default(),
            "t",
        );
        s.run(vec!["A", "B"], &word()).unwrap();
        // Initial frame + Down + Toggle.
        assert_eq!(s.renderer().frames, 3);
    }

    #[test]
    fn outcome_map_preserves_variant() {
        let out = SelectionOutcome::Confirmed(vec![1, 2]).map(|n| n * 10);
        assert_eq!(out, SelectionOutcome::Confirmed(vec![10, 20]));
        assert_eq!(SelectionOutcome::<u8>::Aborted.map(|n| n).label(), "aborted");
    }
}
