//! Real-terminal frontend for [`SelectionSession`] using `crossterm`.
//!
//! Keys: `↑`/`k` up, `↓`/`j` down, `space`/`x` toggle, `enter` confirm,
//! `esc`/`q`/`ctrl-c` skip.  The prompt is drawn on stderr so stdout stays
//! clean for JSON output.

use std::io::{self, IsTerminal, Write};

use crossterm::cursor::MoveToPreviousLine;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;

use crate::provider::{Facet, Word};

use super::session::{
    InputEvent, InputSource, Renderer, SelectionOutcome, SelectionSession, SelectionView,
};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Whether a human can answer a prompt, given the environment.
pub fn environment_is_interactive(term: Option<&str>, stdin_tty: bool, stderr_tty: bool) -> bool {
    let dumb = matches!(term, Some(t) if t.trim().is_empty() || t == "dumb");
    stdin_tty && stderr_tty && !dumb
}

/// Map a key press to a session event.  Releases and repeats are ignored.
pub fn map_key(key: KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(InputEvent::Skip);
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(InputEvent::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(InputEvent::Down),
        KeyCode::Char(' ') | KeyCode::Char('x') => Some(InputEvent::Toggle),
        KeyCode::Enter => Some(InputEvent::Confirm),
        KeyCode::Esc | KeyCode::Char('q') => Some(InputEvent::Skip),
        _ => None,
    }
}

/// Reads key events from the controlling terminal.
#[derive(Debug)]
pub struct CrosstermInput {
    interactive: bool,
}

impl CrosstermInput {
    pub fn detect() -> Self {
        let term = std::env::var("TERM").ok();
        Self {
            interactive: environment_is_interactive(
                term.as_deref(),
                io::stdin().is_terminal(),
                io::stderr().is_terminal(),
            ),
        }
    }
}

impl InputSource for CrosstermInput {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn next_event(&mut self) -> io::Result<Option<InputEvent>> {
        loop {
            if let Event::Key(key) = event::read()? {
                if let Some(ev) = map_key(key) {
                    return Ok(Some(ev));
                }
            }
        }
    }
}

/// Raw mode for the lifetime of the guard.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Redraws the candidate list in place.
pub struct TerminalRenderer<W: Write> {
    out: W,
    drawn_lines: u16,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            drawn_lines: 0,
        }
    }

    fn clear_previous(&mut self) -> io::Result<()> {
        if self.drawn_lines > 0 {
            queue!(
                self.out,
                MoveToPreviousLine(self.drawn_lines),
                Clear(ClearType::FromCursorDown)
            )?;
            self.drawn_lines = 0;
        }
        Ok(())
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &SelectionView<'_>) -> io::Result<()> {
        self.clear_previous()?;

        let header = format!("{} for {}", view.title, view.word);
        queue!(
            self.out,
            Print(header.bold()),
            Print("  (↑/↓ move, space toggle, enter confirm, esc skip)\r\n")
        )?;
        for (i, label) in view.labels.iter().enumerate() {
            let pointer = if i == view.cursor { ">" } else { " " };
            let mark = if view.selected[i] { "[x]" } else { "[ ]" };
            let line = format!("{pointer} {mark} {label}");
            if i == view.cursor {
                queue!(self.out, Print(line.reverse()), Print("\r\n"))?;
            } else {
                queue!(self.out, Print(line), Print("\r\n"))?;
            }
        }
        self.drawn_lines = u16::try_from(view.labels.len() + 1).unwrap_or(u16::MAX);
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.clear_previous()?;
        self.out.flush()
    }
}

// ---------------------------------------------------------------------------
// CandidateSelector
// ---------------------------------------------------------------------------

/// Asks a human to pick among candidates of one facet.
///
/// Returns indices into `labels`, in ascending order.  Implementations block
/// and are called from a blocking thread.
pub trait CandidateSelector: Send + Sync {
    fn select(&self, facet: Facet, word: &Word, labels: &[String]) -> SelectionOutcome<usize>;
}

struct Choice {
    index: usize,
    label: String,
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

/// [`CandidateSelector`] backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalSelector;

impl TerminalSelector {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateSelector for TerminalSelector {
    fn select(&self, facet: Facet, word: &Word, labels: &[String]) -> SelectionOutcome<usize> {
        let input = CrosstermInput::detect();
        if !input.is_interactive() {
            log::info!("{facet}: terminal is not interactive, not asking");
            return SelectionOutcome::Aborted;
        }

        let choices: Vec<Choice> = labels
            .iter()
            .enumerate()
            .map(|(index, label)| Choice {
                index,
                label: label.clone(),
            })
            .collect();

        let result = RawModeGuard::enable().and_then(|_guard| {
            let title = format!("Select {facet}");
            let mut session =
                SelectionSession::new(input, TerminalRenderer::new(io::stderr()), title);
            session.run(choices, word)
        });

        match result {
            Ok(outcome) => outcome.map(|c| c.index),
            Err(e) => {
                log::warn!("{facet}: selection prompt failed ({e}); continuing without input");
                SelectionOutcome::Aborted
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::ScriptedInput;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn dumb_terminal_is_not_interactive() {
        assert!(!environment_is_interactive(Some("dumb"), true, true));
        assert!(!environment_is_interactive(Some(""), true, true));
        assert!(!environment_is_interactive(Some("xterm-256color"), false, true));
        assert!(!environment_is_interactive(Some("xterm-256color"), true, false));
        assert!(environment_is_interactive(Some("xterm-256color"), true, true));
        assert!(environment_is_interactive(None, true, true));
    }

    #[test]
    fn keys_map_to_events() {
        assert_eq!(map_key(press(KeyCode::Char('j'))), Some(InputEvent::Down));
        assert_eq!(map_key(press(KeyCode::Up)), Some(InputEvent::Up));
        assert_eq!(map_key(press(KeyCode::Char(' '))), Some(InputEvent::Toggle));
        assert_eq!(map_key(press(KeyCode::Enter)), Some(InputEvent::Confirm));
        assert_eq!(map_key(press(KeyCode::Esc)), Some(InputEvent::Skip));
        assert_eq!(map_key(press(KeyCode::Char('z'))), None);
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(InputEvent::Skip)
        );
    }

    #[test]
    fn key_release_is_ignored() {
        let mut key = press(KeyCode::Enter);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }

    #[test]
    fn renderer_marks_cursor_and_selection() {
        let word = Word::new("学习").unwrap();
        let mut session = SelectionSession::new(
            ScriptedInput::new([InputEvent::Toggle, InputEvent::Confirm]),
            TerminalRenderer::new(Vec::<u8>::new()),
            "Select audio",
        );
        let out = session.run(vec!["alloy", "nova"], &word).unwrap();
        assert_eq!(out, SelectionOutcome::Confirmed(vec!["alloy"]));

        let text = String::from_utf8_lossy(&session.renderer().out).into_owned();
        assert!(text.contains("Select audio for 学习"));
        assert!(text.contains("[x] alloy"));
        assert!(text.contains("[ ] nova"));
    }
}
