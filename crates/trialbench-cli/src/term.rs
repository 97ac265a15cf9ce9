//! Terminal presentation and input for live sessions.
//!
//! The terminal runs in raw mode for the whole session so single keypresses
//! arrive without a newline; [`RawModeGuard`] restores the terminal on drop,
//! including the early-exit paths.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use trialbench_core::stimulus::{PositionMap, Side, StimulusItem};
use trialbench_core::trial::{AdvanceEvent, ResponseEvent, TrialContext};
use trialbench_core::{BlockReport, Presenter, Responder, TrialOutcome};

/// Keys accepted as a left / right response.
fn response_side(key: KeyCode) -> Option<Side> {
    match key {
        KeyCode::Left | KeyCode::Char('f') | KeyCode::Char('F') => Some(Side::Left),
        KeyCode::Right | KeyCode::Char('j') | KeyCode::Char('J') => Some(Side::Right),
        _ => None,
    }
}

/// Enables raw mode for its lifetime.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// Text renderer for trials. Raw mode needs explicit carriage returns, so
/// every line ends with `\r\n`.
pub struct TermPresenter;

impl TermPresenter {
    fn line(&self, text: &str) {
        print!("{text}\r\n");
    }
}

impl Presenter for TermPresenter {
    fn fixation(&mut self) {
        self.line("");
        self.line("        +");
        self.line("");
    }

    fn study_item(&mut self, item: &StimulusItem) {
        self.line(&format!("        {}   —   {}", item.id, item.label));
        self.line("  (press space to continue, esc to quit)");
    }

    fn stimulus(&mut self, item: &StimulusItem) {
        self.line(&format!("        {}", item.id));
    }

    fn prompt(&mut self, positions: &PositionMap) {
        self.line(&format!(
            "   [{}] {:<8} {:>8} [{}]",
            "f",
            positions.label_on(Side::Left).to_string(),
            positions.label_on(Side::Right).to_string(),
            "j",
        ));
    }

    fn feedback(&mut self, outcome: &TrialOutcome) {
        let verdict = if outcome.response.is_none() {
            "too slow"
        } else if outcome.correct {
            "correct"
        } else {
            "wrong"
        };
        self.line(&format!("        -> {verdict}"));
    }

    fn rest(&mut self, report: &BlockReport, total_blocks: usize) {
        self.line("");
        self.line(&format!(
            "Block {}/{} done — accuracy {:.1}%",
            report.index + 1,
            total_blocks,
            report.accuracy() * 100.0
        ));
        self.line("Rest, then press space to continue.");
        wait_for_advance();
    }
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Keyboard input with a bounded response window.
pub struct TermResponder;

impl Responder for TermResponder {
    fn await_response(&mut self, _ctx: &TrialContext<'_>, timeout: Duration) -> ResponseEvent {
        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return ResponseEvent::TimedOut;
            }
            match poll_key(deadline - now) {
                Ok(Some(KeyCode::Esc)) => return ResponseEvent::Aborted,
                Ok(Some(key)) => {
                    if let Some(side) = response_side(key) {
                        return ResponseEvent::Responded {
                            side,
                            elapsed: start.elapsed(),
                        };
                    }
                    // Unmapped keys are ignored; the window keeps running.
                }
                Ok(None) => return ResponseEvent::TimedOut,
                Err(e) => {
                    eprintln!("terminal input failed: {e}\r");
                    return ResponseEvent::Aborted;
                }
            }
        }
    }

    fn await_advance(&mut self) -> AdvanceEvent {
        let start = Instant::now();
        loop {
            match poll_key(Duration::from_secs(3600)) {
                Ok(Some(KeyCode::Esc)) => return AdvanceEvent::Aborted,
                Ok(Some(KeyCode::Char(' ')) | Some(KeyCode::Enter)) => {
                    return AdvanceEvent::Advanced {
                        elapsed: start.elapsed(),
                    };
                }
                Ok(_) => continue,
                Err(e) => {
                    eprintln!("terminal input failed: {e}\r");
                    return AdvanceEvent::Aborted;
                }
            }
        }
    }
}

/// Block up to `timeout` for one key press. `Ok(None)` means the window
/// elapsed quietly.
fn poll_key(timeout: Duration) -> std::io::Result<Option<KeyCode>> {
    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        if event::poll(deadline - now)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind == KeyEventKind::Press {
                return Ok(Some(key.code));
            }
        }
    }
}

fn wait_for_advance() {
    loop {
        match poll_key(Duration::from_secs(3600)) {
            Ok(Some(KeyCode::Char(' ')) | Some(KeyCode::Enter) | Some(KeyCode::Esc)) => return,
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}
