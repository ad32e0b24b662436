//! Terminal utilities for raw mode, the alternate screen, and sizing.
//!
//! Wraps crossterm's terminal operations and provides a RAII guard that
//! restores the terminal state on drop.

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::{queue, terminal};

use wterm_core::Viewport;

/// RAII guard that restores the terminal to its original mode on drop.
///
/// Entering enables raw mode, switches to the alternate screen so the tabs
/// never scribble over the user's scrollback, and turns on bracketed paste
/// so a paste arrives as one event.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        let guard = Self { _private: () };
        let mut stdout = io::stdout();
        enter_screen(&mut stdout)
            .and_then(|()| stdout.flush())
            .context("failed to enter alternate screen")?;
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Nothing more can be done if restoring fails here.
        let mut stdout = io::stdout();
        let _ = leave_screen(&mut stdout);
        let _ = stdout.flush();
        let _ = terminal::disable_raw_mode();
    }
}

fn enter_screen(out: &mut impl Write) -> io::Result<()> {
    queue!(out, terminal::EnterAlternateScreen, EnableBracketedPaste)
}

fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    queue!(out, DisableBracketedPaste, terminal::LeaveAlternateScreen)
}

/// Get the current terminal size as (columns, rows).
///
/// Falls back to (80, 24) if the size cannot be determined.
pub fn get_terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}

/// The area left for the remote shell once the status line takes the
/// bottom row.
pub fn pane_viewport(cols: u16, rows: u16) -> Viewport {
    Viewport::new(cols, rows.saturating_sub(1).max(1))
}
