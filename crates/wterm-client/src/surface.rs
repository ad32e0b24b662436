//! Terminal emulator surfaces.
//!
//! A surface is the emulator widget a bridge renders into. Each bridge owns
//! exactly one surface and releases it on teardown.

use wterm_core::messages::Viewport;

/// Scrollback kept by [`Vt100Surface`], in lines.
const SCROLLBACK_LINES: usize = 1000;

/// The emulator widget behind one terminal tab.
pub trait TerminalSurface: Send {
    /// Append output to the render buffer.
    fn write(&mut self, data: &str);

    /// Size the widget would like after its layout pass, if it has one.
    fn proposed_viewport(&self) -> Option<Viewport>;

    /// Apply a new viewport size.
    fn resize(&mut self, viewport: Viewport);

    /// Release the widget. Nothing is rendered afterwards.
    fn dispose(&mut self);
}

/// Inline notice in the given SGR color, on its own line.
pub fn notice(color: NoticeColor, text: &str) -> String {
    format!("\r\n\x1b[{}m{text}\x1b[0m\r\n", color.sgr())
}

/// Colors used for inline notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeColor {
    /// Remote errors.
    Red,
    /// Connection state changes.
    Yellow,
}

impl NoticeColor {
    fn sgr(&self) -> u8 {
        match self {
            Self::Red => 31,
            Self::Yellow => 33,
        }
    }
}

/// Surface backed by an in-memory VT100 emulator.
pub struct Vt100Surface {
    parser: vt100::Parser,
    disposed: bool,
}

impl Vt100Surface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            parser: vt100::Parser::new(viewport.rows, viewport.cols, SCROLLBACK_LINES),
            disposed: false,
        }
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Default for Vt100Surface {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl TerminalSurface for Vt100Surface {
    fn write(&mut self, data: &str) {
        if !self.disposed {
            self.parser.process(data.as_bytes());
        }
    }

    fn proposed_viewport(&self) -> Option<Viewport> {
        if self.disposed {
            return None;
        }
        let (rows, cols) = self.parser.screen().size();
        Some(Viewport::new(cols, rows))
    }

    fn resize(&mut self, viewport: Viewport) {
        if !self.disposed && !viewport.is_empty() {
            self.parser.set_size(viewport.rows, viewport.cols);
        }
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}
