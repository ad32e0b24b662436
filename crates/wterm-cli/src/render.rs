//! Draws the active tab's screen and the status line onto the local
//! terminal.
//!
//! The active pane is redrawn in full when the active tab or the terminal
//! size changes, and incrementally (`vt100` screen diffs) otherwise. The
//! status line occupies the bottom row.

use std::io::{self, Write};

use wterm_client::{RegistrySnapshot, SessionId, SessionRegistry, Vt100Surface};
use wterm_core::ModifierState;

pub struct Renderer {
    rows: u16,
    /// Tab and screen drawn last, for incremental updates.
    shown: Option<(SessionId, vt100::Screen)>,
}

impl Renderer {
    pub fn new(rows: u16) -> Self {
        Self { rows, shown: None }
    }

    /// The terminal changed size; the next draw starts from scratch.
    pub fn resize(&mut self, rows: u16) {
        self.rows = rows;
        self.shown = None;
    }

    pub fn draw(
        &mut self,
        registry: &SessionRegistry<Vt100Surface>,
        snapshot: &RegistrySnapshot,
        modifier: ModifierState,
        prefix: bool,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let active = registry.active();
        let mut buf = Vec::new();

        match active.bridge() {
            Some(bridge) => {
                let screen = bridge.surface().screen();
                match &self.shown {
                    Some((id, prev)) if *id == active.id() => {
                        buf.extend_from_slice(&screen.contents_diff(prev))
                    }
                    _ => buf.extend_from_slice(&screen.contents_formatted()),
                }
                self.shown = Some((active.id(), screen.clone()));

                buf.extend_from_slice(status_line(snapshot, modifier, prefix, self.rows).as_bytes());
                let (row, col) = screen.cursor_position();
                buf.extend_from_slice(format!("\x1b[{};{}H", row + 1, col + 1).as_bytes());
                if !screen.hide_cursor() {
                    buf.extend_from_slice(b"\x1b[?25h");
                }
            }
            None => {
                self.shown = None;
                let detail = if active.is_connecting() {
                    "connecting..."
                } else {
                    active.last_error().unwrap_or("not connected")
                };
                buf.extend_from_slice(b"\x1b[H\x1b[2J");
                buf.extend_from_slice(format!("{}: {detail}\r\n", active.title()).as_bytes());
                buf.extend_from_slice(status_line(snapshot, modifier, prefix, self.rows).as_bytes());
            }
        }

        out.write_all(&buf)?;
        out.flush()
    }
}

/// Bottom-row tab strip, e.g. `[1 root@10.0.0.5] [2 db*]  CTRL`.
fn status_line(
    snapshot: &RegistrySnapshot,
    modifier: ModifierState,
    prefix: bool,
    rows: u16,
) -> String {
    let mut line = format!("\x1b[?25l\x1b[{rows};1H\x1b[2K\x1b[7m");
    for (i, tab) in snapshot.tabs.iter().enumerate() {
        let marker = if tab.id == snapshot.active { "*" } else { "" };
        let state = match (tab.connected, tab.connecting) {
            (_, true) => " (...)",
            (true, false) => "",
            (false, false) => " (off)",
        };
        line.push_str(&format!("[{} {}{state}{marker}] ", i + 1, tab.title));
    }
    match modifier {
        ModifierState::CtrlArmed => line.push_str(" CTRL"),
        ModifierState::AltArmed => line.push_str(" ALT"),
        ModifierState::Idle => {}
    }
    if prefix {
        line.push_str(" ^]");
    }
    line.push_str("\x1b[0m");
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use wterm_client::TabView;

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot {
            tabs: vec![
                TabView {
                    id: SessionId(1),
                    title: "root@10.0.0.5".into(),
                    connected: true,
                    connecting: false,
                    last_error: None,
                    channel: None,
                },
                TabView {
                    id: SessionId(2),
                    title: "New Connection".into(),
                    connected: false,
                    connecting: false,
                    last_error: None,
                    channel: None,
                },
            ],
            active: SessionId(1),
        }
    }

    #[test]
    fn status_line_marks_active_tab_and_modifier() {
        let line = status_line(&snapshot(), ModifierState::CtrlArmed, true, 24);
        assert!(line.starts_with("\x1b[?25l\x1b[24;1H"));
        assert!(line.contains("[1 root@10.0.0.5*]"));
        assert!(line.contains("[2 New Connection (off)]"));
        assert!(line.contains(" CTRL ^]"));
    }

    #[test]
    fn status_line_shows_pending_connect() {
        let mut snapshot = snapshot();
        snapshot.tabs[1].connecting = true;
        let line = status_line(&snapshot, ModifierState::Idle, false, 24);
        assert!(line.contains("[2 New Connection (...)]"));
    }

    #[test]
    fn idle_status_line_has_no_indicators() {
        let line = status_line(&snapshot(), ModifierState::Idle, false, 10);
        assert!(!line.contains("CTRL"));
        assert!(!line.contains("^]"));
    }
}
