//! Virtual keyboard encoding: logical keys, sticky modifiers, and swipes.
//!
//! The encoder turns three kinds of input into the literal byte sequences a
//! remote shell expects:
//!
//! - virtual key tokens (`"Esc"`, `"↑"`, `"F5"`, `"|"`, ...)
//! - physical keystrokes while a sticky Ctrl/Alt modifier is armed
//! - touch drags over the key row, mapped to arrow keys
//!
//! Modifiers follow a two-step protocol: pressing `Ctrl` or `Alt` arms the
//! modifier, and the next matching key resolves it into a chord and disarms
//! it. Pressing the armed modifier again cancels it; pressing the other one
//! replaces it.

use std::fmt;

use tracing::trace;

/// Minimum dominant-axis drag distance (device-independent pixels) that
/// counts as a swipe.
pub const SWIPE_THRESHOLD: f32 = 30.0;

const ESC: &str = "\x1b";
const UP: &str = "\x1b[A";
const DOWN: &str = "\x1b[B";
const RIGHT: &str = "\x1b[C";
const LEFT: &str = "\x1b[D";

/// Letters offered on the combo row while Ctrl is armed.
pub const CTRL_COMBO_ROW: &[&str] = &["C", "D", "Z", "L", "A", "E", "U", "K", "W", "R", "X", "V"];

/// Letters offered on the combo row while Alt is armed.
pub const ALT_COMBO_ROW: &[&str] = &["B", "F", "D"];

/// Sequence for a direct (non-modifier) key token. Case-sensitive.
pub fn direct_sequence(token: &str) -> Option<&'static str> {
    let seq = match token {
        "Esc" => ESC,
        "Tab" => "\t",
        "↑" => UP,
        "↓" => DOWN,
        "→" => RIGHT,
        "←" => LEFT,
        "Home" => "\x1b[H",
        "End" => "\x1b[F",
        "PgUp" => "\x1b[5~",
        "PgDn" => "\x1b[6~",
        "Del" => "\x1b[3~",
        "Ins" => "\x1b[2~",
        "F1" => "\x1bOP",
        "F2" => "\x1bOQ",
        "F3" => "\x1bOR",
        "F4" => "\x1bOS",
        "F5" => "\x1b[15~",
        "F6" => "\x1b[17~",
        "F7" => "\x1b[18~",
        "F8" => "\x1b[19~",
        "F9" => "\x1b[20~",
        "F10" => "\x1b[21~",
        "F11" => "\x1b[23~",
        "F12" => "\x1b[24~",
        "/" => "/",
        "|" => "|",
        "\\" => "\\",
        "-" => "-",
        "_" => "_",
        "~" => "~",
        ":" => ":",
        ";" => ";",
        "'" => "'",
        "\"" => "\"",
        "`" => "`",
        "[" => "[",
        "]" => "]",
        "{" => "{",
        "}" => "}",
        "<" => "<",
        ">" => ">",
        "&" => "&",
        "*" => "*",
        "$" => "$",
        _ => return None,
    };
    Some(seq)
}

/// Control byte for Ctrl+letter. Case-insensitive.
pub fn ctrl_combo(key: &str) -> Option<&'static str> {
    let seq = match key.to_uppercase().as_str() {
        "A" => "\x01",
        "C" => "\x03",
        "D" => "\x04",
        "E" => "\x05",
        "K" => "\x0b",
        "L" => "\x0c",
        "R" => "\x12",
        "U" => "\x15",
        "V" => "\x16",
        "W" => "\x17",
        "X" => "\x18",
        "Z" => "\x1a",
        _ => return None,
    };
    Some(seq)
}

/// Readline word-motion sequence for Alt+letter. Case-insensitive.
pub fn alt_combo(key: &str) -> Option<&'static str> {
    let seq = match key.to_uppercase().as_str() {
        "B" => "\x1bb",
        "D" => "\x1bd",
        "F" => "\x1bf",
        _ => return None,
    };
    Some(seq)
}

/// Arrow sequence for a drag of `(dx, dy)`, or `None` below the threshold.
///
/// The drag is horizontal when `|dx| > |dy|`, vertical otherwise; screen
/// coordinates grow downwards, so a positive `dy` is a swipe down.
pub fn swipe_sequence(dx: f32, dy: f32) -> Option<&'static str> {
    if dx.abs() > dy.abs() {
        if dx > SWIPE_THRESHOLD {
            Some(RIGHT)
        } else if dx < -SWIPE_THRESHOLD {
            Some(LEFT)
        } else {
            None
        }
    } else if dy > SWIPE_THRESHOLD {
        Some(DOWN)
    } else if dy < -SWIPE_THRESHOLD {
        Some(UP)
    } else {
        None
    }
}

/// A sticky modifier key on the virtual keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Alt,
}

impl Modifier {
    /// Parse the modifier key tokens `"Ctrl"` and `"Alt"`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Ctrl" => Some(Self::Ctrl),
            "Alt" => Some(Self::Alt),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ctrl => f.write_str("Ctrl"),
            Self::Alt => f.write_str("Alt"),
        }
    }
}

/// Modifier state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifierState {
    #[default]
    Idle,
    CtrlArmed,
    AltArmed,
}

impl ModifierState {
    pub fn armed(&self) -> Option<Modifier> {
        match self {
            Self::Idle => None,
            Self::CtrlArmed => Some(Modifier::Ctrl),
            Self::AltArmed => Some(Modifier::Alt),
        }
    }

    fn for_modifier(modifier: Modifier) -> Self {
        match modifier {
            Modifier::Ctrl => Self::CtrlArmed,
            Modifier::Alt => Self::AltArmed,
        }
    }
}

/// What happens to a physical keystroke offered to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// No modifier armed; the terminal handles the key itself.
    PassThrough,
    /// The key resolved an armed modifier into this sequence.
    Encoded(String),
    /// A modifier is armed but nothing matched; the key goes nowhere.
    Dropped,
}

/// Which extra row of the virtual keyboard is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRow {
    Main,
    Symbols,
    Function,
    Navigation,
}

impl KeyRow {
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Main => &["Esc", "Ctrl", "Alt", "Tab", "↑", "↓", "←", "→", "/", "-", "|"],
            Self::Symbols => &["~", "`", "[", "]", "{", "}", "<", ">", "\\", "_", ":"],
            Self::Function => &[
                "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
            ],
            Self::Navigation => &["Home", "End", "PgUp", "PgDn", "Del", "Ins"],
        }
    }
}

/// Encoder state shared by whichever session is active.
#[derive(Debug, Default)]
pub struct KeyEncoder {
    modifier: ModifierState,
    touch_origin: Option<(f32, f32)>,
}

impl KeyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifier(&self) -> ModifierState {
        self.modifier
    }

    /// Toggle a modifier: arm it, cancel it if already armed, or replace the
    /// other armed modifier.
    pub fn toggle(&mut self, modifier: Modifier) {
        self.modifier = if self.modifier.armed() == Some(modifier) {
            ModifierState::Idle
        } else {
            ModifierState::for_modifier(modifier)
        };
        trace!(state = ?self.modifier, "modifier toggled");
    }

    pub fn cancel_modifier(&mut self) {
        self.modifier = ModifierState::Idle;
    }

    /// Letters to offer while a modifier is armed (empty when idle).
    pub fn combo_row(&self) -> &'static [&'static str] {
        match self.modifier {
            ModifierState::Idle => &[],
            ModifierState::CtrlArmed => CTRL_COMBO_ROW,
            ModifierState::AltArmed => ALT_COMBO_ROW,
        }
    }

    /// Press a key on the virtual keyboard.
    ///
    /// Returns the sequence to send, if any. Modifier tokens only change state.
    pub fn press_virtual(&mut self, token: &str) -> Option<String> {
        if let Some(modifier) = Modifier::from_token(token) {
            self.toggle(modifier);
            return None;
        }

        let combo = match self.modifier {
            ModifierState::CtrlArmed => ctrl_combo(token),
            ModifierState::AltArmed => alt_combo(token),
            ModifierState::Idle => None,
        };
        if let Some(seq) = combo {
            self.modifier = ModifierState::Idle;
            return Some(seq.to_string());
        }

        direct_sequence(token).map(str::to_string)
    }

    /// Offer a physical keystroke, identified by its key value (`"b"`, `"B"`,
    /// `"Enter"`, ...), before the terminal sees it.
    pub fn press_physical(&mut self, key: &str) -> Interception {
        let seq = match self.modifier {
            ModifierState::Idle => return Interception::PassThrough,
            ModifierState::CtrlArmed => ctrl_combo(key).map(str::to_string),
            ModifierState::AltArmed => alt_combo(key)
                .map(str::to_string)
                .or_else(|| alt_fallback(key)),
        };

        match seq {
            Some(seq) => {
                self.modifier = ModifierState::Idle;
                Interception::Encoded(seq)
            }
            None => {
                trace!(key, state = ?self.modifier, "keystroke dropped while modifier armed");
                Interception::Dropped
            }
        }
    }

    /// Record where a touch drag began.
    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.touch_origin = Some((x, y));
    }

    /// Resolve a touch drag ending at `(x, y)` into at most one arrow sequence.
    pub fn touch_end(&mut self, x: f32, y: f32) -> Option<&'static str> {
        let (x0, y0) = self.touch_origin.take()?;
        swipe_sequence(x - x0, y - y0)
    }

    /// Forget an in-progress drag (touch cancelled by the platform).
    pub fn touch_cancel(&mut self) {
        self.touch_origin = None;
    }
}

/// Generic Alt chord: ESC followed by the lowercased key. Only single
/// characters qualify; named keys such as `"Enter"` or `"Shift"` do not.
fn alt_fallback(key: &str) -> Option<String> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(format!("{ESC}{}", c.to_lowercase())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_then_virtual_c_sends_etx() {
        let mut enc = KeyEncoder::new();
        assert_eq!(enc.press_virtual("Ctrl"), None);
        assert_eq!(enc.modifier(), ModifierState::CtrlArmed);
        assert_eq!(enc.press_virtual("C").as_deref(), Some("\x03"));
        assert_eq!(enc.modifier(), ModifierState::Idle);
    }

    #[test]
    fn ctrl_twice_cancels() {
        let mut enc = KeyEncoder::new();
        assert_eq!(enc.press_virtual("Ctrl"), None);
        assert_eq!(enc.press_virtual("Ctrl"), None);
        assert_eq!(enc.modifier(), ModifierState::Idle);
    }

    #[test]
    fn other_modifier_replaces_armed_one() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Ctrl");
        enc.press_virtual("Alt");
        assert_eq!(enc.modifier(), ModifierState::AltArmed);
        assert_eq!(enc.combo_row(), ALT_COMBO_ROW);
    }

    #[test]
    fn ctrl_virtual_combo_is_case_insensitive() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Ctrl");
        assert_eq!(enc.press_virtual("z").as_deref(), Some("\x1a"));
    }

    #[test]
    fn ctrl_armed_non_combo_virtual_key_falls_through() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Ctrl");
        assert_eq!(enc.press_virtual("↑").as_deref(), Some("\x1b[A"));
        // Only resolving a combo disarms.
        assert_eq!(enc.modifier(), ModifierState::CtrlArmed);
    }

    #[test]
    fn alt_armed_virtual_combo_letter() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Alt");
        assert_eq!(enc.press_virtual("F").as_deref(), Some("\x1bf"));
        assert_eq!(enc.modifier(), ModifierState::Idle);
    }

    #[test]
    fn unknown_virtual_token_sends_nothing() {
        let mut enc = KeyEncoder::new();
        assert_eq!(enc.press_virtual("Hyper"), None);
        assert_eq!(enc.press_virtual("esc"), None);
    }

    #[test]
    fn direct_table_samples() {
        assert_eq!(direct_sequence("Esc"), Some("\x1b"));
        assert_eq!(direct_sequence("Tab"), Some("\t"));
        assert_eq!(direct_sequence("PgDn"), Some("\x1b[6~"));
        assert_eq!(direct_sequence("F1"), Some("\x1bOP"));
        assert_eq!(direct_sequence("F12"), Some("\x1b[24~"));
        assert_eq!(direct_sequence("|"), Some("|"));
        assert_eq!(direct_sequence("Ctrl"), None);
    }

    #[test]
    fn every_key_row_entry_is_mapped() {
        for row in [KeyRow::Main, KeyRow::Symbols, KeyRow::Function, KeyRow::Navigation] {
            for key in row.keys() {
                assert!(
                    direct_sequence(key).is_some() || Modifier::from_token(key).is_some(),
                    "unmapped key {key:?} in {row:?}"
                );
            }
        }
        for key in CTRL_COMBO_ROW {
            assert!(ctrl_combo(key).is_some());
        }
        for key in ALT_COMBO_ROW {
            assert!(alt_combo(key).is_some());
        }
    }

    #[test]
    fn physical_key_passes_through_when_idle() {
        let mut enc = KeyEncoder::new();
        assert_eq!(enc.press_physical("b"), Interception::PassThrough);
    }

    #[test]
    fn alt_then_physical_b_uses_alt_table() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Alt");
        assert_eq!(
            enc.press_physical("b"),
            Interception::Encoded("\x1b\x62".into())
        );
        assert_eq!(enc.modifier(), ModifierState::Idle);
    }

    #[test]
    fn alt_then_physical_other_letter_uses_fallback() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Alt");
        assert_eq!(enc.press_physical("X"), Interception::Encoded("\x1bx".into()));
    }

    #[test]
    fn alt_then_named_key_is_dropped_and_stays_armed() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Alt");
        assert_eq!(enc.press_physical("Shift"), Interception::Dropped);
        assert_eq!(enc.modifier(), ModifierState::AltArmed);
        assert_eq!(enc.press_physical("B"), Interception::Encoded("\x1bb".into()));
    }

    #[test]
    fn ctrl_then_physical_unmapped_is_dropped() {
        let mut enc = KeyEncoder::new();
        enc.press_virtual("Ctrl");
        assert_eq!(enc.press_physical("q"), Interception::Dropped);
        assert_eq!(enc.press_physical("d"), Interception::Encoded("\x04".into()));
        assert_eq!(enc.press_physical("d"), Interception::PassThrough);
    }

    #[test]
    fn cancel_clears_modifier() {
        let mut enc = KeyEncoder::new();
        enc.toggle(Modifier::Ctrl);
        enc.cancel_modifier();
        assert_eq!(enc.modifier(), ModifierState::Idle);
        assert!(enc.combo_row().is_empty());
    }

    #[test]
    fn swipe_right() {
        let mut enc = KeyEncoder::new();
        enc.touch_start(100.0, 100.0);
        assert_eq!(enc.touch_end(140.0, 105.0), Some("\x1b[C"));
    }

    #[test]
    fn short_swipe_is_ignored() {
        let mut enc = KeyEncoder::new();
        enc.touch_start(100.0, 100.0);
        assert_eq!(enc.touch_end(110.0, 105.0), None);
    }

    #[test]
    fn swipe_directions() {
        assert_eq!(swipe_sequence(-31.0, 0.0), Some("\x1b[D"));
        assert_eq!(swipe_sequence(0.0, 31.0), Some("\x1b[B"));
        assert_eq!(swipe_sequence(5.0, -45.0), Some("\x1b[A"));
        // Exactly at the threshold does not count.
        assert_eq!(swipe_sequence(30.0, 0.0), None);
        // Ties go to the vertical axis.
        assert_eq!(swipe_sequence(40.0, 40.0), Some("\x1b[B"));
    }

    #[test]
    fn touch_end_without_start_and_origin_reset() {
        let mut enc = KeyEncoder::new();
        assert_eq!(enc.touch_end(500.0, 0.0), None);
        enc.touch_start(0.0, 0.0);
        assert!(enc.touch_end(0.0, 100.0).is_some());
        // Origin is consumed by the first resolution.
        assert_eq!(enc.touch_end(0.0, 200.0), None);
        enc.touch_start(0.0, 0.0);
        enc.touch_cancel();
        assert_eq!(enc.touch_end(0.0, 100.0), None);
    }
}
