//! Input routing: physical keystrokes, virtual keys, and swipe gestures
//! funnelled into the active session.
//!
//! Physical keystrokes are offered to the modifier encoder before the
//! emulator's own key handling, so an armed Ctrl or Alt consumes the next
//! key even when the terminal would otherwise handle it.

use tracing::trace;

use wterm_core::keyboard::{Interception, KeyEncoder, ModifierState};

use crate::registry::SessionRegistry;
use crate::surface::TerminalSurface;

/// One consumer of a physical keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStage {
    /// The sticky-modifier encoder.
    ModifierInterception,
    /// The terminal emulator's own key handling.
    Emulator,
}

/// Order in which stages see a physical keystroke.
pub const ROUTING_ORDER: [InputStage; 2] = [InputStage::ModifierInterception, InputStage::Emulator];

/// Shared keyboard state in front of the registry.
#[derive(Debug, Default)]
pub struct InputRouter {
    encoder: KeyEncoder,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoder(&self) -> &KeyEncoder {
        &self.encoder
    }

    pub fn modifier(&self) -> ModifierState {
        self.encoder.modifier()
    }

    pub fn encoder_mut(&mut self) -> &mut KeyEncoder {
        &mut self.encoder
    }

    /// Resolve a physical keystroke.
    ///
    /// `key` is the key value (`"c"`, `"Enter"`); `emulated` is what the
    /// emulator would send for it. Returns the data to forward, if any.
    pub fn route_physical(&mut self, key: &str, emulated: &str) -> Option<String> {
        for stage in ROUTING_ORDER {
            match stage {
                InputStage::ModifierInterception => match self.encoder.press_physical(key) {
                    Interception::PassThrough => continue,
                    Interception::Encoded(seq) => return Some(seq),
                    Interception::Dropped => return None,
                },
                InputStage::Emulator => {
                    return (!emulated.is_empty()).then(|| emulated.to_string());
                }
            }
        }
        None
    }

    /// Route a physical keystroke to the active session.
    pub fn physical<S: TerminalSurface>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        key: &str,
        emulated: &str,
    ) -> bool {
        match self.route_physical(key, emulated) {
            Some(data) => registry.send_input(&data),
            None => false,
        }
    }

    /// Press a virtual key and send its sequence to the active session.
    pub fn virtual_key<S: TerminalSurface>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        token: &str,
    ) -> bool {
        match self.encoder.press_virtual(token) {
            Some(seq) => registry.send_input(&seq),
            None => {
                trace!(token, state = ?self.encoder.modifier(), "virtual key produced no input");
                false
            }
        }
    }

    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.encoder.touch_start(x, y);
    }

    /// Finish a drag; a swipe past the threshold sends one arrow key.
    pub fn touch_end<S: TerminalSurface>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        x: f32,
        y: f32,
    ) -> bool {
        match self.encoder.touch_end(x, y) {
            Some(seq) => registry.send_input(seq),
            None => false,
        }
    }
}
