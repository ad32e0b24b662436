//! Per-session terminal bridge.
//!
//! A `TerminalBridge` owns one channel and one terminal surface and
//! translates between them:
//!
//! - keystrokes and encoded key sequences go out as `input` messages
//! - viewport changes go out as `resize` messages, only while `Open`
//! - `output` messages are appended to the surface in arrival order
//! - `error` messages are shown as inline notices
//!
//! Status only moves forward: `Connecting → Open → Closed`. A closed bridge
//! never reopens; the registry must connect again and build a new one.

use tracing::{debug, info, trace, warn};

use wterm_core::codec::{decode_server, encode_client};
use wterm_core::error::WtermResult;
use wterm_core::messages::{ClientMessage, ServerMessage, Viewport};

use crate::surface::{notice, NoticeColor, TerminalSurface};
use crate::transport::{BridgeId, ChannelConnector, ChannelEvent, ChannelSink, EventSender};

/// Lifecycle of the bridge's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Waiting for the transport handshake.
    Connecting,
    /// Messages flow both ways.
    Open,
    /// Terminal state; the bridge must be discarded.
    Closed,
}

/// Adapter between one channel and one terminal surface.
pub struct TerminalBridge<S: TerminalSurface> {
    id: BridgeId,
    handle: String,
    status: ChannelStatus,
    /// Latest size reported by the surface's layout pass.
    measured: Option<Viewport>,
    /// Size last sent to the remote side.
    sent_viewport: Option<Viewport>,
    surface: S,
    channel: Option<Box<dyn ChannelSink>>,
    released: bool,
}

impl<S: TerminalSurface> TerminalBridge<S> {
    /// Open a channel for `handle` and attach `surface` to it.
    ///
    /// The surface's proposed size is taken as its first layout pass and is
    /// sent as soon as the channel opens.
    pub fn open(
        id: BridgeId,
        handle: impl Into<String>,
        mut surface: S,
        connector: &dyn ChannelConnector,
        events: EventSender,
    ) -> WtermResult<Self> {
        let handle = handle.into();
        let channel = match connector.open(&handle, id, events) {
            Ok(channel) => channel,
            Err(e) => {
                surface.dispose();
                return Err(e);
            }
        };

        let measured = surface.proposed_viewport().filter(|vp| !vp.is_empty());
        debug!(bridge = %id, handle = %handle, ?measured, "bridge connecting");

        Ok(Self {
            id,
            handle,
            status: ChannelStatus::Connecting,
            measured,
            sent_viewport: None,
            surface,
            channel: Some(channel),
            released: false,
        })
    }

    pub fn id(&self) -> BridgeId {
        self.id
    }

    /// The gateway-issued session handle this channel is addressed by.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// The viewport size last sent to the remote side.
    pub fn viewport(&self) -> Option<Viewport> {
        self.sent_viewport
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Layout pass: the surface now has `viewport` cells.
    ///
    /// Sends a `resize` when the channel is open and the size differs from
    /// the last one sent.
    pub fn fit(&mut self, viewport: Viewport) {
        if self.released || viewport.is_empty() {
            return;
        }
        self.surface.resize(viewport);
        self.measured = Some(viewport);

        if self.status == ChannelStatus::Open && self.sent_viewport != Some(viewport) {
            self.send_resize(viewport);
        }
    }

    /// Forward raw input (keystrokes, paste, encoded key sequences).
    ///
    /// Returns `false` when the input was not sent because the channel is
    /// not open.
    pub fn send_input(&mut self, data: &str) -> bool {
        if data.is_empty() {
            return false;
        }
        self.send(&ClientMessage::input(data))
    }

    /// Send a keep-alive ping.
    pub fn ping(&mut self) -> bool {
        self.send(&ClientMessage::Ping)
    }

    /// Apply one channel event and return the resulting status.
    pub fn handle_event(&mut self, event: ChannelEvent) -> ChannelStatus {
        if self.status == ChannelStatus::Closed {
            trace!(bridge = %self.id, ?event, "event after close ignored");
            return self.status;
        }

        match event {
            ChannelEvent::Opened => {
                if self.status == ChannelStatus::Connecting {
                    info!(bridge = %self.id, "channel open");
                    self.status = ChannelStatus::Open;
                    if let Some(viewport) = self.measured {
                        self.send_resize(viewport);
                    }
                }
            }
            ChannelEvent::Message(frame) => self.on_message(&frame),
            ChannelEvent::Error(reason) => {
                warn!(bridge = %self.id, "channel error: {reason}");
                self.surface.write(&notice(NoticeColor::Red, &reason));
                self.mark_closed();
            }
            ChannelEvent::Closed => {
                info!(bridge = %self.id, "channel closed by remote");
                self.mark_closed();
            }
        }
        self.status
    }

    /// Detach from the channel, close it, and release the surface.
    ///
    /// Runs regardless of channel state and is idempotent; `Drop` calls it.
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.status = ChannelStatus::Closed;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.surface.dispose();
        debug!(bridge = %self.id, "bridge released");
    }

    fn on_message(&mut self, frame: &str) {
        match decode_server(frame) {
            Ok(ServerMessage::Output { data }) => self.surface.write(&data),
            Ok(ServerMessage::Error { message }) => {
                warn!(bridge = %self.id, "remote error: {message}");
                self.surface.write(&notice(NoticeColor::Red, &message));
            }
            Ok(ServerMessage::Pong) => trace!(bridge = %self.id, "received pong"),
            Err(e) => warn!(bridge = %self.id, "failed to parse message: {e}"),
        }
    }

    fn send_resize(&mut self, viewport: Viewport) {
        if self.send(&ClientMessage::resize(viewport)) {
            self.sent_viewport = Some(viewport);
        }
    }

    fn send(&mut self, msg: &ClientMessage) -> bool {
        if self.status != ChannelStatus::Open {
            trace!(bridge = %self.id, kind = msg.kind(), status = ?self.status, "dropped outbound message");
            return false;
        }
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };

        let frame = match encode_client(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(bridge = %self.id, "failed to encode {}: {e}", msg.kind());
                return false;
            }
        };
        match channel.send_text(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(bridge = %self.id, "failed to send {}: {e}", msg.kind());
                false
            }
        }
    }

    /// Enter the terminal state. The surface stays readable until teardown.
    fn mark_closed(&mut self) {
        self.status = ChannelStatus::Closed;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.surface
            .write(&notice(NoticeColor::Yellow, "Connection closed."));
    }
}

impl<S: TerminalSurface> Drop for TerminalBridge<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
