//! Channel layer between a terminal bridge and the remote shell proxy.
//!
//! A channel is opened per bridge. Its events are tagged with the bridge's
//! [`BridgeId`] and pushed into one shared queue, so every channel callback
//! of every bridge is handled on the same event loop, one at a time.
//!
//! - `ws://` or `wss://` → WebSocket ([`WsConnector`])

pub mod websocket;

pub use websocket::WsConnector;

use std::fmt;

use tokio::sync::mpsc;
use wterm_core::error::{WtermError, WtermResult};

/// Identifier of one bridge (one channel lifetime), unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BridgeId(pub u64);

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge-{}", self.0)
    }
}

/// Something that happened on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The transport finished its opening handshake.
    Opened,
    /// One inbound text frame, undecoded.
    Message(String),
    /// Transport failure; the channel is unusable afterwards.
    Error(String),
    /// The remote side closed the channel.
    Closed,
}

/// A channel event tagged with the bridge it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    pub bridge: BridgeId,
    pub event: ChannelEvent,
}

/// Sending half of the shared event queue.
pub type EventSender = mpsc::UnboundedSender<BridgeEvent>;

/// Receiving half of the shared event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

/// Outbound half of an open channel.
pub trait ChannelSink: Send {
    /// Queue one text frame for sending. Never blocks.
    fn send_text(&mut self, frame: String) -> WtermResult<()>;

    /// Stop delivering events for this channel, then close it. Idempotent.
    fn close(&mut self);
}

/// Opens channels addressed by a gateway-issued session handle.
pub trait ChannelConnector: Send + Sync {
    /// Start opening a channel. Completion is reported as
    /// [`ChannelEvent::Opened`] (or `Error`) on `events`.
    fn open(
        &self,
        handle: &str,
        bridge: BridgeId,
        events: EventSender,
    ) -> WtermResult<Box<dyn ChannelSink>>;
}

/// Check that a channel base URL uses a WebSocket scheme.
pub fn validate_ws_base(url: &str) -> WtermResult<()> {
    let lower = url.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(WtermError::Transport(format!(
            "unsupported URL scheme: {url} (expected ws:// or wss://)"
        )))
    }
}

/// Address of the terminal channel for a session handle.
pub fn channel_url(ws_base: &str, handle: &str) -> String {
    format!("{}/ws/terminal/{handle}", ws_base.trim_end_matches('/'))
}

/// Derive the WebSocket base URL from the REST base URL
/// (`http://` → `ws://`, `https://` → `wss://`).
pub fn ws_base_from_api(api_url: &str) -> WtermResult<String> {
    let trimmed = api_url.trim_end_matches('/');
    let lower = trimmed.to_lowercase();
    if lower.starts_with("https://") {
        Ok(format!("wss://{}", &trimmed[8..]))
    } else if lower.starts_with("http://") {
        Ok(format!("ws://{}", &trimmed[7..]))
    } else {
        Err(WtermError::Transport(format!(
            "unsupported API URL scheme: {api_url} (expected http:// or https://)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_url_joins_path() {
        assert_eq!(
            channel_url("ws://localhost:8000", "abc-123"),
            "ws://localhost:8000/ws/terminal/abc-123"
        );
        assert_eq!(
            channel_url("wss://term.example.com/", "s1"),
            "wss://term.example.com/ws/terminal/s1"
        );
    }

    #[test]
    fn derive_ws_base() {
        assert_eq!(
            ws_base_from_api("http://localhost:8000").unwrap(),
            "ws://localhost:8000"
        );
        assert_eq!(
            ws_base_from_api("https://term.example.com/").unwrap(),
            "wss://term.example.com"
        );
        assert!(ws_base_from_api("ftp://example.com").is_err());
    }

    #[test]
    fn validate_scheme() {
        assert!(validate_ws_base("ws://localhost:8000").is_ok());
        assert!(validate_ws_base("WSS://example.com").is_ok());
        assert!(validate_ws_base("http://example.com").is_err());
    }

    #[test]
    fn bridge_id_display() {
        assert_eq!(BridgeId(7).to_string(), "bridge-7");
    }
}
