//! JSON messages carried over the terminal channel.
//!
//! Every frame is a JSON object with a `type` discriminator:
//!
//! - client → server: `input`, `resize`, `ping`
//! - server → client: `output`, `error`, `pong`

use serde::{Deserialize, Serialize};

/// Terminal viewport size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub cols: u16,
    pub rows: u16,
}

impl Viewport {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A viewport with a zero dimension cannot be rendered into.
    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Messages sent from the client to the remote shell proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Raw keystrokes or pasted text.
    Input { data: String },
    /// New viewport size for the remote PTY.
    Resize { cols: u16, rows: u16 },
    /// Keep-alive request.
    Ping,
}

impl ClientMessage {
    pub fn input(data: impl Into<String>) -> Self {
        Self::Input { data: data.into() }
    }

    pub fn resize(viewport: Viewport) -> Self {
        Self::Resize {
            cols: viewport.cols,
            rows: viewport.rows,
        }
    }

    /// Short name of the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Resize { .. } => "resize",
            Self::Ping => "ping",
        }
    }
}

/// Messages sent from the remote shell proxy to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Shell output to append to the terminal verbatim.
    Output { data: String },
    /// Error notice from the proxy; does not close the channel.
    Error { message: String },
    /// Keep-alive reply.
    Pong,
}
