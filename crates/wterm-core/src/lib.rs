//! wterm-core: Shared protocol library for the wterm web terminal client.
//!
//! Provides the JSON channel messages and codec, connection credentials and
//! gateway payloads, and the virtual keyboard encoder.

pub mod codec;
pub mod credentials;
pub mod error;
pub mod keyboard;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode_server, encode_client};
pub use credentials::{AuthMethod, ConnectionInfo, Credentials};
pub use error::{WtermError, WtermResult};
pub use keyboard::{Interception, KeyEncoder, Modifier, ModifierState};
pub use messages::{ClientMessage, ServerMessage, Viewport};
