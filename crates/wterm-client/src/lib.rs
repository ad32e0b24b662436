//! wterm-client: tabbed remote shell sessions over WebSocket channels.
//!
//! A [`SessionRegistry`] owns the tabs. Connecting a tab asks the
//! [`ConnectionGateway`] for a session handle in the background, then opens a
//! channel for it and attaches a [`TerminalBridge`] that feeds a
//! [`TerminalSurface`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wterm_client::{GatewayConfig, HttpGateway, SessionRegistry, Vt100Surface, WsConnector};
//! use wterm_core::{Credentials, Viewport};
//!
//! # async fn example() -> wterm_core::WtermResult<()> {
//! let config = GatewayConfig::default();
//! let connector = WsConnector::new(config.ws_base()?)?;
//! let gateway = HttpGateway::new(config)?;
//!
//! let (mut registry, mut events) = SessionRegistry::new(
//!     Arc::new(gateway),
//!     Arc::new(connector),
//!     Box::new(|| Vt100Surface::new(Viewport::default())),
//! );
//! let tab = registry.active_id();
//! registry.start_connect(tab, Credentials::password("10.0.0.5", 22, "root", "secret"))?;
//!
//! while let Some(event) = events.recv().await {
//!     registry.handle_event(event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod gateway;
pub mod input;
pub mod registry;
pub mod surface;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export primary public types.
pub use bridge::{ChannelStatus, TerminalBridge};
pub use gateway::{ConnectionGateway, GatewayConfig, HttpGateway};
pub use input::InputRouter;
pub use registry::{
    ConnectOutcome, RegistryEvent, RegistryEvents, RegistrySnapshot, Session, SessionId,
    SessionRegistry, TabView,
};
pub use surface::{TerminalSurface, Vt100Surface};
pub use transport::websocket::WsConnector;
pub use transport::{BridgeEvent, BridgeId, ChannelEvent};

// Re-export wterm-core error types for convenience.
pub use wterm_core::{WtermError, WtermResult};
