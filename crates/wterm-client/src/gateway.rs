//! Connection gateway: the REST exchange that turns credentials into a
//! remote session handle, and tears it down again.
//!
//! - `POST {api}/api/connect` → `{success, session_id?, message?}`
//! - `POST {api}/api/disconnect/{session_id}` → fire-and-forget

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use wterm_core::credentials::{ConnectResponse, Credentials};
use wterm_core::error::{WtermError, WtermResult};

use crate::transport::ws_base_from_api;

/// Boxed `Send` future returned by gateway calls.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = WtermResult<T>> + Send + 'a>>;

/// Default REST base URL of the shell proxy.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Authenticates against the shell proxy and releases sessions.
pub trait ConnectionGateway: Send + Sync {
    /// Exchange credentials for a session handle.
    fn connect<'a>(&'a self, credentials: &'a Credentials) -> GatewayFuture<'a, String>;

    /// Ask the proxy to tear a session down.
    fn disconnect<'a>(&'a self, handle: &'a str) -> GatewayFuture<'a, ()>;
}

/// Where the shell proxy lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// REST base URL, e.g. `http://localhost:8000`.
    pub api_url: String,
    /// WebSocket base URL; derived from `api_url` when unset.
    pub ws_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// The WebSocket base URL channels are opened against.
    pub fn ws_base(&self) -> WtermResult<String> {
        match &self.ws_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => ws_base_from_api(&self.api_url),
        }
    }
}

/// [`ConnectionGateway`] over HTTP + JSON.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> WtermResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WtermError::Gateway(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl ConnectionGateway for HttpGateway {
    fn connect<'a>(&'a self, credentials: &'a Credentials) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            let url = format!("{}/api/connect", self.config.api_base());
            debug!(url = %url, host = %credentials.host, "requesting session");

            let response = self
                .http
                .post(&url)
                .json(&credentials.to_request())
                .send()
                .await
                .map_err(|e| WtermError::Gateway(format!("Connection failed: {e}")))?;

            let status = response.status();
            let body: ConnectResponse = response.json().await.map_err(|e| {
                WtermError::Gateway(format!("Connection failed: HTTP {status}: {e}"))
            })?;

            let handle = body.into_session_id()?;
            info!(host = %credentials.host, "session issued");
            Ok(handle)
        })
    }

    fn disconnect<'a>(&'a self, handle: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}/api/disconnect/{handle}", self.config.api_base());
            let response = self
                .http
                .post(&url)
                .send()
                .await
                .map_err(|e| WtermError::Gateway(format!("disconnect failed: {e}")))?;

            if response.status().is_success() {
                debug!(handle, "session released");
                Ok(())
            } else {
                Err(WtermError::Gateway(format!(
                    "disconnect failed: HTTP {}",
                    response.status()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_derives_ws_base() {
        let config = GatewayConfig::default();
        assert_eq!(config.api_base(), "http://localhost:8000");
        assert_eq!(config.ws_base().unwrap(), "ws://localhost:8000");
    }

    #[test]
    fn explicit_ws_url_wins() {
        let config = GatewayConfig {
            api_url: "https://api.example.com/".into(),
            ws_url: Some("wss://stream.example.com/".into()),
            timeout_secs: 5,
        };
        assert_eq!(config.api_base(), "https://api.example.com");
        assert_eq!(config.ws_base().unwrap(), "wss://stream.example.com");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_gateway_error() {
        let gateway = HttpGateway::new(GatewayConfig {
            api_url: "http://127.0.0.1:1".into(),
            ws_url: None,
            timeout_secs: 2,
        })
        .unwrap();

        let creds = Credentials::password("10.0.0.5", 22, "root", "x");
        match gateway.connect(&creds).await {
            Err(WtermError::Gateway(msg)) => assert!(msg.starts_with("Connection failed")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(gateway.disconnect("abc").await.is_err());
    }
}
