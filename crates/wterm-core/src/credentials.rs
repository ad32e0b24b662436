//! Connection credentials and the REST payloads of the connection gateway.

use serde::{Deserialize, Serialize};

use crate::error::{WtermError, WtermResult};

/// How the remote shell authenticates the user.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password {
        value: String,
    },
    PrivateKey {
        key_text: String,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { .. } => f.write_str("Password { .. }"),
            Self::PrivateKey { passphrase, .. } => f
                .debug_struct("PrivateKey")
                .field("has_passphrase", &passphrase.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// Everything needed to ask the gateway for a remote shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
}

impl Credentials {
    pub fn password(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth: AuthMethod::Password {
                value: password.into(),
            },
        }
    }

    pub fn private_key(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        key_text: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth: AuthMethod::PrivateKey {
                key_text: key_text.into(),
                passphrase,
            },
        }
    }

    /// Check the fields the connect form requires before anything is sent.
    pub fn validate(&self) -> WtermResult<()> {
        if self.host.trim().is_empty() {
            return Err(WtermError::InvalidMessage("host is required".into()));
        }
        if self.username.trim().is_empty() {
            return Err(WtermError::InvalidMessage("username is required".into()));
        }
        if self.port == 0 {
            return Err(WtermError::InvalidMessage("port must be non-zero".into()));
        }
        match &self.auth {
            AuthMethod::Password { value } if value.is_empty() => {
                Err(WtermError::InvalidMessage("password is required".into()))
            }
            AuthMethod::PrivateKey { key_text, .. } if key_text.trim().is_empty() => {
                Err(WtermError::InvalidMessage("private key is required".into()))
            }
            _ => Ok(()),
        }
    }

    /// Display metadata recorded on the session after a successful connect.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            host: self.host.trim().to_string(),
            username: self.username.trim().to_string(),
        }
    }

    /// Flatten into the body of `POST /api/connect`.
    pub fn to_request(&self) -> ConnectRequest<'_> {
        let (password, private_key, passphrase) = match &self.auth {
            AuthMethod::Password { value } => (Some(value.as_str()), None, None),
            AuthMethod::PrivateKey {
                key_text,
                passphrase,
            } => (None, Some(key_text.as_str()), passphrase.as_deref()),
        };
        ConnectRequest {
            host: self.host.trim(),
            port: self.port,
            username: self.username.trim(),
            password,
            private_key,
            passphrase,
        }
    }
}

/// `{host, username}` shown in the tab title once connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub username: String,
}

/// Body of `POST /api/connect`.
#[derive(Debug, Serialize)]
pub struct ConnectRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<&'a str>,
}

/// Response of `POST /api/connect`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectResponse {
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ConnectResponse {
    /// Turn the response into the issued session id or the gateway's reason.
    pub fn into_session_id(self) -> WtermResult<String> {
        match (self.success, self.session_id) {
            (true, Some(id)) if !id.is_empty() => Ok(id),
            (true, _) => Err(WtermError::Gateway(
                "connect succeeded without a session id".into(),
            )),
            (false, _) => Err(WtermError::ConnectFailed(
                self.message
                    .unwrap_or_else(|| "connection refused".to_string()),
            )),
        }
    }
}
