use thiserror::Error;

/// Errors produced by the wterm protocol and client layers.
#[derive(Debug, Error)]
pub enum WtermError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    ConnectFailed(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for WtermError {
    fn from(e: serde_json::Error) -> Self {
        WtermError::Codec(e.to_string())
    }
}

impl WtermError {
    /// Text shown to the user, without the variant prefix where the inner
    /// message already reads as a sentence.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConnectFailed(msg) | Self::Gateway(msg) | Self::InvalidMessage(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

pub type WtermResult<T> = Result<T, WtermError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_strips_prefix() {
        let e = WtermError::Gateway("Connection failed: refused".into());
        assert_eq!(e.to_string(), "gateway error: Connection failed: refused");
        assert_eq!(e.user_message(), "Connection failed: refused");
        assert_eq!(WtermError::Timeout.user_message(), "timeout");
    }
}
