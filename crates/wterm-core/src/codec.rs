//! JSON text framing for the terminal channel.
//!
//! Wire format: one JSON object per WebSocket text frame.

use crate::error::{WtermError, WtermResult};
use crate::messages::{ClientMessage, ServerMessage};

/// Encode a serializable value into a single text frame.
pub fn json_encode<T: serde::Serialize>(value: &T) -> WtermResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a text frame into a typed value.
pub fn json_decode<T: serde::de::DeserializeOwned>(frame: &str) -> WtermResult<T> {
    Ok(serde_json::from_str(frame)?)
}

/// Encode an outbound channel message.
pub fn encode_client(msg: &ClientMessage) -> WtermResult<String> {
    json_encode(msg)
}

/// Decode an inbound channel message.
///
/// Frames that are valid JSON but carry an unknown `type` are reported as
/// [`WtermError::InvalidMessage`] so callers can skip them without treating
/// them as corruption.
pub fn decode_server(frame: &str) -> WtermResult<ServerMessage> {
    let value: serde_json::Value = serde_json::from_str(frame)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| WtermError::InvalidMessage("missing message type".into()))?;

    match kind {
        "output" | "error" | "pong" => Ok(serde_json::from_value(value)?),
        other => Err(WtermError::InvalidMessage(format!(
            "unknown message type: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Viewport;

    #[test]
    fn input_frame_shape() {
        let frame = encode_client(&ClientMessage::input("ls\r")).unwrap();
        assert_eq!(frame, r#"{"type":"input","data":"ls\r"}"#);
    }

    #[test]
    fn resize_frame_shape() {
        let frame = encode_client(&ClientMessage::resize(Viewport::new(120, 40))).unwrap();
        assert_eq!(frame, r#"{"type":"resize","cols":120,"rows":40}"#);
    }

    #[test]
    fn ping_frame_shape() {
        let frame = encode_client(&ClientMessage::Ping).unwrap();
        assert_eq!(frame, r#"{"type":"ping"}"#);
    }

    #[test]
    fn decode_output() {
        let msg = decode_server(r#"{"type":"output","data":"$ "}"#).unwrap();
        assert_eq!(msg, ServerMessage::Output { data: "$ ".into() });
    }

    #[test]
    fn decode_error() {
        let msg = decode_server(r#"{"type":"error","message":"Session not found"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                message: "Session not found".into()
            }
        );
    }

    #[test]
    fn decode_escape_sequences_verbatim() {
        let msg = decode_server(r#"{"type":"output","data":"\u001b[31mred\u001b[0m"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Output {
                data: "\x1b[31mred\x1b[0m".into()
            }
        );
    }

    #[test]
    fn decode_unknown_type() {
        let err = decode_server(r#"{"type":"bell"}"#).unwrap_err();
        assert!(matches!(err, WtermError::InvalidMessage(_)));
    }

    #[test]
    fn decode_missing_type() {
        let err = decode_server(r#"{"data":"x"}"#).unwrap_err();
        assert!(matches!(err, WtermError::InvalidMessage(_)));
    }

    #[test]
    fn decode_garbage() {
        let err = decode_server("not json").unwrap_err();
        assert!(matches!(err, WtermError::Codec(_)));
    }
}
