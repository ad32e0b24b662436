//! WebSocket channel implementation.
//!
//! Each channel runs two tasks:
//!
//! - the connection task connects, reports `Opened`, then reads frames and
//!   forwards them as [`ChannelEvent`]s until the socket ends
//! - the writer task drains the outgoing queue into the socket
//!
//! Closing aborts the connection task first so no event is delivered after
//! the owner has let go of the channel, then queues a close frame for the
//! writer.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use wterm_core::error::{WtermError, WtermResult};

use super::{
    channel_url, validate_ws_base, BridgeEvent, BridgeId, ChannelConnector, ChannelEvent,
    ChannelSink, EventSender,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens terminal channels at `{ws_base}/ws/terminal/{handle}`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_base: String,
}

impl WsConnector {
    pub fn new(ws_base: impl Into<String>) -> WtermResult<Self> {
        let ws_base = ws_base.into();
        validate_ws_base(&ws_base)?;
        Ok(Self { ws_base })
    }

    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }
}

impl ChannelConnector for WsConnector {
    fn open(
        &self,
        handle: &str,
        bridge: BridgeId,
        events: EventSender,
    ) -> WtermResult<Box<dyn ChannelSink>> {
        let url = channel_url(&self.ws_base, handle);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let task = {
            let outgoing_tx = outgoing_tx.clone();
            tokio::spawn(async move {
                connection_task(url, bridge, events, outgoing_tx, outgoing_rx).await;
            })
        };

        Ok(Box::new(WsSink {
            outgoing: outgoing_tx,
            task,
            closed: false,
        }))
    }
}

/// Outbound half of a WebSocket channel.
struct WsSink {
    outgoing: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
    closed: bool,
}

impl ChannelSink for WsSink {
    fn send_text(&mut self, frame: String) -> WtermResult<()> {
        if self.closed {
            return Err(WtermError::Channel("channel is closed".into()));
        }
        self.outgoing
            .send(Message::Text(frame))
            .map_err(|_| WtermError::Channel("writer task stopped".into()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Detach the reader before anything else.
        self.task.abort();
        let _ = self.outgoing.send(Message::Close(None));
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn emit(events: &EventSender, bridge: BridgeId, event: ChannelEvent) -> bool {
    events.send(BridgeEvent { bridge, event }).is_ok()
}

async fn connection_task(
    url: String,
    bridge: BridgeId,
    events: EventSender,
    outgoing_tx: mpsc::UnboundedSender<Message>,
    outgoing_rx: mpsc::UnboundedReceiver<Message>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(%bridge, url = %url, "WebSocket connect error: {e}");
            emit(
                &events,
                bridge,
                ChannelEvent::Error(format!("WebSocket connect error: {e}")),
            );
            return;
        }
    };

    info!(%bridge, "WebSocket connected to {}", url);

    let (ws_sink, ws_read) = ws_stream.split();
    tokio::spawn(write_loop(bridge, ws_sink, outgoing_rx));

    if !emit(&events, bridge, ChannelEvent::Opened) {
        return;
    }
    read_loop(bridge, ws_read, &events, &outgoing_tx).await;
}

async fn read_loop(
    bridge: BridgeId,
    mut ws_read: SplitStream<WsStream>,
    events: &EventSender,
    outgoing_tx: &mpsc::UnboundedSender<Message>,
) {
    while let Some(msg) = ws_read.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => ChannelEvent::Message(text),
            Ok(Message::Binary(data)) => {
                ChannelEvent::Message(String::from_utf8_lossy(&data).into_owned())
            }
            Ok(Message::Ping(payload)) => {
                let _ = outgoing_tx.send(Message::Pong(payload));
                continue;
            }
            Ok(Message::Close(_)) => {
                debug!(%bridge, "WebSocket close frame received");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(%bridge, "WebSocket read error: {e}");
                emit(events, bridge, ChannelEvent::Error(format!("WebSocket error: {e}")));
                return;
            }
        };

        if !emit(events, bridge, event) {
            debug!(%bridge, "event queue closed");
            return;
        }
    }

    emit(events, bridge, ChannelEvent::Closed);
    debug!(%bridge, "WebSocket read loop ended");
}

async fn write_loop(
    bridge: BridgeId,
    mut ws_sink: SplitSink<WsStream, Message>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = outgoing_rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if let Err(e) = ws_sink.send(msg).await {
            debug!(%bridge, "WebSocket write error: {e}");
            break;
        }
        if is_close {
            break;
        }
    }
    let _ = ws_sink.close().await;
    debug!(%bridge, "WebSocket write loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_http_base() {
        assert!(WsConnector::new("http://localhost:8000").is_err());
        assert_eq!(
            WsConnector::new("ws://localhost:8000").unwrap().ws_base(),
            "ws://localhost:8000"
        );
    }

    #[tokio::test]
    async fn unreachable_host_reports_error() {
        let connector = WsConnector::new("ws://127.0.0.1:1").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sink = connector.open("abc", BridgeId(1), tx).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.bridge, BridgeId(1));
        assert!(matches!(event.event, ChannelEvent::Error(_)));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let connector = WsConnector::new("ws://127.0.0.1:1").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut sink = connector.open("abc", BridgeId(2), tx).unwrap();
        sink.close();
        sink.close();
        assert!(sink.send_text("{}".into()).is_err());
    }
}
