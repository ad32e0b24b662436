//! In-memory doubles for the gateway, channel, and surface.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use wterm_core::credentials::Credentials;
use wterm_core::error::{WtermError, WtermResult};
use wterm_core::messages::Viewport;

use crate::gateway::{ConnectionGateway, GatewayFuture};
use crate::registry::{RegistryEvent, RegistryEvents, SessionId, SessionRegistry};
use crate::surface::TerminalSurface;
use crate::transport::{
    BridgeEvent, BridgeId, ChannelConnector, ChannelEvent, ChannelSink, EventSender,
};

/// Surface that keeps every write verbatim.
#[derive(Debug, Default)]
pub struct BufferSurface {
    pub buffer: String,
    pub viewport: Option<Viewport>,
    pub disposed: bool,
    released: Arc<AtomicBool>,
}

impl BufferSurface {
    pub fn sized(cols: u16, rows: u16) -> Self {
        Self {
            viewport: Some(Viewport::new(cols, rows)),
            ..Self::default()
        }
    }

    /// Flag set on dispose, readable after the surface has been moved away.
    pub fn disposal_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl TerminalSurface for BufferSurface {
    fn write(&mut self, data: &str) {
        if !self.disposed {
            self.buffer.push_str(data);
        }
    }

    fn proposed_viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnectorLog {
    opened: Vec<(String, BridgeId, EventSender)>,
    sent: Vec<(BridgeId, String)>,
    closed: Vec<BridgeId>,
}

/// Connector whose channels record what is sent and closed.
#[derive(Clone, Default)]
pub struct FakeConnector {
    log: Arc<Mutex<ConnectorLog>>,
    fail: bool,
}

impl FakeConnector {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every frame sent on any channel, in order.
    pub fn sent(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.sent.iter().map(|(_, frame)| frame.clone()).collect()
    }

    /// Frames sent on one bridge's channel.
    pub fn sent_on(&self, bridge: BridgeId) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.sent
            .iter()
            .filter(|(id, _)| *id == bridge)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Number of channel close calls.
    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed.len()
    }

    pub fn was_closed(&self, bridge: BridgeId) -> bool {
        self.log.lock().unwrap().closed.contains(&bridge)
    }

    /// Handles channels were opened for, in order.
    pub fn opened_handles(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.opened.iter().map(|(h, _, _)| h.clone()).collect()
    }

    /// Deliver an event as if the transport of `bridge` produced it.
    pub fn emit(&self, bridge: BridgeId, event: ChannelEvent) {
        let log = self.log.lock().unwrap();
        let (_, _, events) = log
            .opened
            .iter()
            .find(|(_, id, _)| *id == bridge)
            .expect("no channel opened for bridge");
        events.send(BridgeEvent { bridge, event }).unwrap();
    }
}

impl ChannelConnector for FakeConnector {
    fn open(
        &self,
        handle: &str,
        bridge: BridgeId,
        events: EventSender,
    ) -> WtermResult<Box<dyn ChannelSink>> {
        if self.fail {
            return Err(WtermError::Transport("refused".into()));
        }
        self.log
            .lock()
            .unwrap()
            .opened
            .push((handle.to_string(), bridge, events));
        Ok(Box::new(FakeSink {
            bridge,
            log: self.log.clone(),
            closed: false,
        }))
    }
}

struct FakeSink {
    bridge: BridgeId,
    log: Arc<Mutex<ConnectorLog>>,
    closed: bool,
}

impl ChannelSink for FakeSink {
    fn send_text(&mut self, frame: String) -> WtermResult<()> {
        if self.closed {
            return Err(WtermError::Channel("closed".into()));
        }
        self.log.lock().unwrap().sent.push((self.bridge, frame));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closed.push(self.bridge);
        }
    }
}

enum Reply {
    Ready(WtermResult<String>),
    Held(oneshot::Receiver<WtermResult<String>>),
}

#[derive(Default)]
struct GatewayLog {
    replies: VecDeque<Reply>,
    connects: Vec<Credentials>,
    disconnects: Vec<String>,
    fail_disconnect: bool,
}

/// Gateway that answers from a scripted queue.
#[derive(Clone, Default)]
pub struct FakeGateway {
    log: Arc<Mutex<GatewayLog>>,
}

impl FakeGateway {
    /// Queue the reply for the next connect call.
    pub fn reply(&self, reply: WtermResult<String>) -> &Self {
        self.log.lock().unwrap().replies.push_back(Reply::Ready(reply));
        self
    }

    /// Queue a reply that is only delivered once the returned sender fires.
    pub fn reply_later(&self) -> oneshot::Sender<WtermResult<String>> {
        let (tx, rx) = oneshot::channel();
        self.log.lock().unwrap().replies.push_back(Reply::Held(rx));
        tx
    }

    pub fn fail_disconnects(&self) {
        self.log.lock().unwrap().fail_disconnect = true;
    }

    pub fn connects(&self) -> Vec<Credentials> {
        self.log.lock().unwrap().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.log.lock().unwrap().disconnects.clone()
    }
}

impl ConnectionGateway for FakeGateway {
    fn connect<'a>(&'a self, credentials: &'a Credentials) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            let reply = {
                let mut log = self.log.lock().unwrap();
                log.connects.push(credentials.clone());
                log.replies.pop_front()
            };
            match reply {
                Some(Reply::Ready(result)) => result,
                Some(Reply::Held(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(WtermError::ConnectFailed("reply dropped".into()))),
                None => Err(WtermError::ConnectFailed("no scripted reply".into())),
            }
        })
    }

    fn disconnect<'a>(&'a self, handle: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut log = self.log.lock().unwrap();
            log.disconnects.push(handle.to_string());
            if log.fail_disconnect {
                Err(WtermError::Gateway("disconnect failed: HTTP 404 Not Found".into()))
            } else {
                Ok(())
            }
        })
    }
}

/// Start a connect and apply every queued event until its outcome lands.
pub async fn connect<S: TerminalSurface>(
    registry: &mut SessionRegistry<S>,
    events: &mut RegistryEvents,
    id: SessionId,
    credentials: Credentials,
) -> WtermResult<String> {
    registry.start_connect(id, credentials)?;
    loop {
        match events.recv().await.expect("registry queues closed") {
            RegistryEvent::Connect(outcome) if outcome.session == id => {
                return registry.complete_connect(outcome);
            }
            other => {
                registry.handle_event(other);
            }
        }
    }
}
