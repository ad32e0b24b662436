//! Session registry: the set of terminal tabs and their lifecycle.
//!
//! The registry owns every [`Session`], creates a [`TerminalBridge`] when a
//! session connects and destroys it when the session disconnects or closes,
//! and routes input to the active session. The list is never empty and the
//! active id always names a member of it.
//!
//! Gateway round trips never run under `&mut self`. A connect is started
//! with [`SessionRegistry::start_connect`], its outcome arrives on
//! [`RegistryEvents`] next to the channel events, and the owner applies it
//! with [`SessionRegistry::handle_event`]. Disconnects are fire-and-forget.
//!
//! Every mutation publishes a fresh [`RegistrySnapshot`] on a `watch`
//! channel for whatever renders the tab strip.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use wterm_core::credentials::{ConnectionInfo, Credentials};
use wterm_core::error::{WtermError, WtermResult};
use wterm_core::messages::Viewport;

use crate::bridge::{ChannelStatus, TerminalBridge};
use crate::gateway::ConnectionGateway;
use crate::surface::TerminalSurface;
use crate::transport::{BridgeEvent, BridgeId, ChannelConnector, EventReceiver, EventSender};

/// Title of a tab with neither a custom name nor a connection.
pub const DEFAULT_TITLE: &str = "New Connection";

/// Stable identifier of a tab, unique for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Creates the emulator surface for each new bridge.
pub type SurfaceFactory<S> = Box<dyn Fn() -> S + Send + Sync>;

/// Answer of the gateway to one connect attempt.
#[derive(Debug)]
pub struct ConnectOutcome {
    pub session: SessionId,
    attempt: u64,
    info: ConnectionInfo,
    pub result: WtermResult<String>,
}

/// Everything the registry's owner has to feed back into it.
#[derive(Debug)]
pub enum RegistryEvent {
    Channel(BridgeEvent),
    Connect(ConnectOutcome),
}

/// Receiving half of the registry's queues.
pub struct RegistryEvents {
    channel: EventReceiver,
    connects: mpsc::UnboundedReceiver<ConnectOutcome>,
}

impl RegistryEvents {
    /// Wait for the next event. `None` once the registry is gone.
    pub async fn recv(&mut self) -> Option<RegistryEvent> {
        tokio::select! {
            Some(event) = self.channel.recv() => Some(RegistryEvent::Channel(event)),
            Some(outcome) = self.connects.recv() => Some(RegistryEvent::Connect(outcome)),
            else => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<RegistryEvent> {
        if let Ok(event) = self.channel.try_recv() {
            return Some(RegistryEvent::Channel(event));
        }
        self.connects.try_recv().ok().map(RegistryEvent::Connect)
    }
}

/// One tab, connected or not.
pub struct Session<S: TerminalSurface> {
    id: SessionId,
    connection_handle: Option<String>,
    connection_info: Option<ConnectionInfo>,
    custom_name: Option<String>,
    last_error: Option<String>,
    bridge: Option<TerminalBridge<S>>,
    /// Connect attempt whose outcome this tab still waits for.
    pending_attempt: Option<u64>,
}

impl<S: TerminalSurface> Session<S> {
    fn blank(id: SessionId) -> Self {
        Self {
            id,
            connection_handle: None,
            connection_info: None,
            custom_name: None,
            last_error: None,
            bridge: None,
            pending_attempt: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Gateway-issued handle of the live remote session, if any.
    pub fn connection_handle(&self) -> Option<&str> {
        self.connection_handle.as_deref()
    }

    pub fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.connection_info.as_ref()
    }

    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    /// Message from the most recent failed connect attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_handle.is_some()
    }

    /// A connect was started and its outcome has not been applied yet.
    pub fn is_connecting(&self) -> bool {
        self.pending_attempt.is_some()
    }

    /// The bridge of this tab. After an unexpected close it is kept, closed,
    /// so its notices stay visible until the tab reconnects or disconnects.
    pub fn bridge(&self) -> Option<&TerminalBridge<S>> {
        self.bridge.as_ref()
    }

    pub fn channel_status(&self) -> Option<ChannelStatus> {
        self.bridge.as_ref().map(|b| b.status())
    }

    /// Custom name, else `username@host`, else [`DEFAULT_TITLE`].
    pub fn title(&self) -> String {
        if let Some(name) = &self.custom_name {
            return name.clone();
        }
        match &self.connection_info {
            Some(info) => format!("{}@{}", info.username, info.host),
            None => DEFAULT_TITLE.to_string(),
        }
    }

    fn release_bridge(&mut self) {
        if let Some(mut bridge) = self.bridge.take() {
            bridge.teardown();
        }
    }

    /// Drop everything tied to the remote session and hand back its handle.
    fn take_connection(&mut self) -> Option<String> {
        self.release_bridge();
        self.pending_attempt = None;
        self.connection_info = None;
        self.last_error = None;
        self.connection_handle.take()
    }
}

/// One entry of the tab strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub id: SessionId,
    pub title: String,
    pub connected: bool,
    pub connecting: bool,
    pub last_error: Option<String>,
    pub channel: Option<ChannelStatus>,
}

/// What the tab strip and active pane render from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub tabs: Vec<TabView>,
    pub active: SessionId,
}

impl RegistrySnapshot {
    pub fn active_tab(&self) -> Option<&TabView> {
        self.tabs.iter().find(|t| t.id == self.active)
    }
}

/// Owner of all tabs.
pub struct SessionRegistry<S: TerminalSurface> {
    sessions: Vec<Session<S>>,
    active: SessionId,
    next_session: u64,
    next_bridge: u64,
    next_attempt: u64,
    /// Size applied to every bridge, once known.
    viewport: Option<Viewport>,
    gateway: Arc<dyn ConnectionGateway>,
    connector: Arc<dyn ChannelConnector>,
    surfaces: SurfaceFactory<S>,
    events: EventSender,
    outcomes: mpsc::UnboundedSender<ConnectOutcome>,
    snapshot_tx: watch::Sender<RegistrySnapshot>,
}

impl<S: TerminalSurface> SessionRegistry<S> {
    /// Create a registry holding one blank tab.
    ///
    /// Channel events and connect outcomes arrive on the returned
    /// [`RegistryEvents`] and must be fed back through
    /// [`handle_event`](Self::handle_event).
    pub fn new(
        gateway: Arc<dyn ConnectionGateway>,
        connector: Arc<dyn ChannelConnector>,
        surfaces: SurfaceFactory<S>,
    ) -> (Self, RegistryEvents) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (outcomes, outcomes_rx) = mpsc::unbounded_channel();
        let first = SessionId(1);
        let (snapshot_tx, _) = watch::channel(RegistrySnapshot {
            tabs: Vec::new(),
            active: first,
        });

        let registry = Self {
            sessions: vec![Session::blank(first)],
            active: first,
            next_session: 2,
            next_bridge: 1,
            next_attempt: 1,
            viewport: None,
            gateway,
            connector,
            surfaces,
            events,
            outcomes,
            snapshot_tx,
        };
        registry.publish();
        let queues = RegistryEvents {
            channel: events_rx,
            connects: outcomes_rx,
        };
        (registry, queues)
    }

    /// Receive a snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            tabs: self
                .sessions
                .iter()
                .map(|s| TabView {
                    id: s.id,
                    title: s.title(),
                    connected: s.is_connected(),
                    connecting: s.is_connecting(),
                    last_error: s.last_error.clone(),
                    channel: s.channel_status(),
                })
                .collect(),
            active: self.active,
        }
    }

    pub fn sessions(&self) -> &[Session<S>] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_id(&self) -> SessionId {
        self.active
    }

    pub fn get(&self, id: SessionId) -> Option<&Session<S>> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn active(&self) -> &Session<S> {
        let idx = self.active_index();
        &self.sessions[idx]
    }

    pub fn active_index(&self) -> usize {
        self.index_of(self.active).unwrap_or(0)
    }

    pub fn any_connected(&self) -> bool {
        self.sessions.iter().any(Session::is_connected)
    }

    pub fn has_pending_connects(&self) -> bool {
        self.sessions.iter().any(Session::is_connecting)
    }

    /// Append a blank tab and make it active.
    pub fn create_session(&mut self) -> SessionId {
        let id = self.push_blank();
        self.active = id;
        info!(session = %id, "session created");
        self.publish();
        id
    }

    /// Remove a tab, releasing its connection in the background.
    ///
    /// If the closed tab was active, the tab that shifts into its slot (or the
    /// new last tab) becomes active. Closing the last tab leaves one fresh
    /// blank tab behind.
    pub fn close_session(&mut self, id: SessionId) -> WtermResult<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| WtermError::SessionNotFound(id.to_string()))?;

        let mut session = self.sessions.remove(idx);
        if let Some(handle) = session.take_connection() {
            self.spawn_disconnect(handle);
        }
        info!(session = %id, "session closed");

        if self.sessions.is_empty() {
            self.active = self.push_blank();
        } else if self.active == id {
            let next = idx.min(self.sessions.len() - 1);
            self.active = self.sessions[next].id;
        }

        self.publish();
        Ok(())
    }

    pub fn switch_active(&mut self, id: SessionId) -> WtermResult<()> {
        if self.index_of(id).is_none() {
            return Err(WtermError::SessionNotFound(id.to_string()));
        }
        self.activate(id);
        Ok(())
    }

    /// Make the tab at `index` (0-based) active.
    pub fn switch_index(&mut self, index: usize) -> WtermResult<()> {
        let id = self
            .sessions
            .get(index)
            .map(|s| s.id)
            .ok_or_else(|| WtermError::SessionNotFound(format!("index {index}")))?;
        self.activate(id);
        Ok(())
    }

    pub fn next_session(&mut self) {
        let idx = (self.active_index() + 1) % self.sessions.len();
        let id = self.sessions[idx].id;
        self.activate(id);
    }

    pub fn previous_session(&mut self) {
        let len = self.sessions.len();
        let idx = (self.active_index() + len - 1) % len;
        let id = self.sessions[idx].id;
        self.activate(id);
    }

    /// Set a custom tab name. Blank names are ignored.
    pub fn rename_session(&mut self, id: SessionId, name: &str) -> WtermResult<()> {
        let trimmed = name.trim();
        let session = self.session_mut(id)?;
        if trimmed.is_empty() {
            trace!(session = %id, "blank rename ignored");
            return Ok(());
        }
        session.custom_name = Some(trimmed.to_string());
        self.publish();
        Ok(())
    }

    /// Start connecting a tab through the gateway.
    ///
    /// The gateway request runs on its own task; its outcome is queued on
    /// [`RegistryEvents`]. Invalid credentials are rejected here and recorded
    /// as the tab's `last_error`. Starting again before the outcome arrives
    /// supersedes the earlier attempt.
    pub fn start_connect(&mut self, id: SessionId, credentials: Credentials) -> WtermResult<()> {
        self.session_mut(id)?.last_error = None;

        if let Err(e) = credentials.validate() {
            return Err(self.record_failure(id, e));
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                let e = WtermError::Other("connect needs an async runtime".into());
                return Err(self.record_failure(id, e));
            }
        };

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        self.session_mut(id)?.pending_attempt = Some(attempt);

        let gateway = Arc::clone(&self.gateway);
        let outcomes = self.outcomes.clone();
        let info = credentials.connection_info();
        runtime.spawn(async move {
            let result = gateway.connect(&credentials).await;
            // The registry may be gone; then nobody wants the answer.
            let _ = outcomes.send(ConnectOutcome {
                session: id,
                attempt,
                info,
                result,
            });
        });

        debug!(session = %id, attempt, "connect started");
        self.publish();
        Ok(())
    }

    /// Apply a gateway answer: open the tab's bridge, or record the failure.
    ///
    /// Answers for closed tabs or superseded attempts are discarded, and a
    /// remote session they created is released in the background.
    pub fn complete_connect(&mut self, outcome: ConnectOutcome) -> WtermResult<String> {
        let ConnectOutcome {
            session: id,
            attempt,
            info,
            result,
        } = outcome;

        let current = self.get(id).map(|s| s.pending_attempt);
        if current != Some(Some(attempt)) {
            debug!(session = %id, attempt, "stale connect outcome discarded");
            if let Ok(handle) = result {
                self.spawn_disconnect(handle);
            }
            return Err(match current {
                None => WtermError::SessionNotFound(id.to_string()),
                Some(_) => WtermError::Other(format!("connect attempt {attempt} was superseded")),
            });
        }
        self.session_mut(id)?.pending_attempt = None;

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                warn!(session = %id, "connect failed: {e}");
                return Err(self.record_failure(id, e));
            }
        };

        // A tab holds at most one bridge; replace whatever it had.
        let (previous, bridge_id) = {
            let bridge_id = self.allocate_bridge_id();
            let session = self.session_mut(id)?;
            session.release_bridge();
            (session.connection_handle.take(), bridge_id)
        };
        if let Some(old) = previous {
            self.spawn_disconnect(old);
        }

        let surface = (self.surfaces)();
        let bridge = TerminalBridge::open(
            bridge_id,
            handle.clone(),
            surface,
            &*self.connector,
            self.events.clone(),
        );
        let mut bridge = match bridge {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(session = %id, "failed to open channel: {e}");
                self.spawn_disconnect(handle);
                return Err(self.record_failure(id, e));
            }
        };
        if let Some(viewport) = self.viewport {
            bridge.fit(viewport);
        }

        let session = self.session_mut(id)?;
        session.connection_handle = Some(handle.clone());
        session.connection_info = Some(info);
        session.last_error = None;
        session.bridge = Some(bridge);
        info!(session = %id, bridge = %bridge_id, title = %session.title(), "session connected");

        self.publish();
        Ok(handle)
    }

    /// Release a tab's connection.
    ///
    /// Local state is cleared at once; the gateway is told in the background
    /// and its failures are only logged. A pending connect is abandoned.
    pub fn disconnect(&mut self, id: SessionId) -> WtermResult<()> {
        if let Some(handle) = self.session_mut(id)?.take_connection() {
            self.spawn_disconnect(handle);
        }
        info!(session = %id, "session disconnected");
        self.publish();
        Ok(())
    }

    /// Disconnect every tab, returning the background gateway requests so
    /// the caller can wait for them before exiting.
    pub fn shutdown(&mut self) -> Vec<JoinHandle<()>> {
        let handles: Vec<String> = self
            .sessions
            .iter_mut()
            .filter_map(Session::take_connection)
            .collect();
        let pending = handles
            .into_iter()
            .filter_map(|handle| self.spawn_disconnect(handle))
            .collect();
        self.publish();
        pending
    }

    /// Apply anything received from [`RegistryEvents`].
    ///
    /// Returns the affected tab, or `None` when the event was stale.
    pub fn handle_event(&mut self, event: RegistryEvent) -> Option<SessionId> {
        match event {
            RegistryEvent::Channel(event) => self.handle_bridge_event(event),
            RegistryEvent::Connect(outcome) => {
                let id = outcome.session;
                match self.complete_connect(outcome) {
                    Ok(_) => Some(id),
                    Err(WtermError::SessionNotFound(_)) => None,
                    Err(e) => {
                        debug!(session = %id, "connect did not complete: {e}");
                        Some(id)
                    }
                }
            }
        }
    }

    /// Apply a channel event to the bridge it belongs to.
    ///
    /// Returns the affected tab, or `None` for events of bridges that were
    /// already torn down. When a channel closes on its own the tab is marked
    /// disconnected and the remote session is released in the background.
    pub fn handle_bridge_event(&mut self, event: BridgeEvent) -> Option<SessionId> {
        let Some(idx) = self
            .sessions
            .iter()
            .position(|s| s.bridge.as_ref().map(|b| b.id()) == Some(event.bridge))
        else {
            trace!(bridge = %event.bridge, "event for released bridge ignored");
            return None;
        };

        let session = &mut self.sessions[idx];
        let id = session.id;
        let bridge = session.bridge.as_mut()?;
        let before = bridge.status();
        let after = bridge.handle_event(event.event);

        if before != after {
            if after == ChannelStatus::Closed {
                session.connection_info = None;
                if let Some(handle) = session.connection_handle.take() {
                    info!(session = %id, "channel closed; marking session disconnected");
                    self.spawn_disconnect(handle);
                }
            }
            self.publish();
        }
        Some(id)
    }

    /// Send input to the active tab. Returns whether it went out.
    pub fn send_input(&mut self, data: &str) -> bool {
        let id = self.active;
        self.send_input_to(id, data)
    }

    pub fn send_input_to(&mut self, id: SessionId, data: &str) -> bool {
        match self.session_mut(id) {
            Ok(session) => match session.bridge.as_mut() {
                Some(bridge) => bridge.send_input(data),
                None => {
                    trace!(session = %id, "input for unconnected session dropped");
                    false
                }
            },
            Err(_) => false,
        }
    }

    /// Apply a new viewport to every bridge, now and for bridges opened later.
    pub fn resize_all(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.viewport = Some(viewport);
        for session in &mut self.sessions {
            if let Some(bridge) = session.bridge.as_mut() {
                bridge.fit(viewport);
            }
        }
    }

    /// Send a keep-alive on every open channel.
    pub fn ping_all(&mut self) {
        for session in &mut self.sessions {
            if let Some(bridge) = session.bridge.as_mut() {
                bridge.ping();
            }
        }
    }

    fn activate(&mut self, id: SessionId) {
        if self.active != id {
            self.active = id;
            debug!(session = %id, "switched active session");
            self.publish();
        }
    }

    fn index_of(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn session_mut(&mut self, id: SessionId) -> WtermResult<&mut Session<S>> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| WtermError::SessionNotFound(id.to_string()))
    }

    fn push_blank(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.sessions.push(Session::blank(id));
        id
    }

    fn allocate_bridge_id(&mut self) -> BridgeId {
        let id = BridgeId(self.next_bridge);
        self.next_bridge += 1;
        id
    }

    fn record_failure(&mut self, id: SessionId, error: WtermError) -> WtermError {
        if let Ok(session) = self.session_mut(id) {
            session.last_error = Some(error.user_message());
        }
        self.publish();
        error
    }

    /// Fire-and-forget gateway disconnect. Failures are only logged.
    fn spawn_disconnect(&self, handle: String) -> Option<JoinHandle<()>> {
        let gateway = Arc::clone(&self.gateway);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                if let Err(e) = gateway.disconnect(&handle).await {
                    warn!(handle = %handle, "disconnect error: {e}");
                }
            })),
            Err(_) => {
                warn!(handle = %handle, "no async runtime; disconnect request skipped");
                None
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl<S: TerminalSurface> Drop for SessionRegistry<S> {
    fn drop(&mut self) {
        for session in &mut self.sessions {
            session.release_bridge();
        }
    }
}
