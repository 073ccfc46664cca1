//! Async client for Battleline game sessions.
//!
//! [`GameClient`] is a thin handle that talks to one background session
//! driver over an unbounded command channel. The driver is the single owner
//! of the connection lifecycle and the only writer of the session store; it
//! reports everything that happens as [`GameClientEvent`]s on the bounded
//! channel returned from [`GameClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new(base_url.clone());
//! let api = HttpSessionApi::new(base_url.clone())?;
//! let (mut client, mut events) = GameClient::start(connector, api, ClientConfig::new());
//!
//! // Resume the session named in the page URL, if any.
//! client.resume(page_url).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameClientEvent::Connected { session_id } => { /* show chat + ready */ }
//!         GameClientEvent::ChatTranscriptReplaced { entries } => { /* render */ }
//!         GameClientEvent::AwaitingSession => { /* show create/join */ }
//!         _ => {}
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::close_code::CloseCode;
use crate::command;
use crate::dispatch::{self, Payload};
use crate::error::{ClientError, Result};
use crate::event::GameClientEvent;
use crate::identity::{self, DEFAULT_SESSION_QUERY_PARAM};
use crate::lifecycle::{self, CloseDisposition, ConnectionHandle, LinkEvent, LinkSignal};
use crate::protocol::{ChatEntry, ClientMessage, MoveData, SessionId};
use crate::session_api::SessionApi;
use crate::store::SessionStore;
use crate::transport::{Connector, InboundFrame};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of automatic reconnects per create/join.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default fixed delay before each automatic reconnect.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameClient`].
///
/// # Example
///
/// ```
/// use battleline_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new()
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_delay(Duration::from_millis(500));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// assert_eq!(config.session_query_param, "game_id");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Query parameter that mirrors the active session id in the page URL.
    pub session_query_param: String,
    /// Automatic reconnects allowed after a fresh create or join. Successful
    /// reconnects do not refill the budget.
    ///
    /// Defaults to **5**.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each automatic reconnect.
    ///
    /// Defaults to **1 second**.
    pub reconnect_delay: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped with a warning
    /// so the driver never blocks. `Disconnected` is always delivered: it is
    /// held back until the consumer frees a slot, and events emitted while
    /// it waits are dropped.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the driver is given to wind down in [`GameClient::shutdown`]
    /// before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            session_query_param: DEFAULT_SESSION_QUERY_PARAM.to_string(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_session_query_param(mut self, param: impl Into<String>) -> Self {
        self.session_query_param = param.into();
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State written by the driver and read through the client handle.
struct SharedState {
    connected: AtomicBool,
    running: AtomicBool,
    store: Mutex<SessionStore>,
    session_id: Mutex<Option<SessionId>>,
    location: Mutex<Option<Url>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            running: AtomicBool::new(true),
            store: Mutex::new(SessionStore::new()),
            session_id: Mutex::new(None),
            location: Mutex::new(None),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Resume {
        location: Url,
        reply: Reply<Option<SessionId>>,
    },
    Create {
        reply: Reply<SessionId>,
    },
    Join {
        session_id: SessionId,
        reply: Reply<SessionId>,
    },
    Send {
        message: ClientMessage,
        reply: Reply<()>,
    },
    ToggleReady {
        reply: Reply<bool>,
    },
}

/// Which create/join flow a request belongs to.
#[derive(Debug, Clone)]
enum RequestKind {
    Resume(SessionId),
    Create,
    Join(SessionId),
}

impl RequestKind {
    fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Resume(id) | Self::Join(id) => Some(id),
            Self::Create => None,
        }
    }
}

/// How to answer the caller once a request completes.
enum RequestReply {
    Resume(Reply<Option<SessionId>>),
    Bound(Reply<SessionId>),
}

impl RequestReply {
    fn send(self, result: Result<SessionId>) {
        // The caller may have stopped waiting.
        match self {
            Self::Resume(reply) => {
                let _ = reply.send(result.map(Some));
            }
            Self::Bound(reply) => {
                let _ = reply.send(result);
            }
        }
    }
}

/// Everything the driver reacts to besides commands, on one ordered channel.
enum Signal {
    Link(LinkSignal),
    ReconnectDue {
        generation: u64,
    },
    RequestDone {
        seq: u64,
        kind: RequestKind,
        result: Result<SessionId>,
        reply: RequestReply,
    },
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running Battleline session client.
///
/// Created via [`GameClient::start`], which spawns the background session
/// driver and returns this handle together with an event receiver.
pub struct GameClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl GameClient {
    /// Start the session driver and return a handle plus event receiver.
    ///
    /// No connection is made until [`resume`](Self::resume),
    /// [`create_session`](Self::create_session) or
    /// [`join_session`](Self::join_session) is called.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C, A>(
        connector: C,
        api: A,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<GameClientEvent>)
    where
        C: Connector,
        A: SessionApi,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<Signal>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GameClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(SharedState::new());
        let shutdown_timeout = config.shutdown_timeout;

        let driver = SessionDriver {
            connector: Arc::new(connector),
            api: Arc::new(api),
            config,
            shared: Arc::clone(&state),
            event_tx,
            undelivered: VecDeque::new(),
            signal_tx,
            store: SessionStore::new(),
            current: None,
            next_generation: 0,
            request_seq: 0,
            location: None,
        };
        let task = tokio::spawn(driver.run(cmd_rx, signal_rx, shutdown_rx));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Session identity ────────────────────────────────────────────

    /// Page-load entry point: resume the session named in `location`.
    ///
    /// Without a session id in the URL this reports
    /// [`AwaitingSession`](GameClientEvent::AwaitingSession) and returns
    /// `Ok(None)`. Otherwise the session is joined; on success a connection
    /// is opened and the id is returned, on failure the query string is
    /// cleared and the join error is returned.
    ///
    /// # Errors
    ///
    /// The join error, [`ClientError::Superseded`] if an explicit create or
    /// join overtook this one, or [`ClientError::NotConnected`] if the
    /// client has shut down.
    pub async fn resume(&self, location: Url) -> Result<Option<SessionId>> {
        self.request(|reply| Command::Resume { location, reply })
            .await
    }

    /// Create a new session (`POST /game`) and connect to it.
    ///
    /// # Errors
    ///
    /// The request error, or [`ClientError::Superseded`] if a newer create
    /// or join was issued before this one completed.
    pub async fn create_session(&self) -> Result<SessionId> {
        self.request(|reply| Command::Create { reply }).await
    }

    /// Join an existing session (`POST /game/{id}`) and connect to it.
    ///
    /// `session_id` is user input: it is trimmed and must not be empty.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidSessionId`] for unusable input, the request
    /// error, or [`ClientError::Superseded`].
    pub async fn join_session(&self, session_id: &str) -> Result<SessionId> {
        let session_id: SessionId = session_id.parse()?;
        self.request(|reply| Command::Join { session_id, reply })
            .await
    }

    // ── Outbound commands ───────────────────────────────────────────

    /// Post a chat line.
    ///
    /// # Errors
    ///
    /// [`ClientError::EmptyChat`] for empty or whitespace-only text, or
    /// [`ClientError::NotConnected`] if the connection is not open. In both
    /// cases nothing is sent.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        self.send(ClientMessage::Chat { chat: text.into() }).await
    }

    /// Announce readiness. The local flag is updated as soon as the frame is
    /// queued, without waiting for the server.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] if the connection is not open; the flag
    /// is left unchanged.
    pub async fn set_ready(&self, ready: bool) -> Result<()> {
        self.send(ClientMessage::SetReady { ready }).await
    }

    /// Flip the local readiness flag and announce the new value.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] if the connection is not open.
    pub async fn toggle_ready(&self) -> Result<bool> {
        self.request(|reply| Command::ToggleReady { reply }).await
    }

    /// Play a move. Legality is decided by the server.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] if the connection is not open.
    pub async fn send_move(&self, play: MoveData) -> Result<()> {
        self.send(ClientMessage::Move { play }).await
    }

    /// Shut down the client, abandoning the current connection and stopping
    /// the background driver.
    pub async fn shutdown(&mut self) {
        debug!("GameClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // If the driver does not exit in time, abort it so the task cannot
        // detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session driver terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session driver did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session driver aborted: {join_err}");
                    }
                }
            }
        }

        self.state.running.store(false, Ordering::Release);
        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the current connection is open.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// The session the client is bound to, if any.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.session_id.lock().await.clone()
    }

    /// The last transcript received from the server.
    pub async fn chat_transcript(&self) -> Vec<ChatEntry> {
        self.state.store.lock().await.chat_transcript().to_vec()
    }

    /// The transcript rendered for display.
    pub async fn rendered_transcript(&self) -> String {
        self.state.store.lock().await.render_transcript()
    }

    /// The last game state snapshot received from the server.
    pub async fn game_state(&self) -> Option<Value> {
        self.state.store.lock().await.game_state().cloned()
    }

    /// The readiness this client last announced.
    pub async fn is_ready(&self) -> bool {
        self.state.store.lock().await.current_readiness()
    }

    /// The page location as last written by the client, once
    /// [`resume`](Self::resume) has provided one.
    pub async fn location(&self) -> Option<Url> {
        self.state.location.lock().await.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn send(&self, message: ClientMessage) -> Result<()> {
        self.request(|reply| Command::Send { message, reply }).await
    }

    /// Queue a command and wait for the driver's answer.
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        if !self.state.running.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        let (reply, answer) = oneshot::channel();
        self.cmd_tx
            .send(build(reply))
            .map_err(|_| ClientError::NotConnected)?;
        answer.await.map_err(|_| ClientError::NotConnected)?
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        // `Drop` cannot await a graceful shutdown; aborting drops the driver,
        // which drops the current handle and ends its link task.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session driver ──────────────────────────────────────────────────

/// The single task that owns the lifecycle and writes the store.
struct SessionDriver<C, A> {
    connector: Arc<C>,
    api: Arc<A>,
    config: ClientConfig,
    shared: Arc<SharedState>,
    event_tx: mpsc::Sender<GameClientEvent>,
    /// Events that must reach the consumer but found the channel full,
    /// oldest first.
    undelivered: VecDeque<GameClientEvent>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    store: SessionStore,
    current: Option<ConnectionHandle>,
    next_generation: u64,
    request_seq: u64,
    location: Option<Url>,
}

impl<C: Connector, A: SessionApi> SessionDriver<C, A> {
    /// Process commands and signals one at a time until shutdown.
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut signal_rx: mpsc::UnboundedReceiver<Signal>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!("session driver started");

        let event_tx = self.event_tx.clone();
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    break;
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            debug!("command channel closed, stopping session driver");
                            break;
                        }
                    }
                }

                // The driver holds a sender itself, so this never yields None.
                Some(signal) = signal_rx.recv() => self.handle_signal(signal).await,

                permit = event_tx.reserve(), if !self.undelivered.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = self.undelivered.pop_front() {
                                permit.send(event);
                            }
                        }
                        Err(_) => {
                            debug!("event channel closed, discarding undelivered events");
                            self.undelivered.clear();
                        }
                    }
                }
            }
        }

        // Dropping the handle closes its outbound channel, which ends the
        // link task and closes the transport.
        self.current = None;
        self.shared.connected.store(false, Ordering::Release);
        debug!("session driver exited");
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Resume { location, reply } => {
                self.location = Some(location.clone());
                *self.shared.location.lock().await = Some(location.clone());

                match identity::session_id_from_url(&location, &self.config.session_query_param) {
                    Some(session_id) => {
                        info!(%session_id, "resuming session from page location");
                        self.begin_request(
                            RequestKind::Resume(session_id),
                            RequestReply::Resume(reply),
                        );
                    }
                    None => {
                        debug!("no session in page location");
                        self.emit(GameClientEvent::AwaitingSession).await;
                        let _ = reply.send(Ok(None));
                    }
                }
            }
            Command::Create { reply } => {
                self.begin_request(RequestKind::Create, RequestReply::Bound(reply));
            }
            Command::Join { session_id, reply } => {
                self.begin_request(RequestKind::Join(session_id), RequestReply::Bound(reply));
            }
            Command::Send { message, reply } => {
                let result = self.send_message(message).await;
                let _ = reply.send(result);
            }
            Command::ToggleReady { reply } => {
                let ready = !self.store.current_readiness();
                let result = self
                    .send_message(ClientMessage::SetReady { ready })
                    .await
                    .map(|()| ready);
                let _ = reply.send(result);
            }
        }
    }

    /// Run a create/join round trip off the driver. Only the newest request
    /// is acted on when it completes.
    fn begin_request(&mut self, kind: RequestKind, reply: RequestReply) {
        self.request_seq += 1;
        let seq = self.request_seq;
        let api = Arc::clone(&self.api);
        let signal_tx = self.signal_tx.clone();

        tokio::spawn(async move {
            let result = match &kind {
                RequestKind::Create => api.create_session().await,
                RequestKind::Resume(id) | RequestKind::Join(id) => {
                    api.join_session(id).await.map(|()| id.clone())
                }
            };
            let _ = signal_tx.send(Signal::RequestDone {
                seq,
                kind,
                result,
                reply,
            });
        });
    }

    /// Encode and queue an outbound frame on the open connection.
    async fn send_message(&mut self, message: ClientMessage) -> Result<()> {
        let frame = command::encode(&message)?;

        let Some(handle) = self.current.as_ref() else {
            debug!("dropping outbound frame, no connection");
            return Err(ClientError::NotConnected);
        };
        if !handle.send(frame) {
            debug!(generation = handle.generation(), "dropping outbound frame, connection not open");
            return Err(ClientError::NotConnected);
        }

        if let ClientMessage::SetReady { ready } = message {
            self.store.set_readiness(ready);
            self.publish_store().await;
            self.emit(GameClientEvent::ReadinessChanged { ready }).await;
        }
        Ok(())
    }

    // ── Signals ─────────────────────────────────────────────────────

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Link(LinkSignal { generation, event }) => {
                self.handle_link_event(generation, event).await;
            }
            Signal::ReconnectDue { generation } => self.reconnect_due(generation).await,
            Signal::RequestDone {
                seq,
                kind,
                result,
                reply,
            } => {
                if seq != self.request_seq {
                    warn!(?kind, "ignoring result of a superseded session request");
                    reply.send(Err(ClientError::Superseded));
                    return;
                }
                let outcome = self.finish_request(kind, result).await;
                reply.send(outcome);
            }
        }
    }

    async fn finish_request(
        &mut self,
        kind: RequestKind,
        result: Result<SessionId>,
    ) -> Result<SessionId> {
        match result {
            Ok(session_id) => {
                info!(%session_id, ?kind, "session bound");
                *self.shared.session_id.lock().await = Some(session_id.clone());
                if let Some(location) = &self.location {
                    let url = identity::with_session_id(
                        location,
                        &self.config.session_query_param,
                        &session_id,
                    );
                    self.set_location(url).await;
                }
                self.emit(GameClientEvent::SessionBound {
                    session_id: session_id.clone(),
                })
                .await;
                self.open_connection(session_id.clone(), 0, self.config.max_reconnect_attempts)
                    .await;
                Ok(session_id)
            }
            Err(e) => {
                warn!(?kind, "session request failed: {e}");
                self.clear_location().await;
                self.emit(GameClientEvent::JoinFailed {
                    session_id: kind.session_id().cloned(),
                    error: e.to_string(),
                })
                .await;
                // A failed join leaves an existing connection running.
                if self.current.is_none() {
                    self.emit(GameClientEvent::AwaitingSession).await;
                }
                Err(e)
            }
        }
    }

    async fn handle_link_event(&mut self, generation: u64, event: LinkEvent) {
        let Some(handle) = self.current.as_mut().filter(|h| h.owns(generation)) else {
            debug!(generation, ?event, "ignoring signal from superseded connection");
            return;
        };

        match event {
            LinkEvent::Opened => {
                handle.mark_open();
                let session_id = handle.session_id().clone();
                self.shared.connected.store(true, Ordering::Release);
                info!(%session_id, generation, "connected");
                self.emit(GameClientEvent::Connected { session_id }).await;
            }
            LinkEvent::Frame(frame) => {
                let payload = match &frame {
                    InboundFrame::Text(text) => Payload::Text(text),
                    InboundFrame::Binary(bytes) => Payload::Binary(bytes),
                    InboundFrame::Close { .. } => return,
                };
                let events = dispatch::dispatch_payload(payload, &mut self.store);
                if events.iter().any(changes_store) {
                    self.publish_store().await;
                }
                for event in events {
                    self.emit(event).await;
                }
            }
            LinkEvent::Error(message) => {
                warn!(generation, "transport error: {message}");
            }
            LinkEvent::Closed { code, reason } => {
                let session_id = handle.session_id().clone();
                info!(%session_id, generation, code = code.as_u16(), %reason, "connection closed");
                self.shared.connected.store(false, Ordering::Release);

                match handle.mark_closed(code) {
                    CloseDisposition::Reconnect { retries_remaining } => {
                        let delay = self.config.reconnect_delay;
                        info!(
                            %session_id,
                            retries_remaining,
                            "reconnecting in {delay:?}"
                        );
                        self.schedule_reconnect(generation, delay);
                        self.emit(GameClientEvent::Reconnecting {
                            session_id,
                            code,
                            reason,
                            retries_remaining,
                            delay,
                        })
                        .await;
                    }
                    CloseDisposition::Terminal { budget_exhausted } => {
                        self.end_session(session_id, code, reason, budget_exhausted)
                            .await;
                    }
                }
            }
        }
    }

    fn schedule_reconnect(&self, generation: u64, delay: Duration) {
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signal_tx.send(Signal::ReconnectDue { generation });
        });
    }

    async fn reconnect_due(&mut self, generation: u64) {
        let Some(handle) = self
            .current
            .as_ref()
            .filter(|h| h.owns(generation) && h.phase() == lifecycle::LinkPhase::Closed)
        else {
            debug!(generation, "reconnect timer fired for a superseded connection");
            return;
        };
        let session_id = handle.session_id().clone();
        let attempt = handle.attempt() + 1;
        let retries_remaining = handle.retries_remaining();
        self.open_connection(session_id, attempt, retries_remaining)
            .await;
    }

    /// Make a new handle current and start its link task. Any previous
    /// handle is superseded.
    async fn open_connection(&mut self, session_id: SessionId, attempt: u32, retries_remaining: u32) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        self.current = Some(ConnectionHandle::new(
            session_id.clone(),
            generation,
            attempt,
            retries_remaining,
            outbound_tx,
        ));
        self.shared.connected.store(false, Ordering::Release);

        // A new connection starts from an empty view and waits for the
        // server's next state frame.
        self.store.reset_view();
        self.publish_store().await;

        let link_signals = self.forward_link_signals();
        tokio::spawn(lifecycle::run_link(
            Arc::clone(&self.connector),
            session_id.clone(),
            generation,
            outbound_rx,
            link_signals,
        ));

        self.emit(GameClientEvent::Connecting {
            session_id,
            attempt,
        })
        .await;
    }

    /// A sender for link tasks that wraps their signals into [`Signal::Link`]
    /// on the driver's ordered signal channel.
    fn forward_link_signals(&self) -> mpsc::UnboundedSender<LinkSignal> {
        let (tx, mut rx) = mpsc::unbounded_channel::<LinkSignal>();
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                if signal_tx.send(Signal::Link(signal)).is_err() {
                    break;
                }
            }
        });
        tx
    }

    /// Terminal close: forget the session and return to the pre-connection
    /// state.
    async fn end_session(
        &mut self,
        session_id: SessionId,
        code: CloseCode,
        reason: String,
        budget_exhausted: bool,
    ) {
        info!(%session_id, code = code.as_u16(), budget_exhausted, "session ended");
        self.current = None;
        *self.shared.session_id.lock().await = None;
        self.clear_location().await;

        self.deliver(GameClientEvent::Disconnected {
            session_id,
            code,
            reason,
            budget_exhausted,
        });
        self.emit(GameClientEvent::AwaitingSession).await;
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn set_location(&mut self, url: Url) {
        if self.location.as_ref() == Some(&url) {
            return;
        }
        debug!(%url, "page location changed");
        self.location = Some(url.clone());
        *self.shared.location.lock().await = Some(url.clone());
        self.emit(GameClientEvent::LocationChanged { url }).await;
    }

    /// Drop the query string from the page location, if one is known.
    async fn clear_location(&mut self) {
        if let Some(url) = self.location.as_ref().map(identity::without_session) {
            self.set_location(url).await;
        }
    }

    /// Copy the driver's store to the shared snapshot readers see.
    async fn publish_store(&self) {
        *self.shared.store.lock().await = self.store.clone();
    }

    /// Queue an event that must not be dropped. If the channel is full it
    /// waits in `undelivered` and the run loop sends it once the consumer
    /// frees a slot.
    fn deliver(&mut self, event: GameClientEvent) {
        if !self.undelivered.is_empty() {
            self.undelivered.push_back(event);
            return;
        }
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!("event channel full, holding event until the consumer catches up");
                self.undelivered.push_back(event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Emit an event. If the channel is full, log a warning and drop the
    /// event so the driver never blocks on the consumer. Events behind an
    /// undelivered one are dropped too, so delivery order is kept.
    async fn emit(&mut self, event: GameClientEvent) {
        if !self.undelivered.is_empty() {
            warn!(
                "event channel backed up, dropping event: {:?}",
                std::mem::discriminant(&event)
            );
            return;
        }
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }
}

fn changes_store(event: &GameClientEvent) -> bool {
    matches!(
        event,
        GameClientEvent::ChatTranscriptReplaced { .. } | GameClientEvent::GameStateReplaced { .. }
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.session_query_param, "game_id");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = ClientConfig::new()
            .with_session_query_param("session")
            .with_max_reconnect_attempts(2)
            .with_reconnect_delay(Duration::from_millis(250))
            .with_event_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.session_query_param, "session");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn state_events_are_flagged() {
        assert!(changes_store(&GameClientEvent::GameStateReplaced {
            state: Value::Null
        }));
        assert!(!changes_store(&GameClientEvent::AwaitingSession));
    }
}
