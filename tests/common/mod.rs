#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Battleline client integration tests.
//!
//! Provides a channel-based [`MockConnector`] that hands every connection it
//! opens to the test as a [`MockLink`], a scripted [`MockSessionApi`], and
//! helper functions for constructing server frame JSON strings.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use battleline_client::{
    ClientError, CloseCode, Connector, GameClientEvent, InboundFrame, SessionApi, SessionId,
    Transport,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

type Scripted = Option<Result<InboundFrame, ClientError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A transport whose inbound side is driven by a [`MockLink`].
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Scripted>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::TransportClosed);
        }
        self.sent
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            // The test dropped its link; stay open until the client lets go.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ── MockLink ────────────────────────────────────────────────────────

/// The server side of one connection opened through [`MockConnector`].
pub struct MockLink {
    pub session_id: SessionId,
    server: mpsc::UnboundedSender<Scripted>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockLink {
    /// Deliver a text frame.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.server.send(Some(Ok(InboundFrame::Text(text.into()))));
    }

    /// Deliver a JSON text frame.
    pub fn push_json(&self, value: Value) {
        self.push_text(value.to_string());
    }

    /// Deliver a binary frame.
    pub fn push_binary(&self, bytes: &[u8]) {
        let _ = self
            .server
            .send(Some(Ok(InboundFrame::Binary(bytes.to_vec()))));
    }

    /// Close the connection with `code`.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.server.send(Some(Ok(InboundFrame::Close {
            code: CloseCode::from(code),
            reason: reason.into(),
        })));
    }

    /// End the stream without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.server.send(None);
    }

    /// Fail the next receive.
    pub fn fail(&self, message: &str) {
        let _ = self
            .server
            .send(Some(Err(ClientError::TransportReceive(message.into()))));
    }

    /// Next frame the client sent, parsed as JSON.
    pub async fn next_sent(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("transport dropped");
        serde_json::from_str(&text).expect("outbound frame is JSON")
    }

    /// Returns `true` if nothing has been sent and not yet read.
    pub fn nothing_sent(&mut self) -> bool {
        self.sent.try_recv().is_err()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait until the client closes this connection.
    pub async fn wait_closed(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection was not closed");
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Opens [`MockTransport`]s and hands the server side to the test.
pub struct MockConnector {
    links: mpsc::UnboundedSender<MockLink>,
    refuse: Arc<AtomicBool>,
    connect_delay: Duration,
    session_delays: HashMap<String, Duration>,
    connects: Arc<StdMutex<Vec<SessionId>>>,
}

/// Test-side controls for a [`MockConnector`].
pub struct ConnectorControl {
    pub links: mpsc::UnboundedReceiver<MockLink>,
    pub refuse: Arc<AtomicBool>,
    pub connects: Arc<StdMutex<Vec<SessionId>>>,
}

impl ConnectorControl {
    /// Wait for the client to open the next connection.
    pub async fn next_link(&mut self) -> MockLink {
        tokio::time::timeout(Duration::from_secs(30), self.links.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Returns `true` if no connection is opened within `wait`.
    pub async fn no_link_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.links.recv()).await.is_err()
    }

    /// Session ids of every connection attempt so far, refused ones included.
    pub fn connects(&self) -> Vec<SessionId> {
        self.connects.lock().unwrap().clone()
    }
}

impl MockConnector {
    pub fn new() -> (Self, ConnectorControl) {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(false));
        let connects = Arc::new(StdMutex::new(Vec::new()));
        let connector = Self {
            links: links_tx,
            refuse: Arc::clone(&refuse),
            connect_delay: Duration::ZERO,
            session_delays: HashMap::new(),
            connects: Arc::clone(&connects),
        };
        let server = ConnectorControl {
            links: links_rx,
            refuse,
            connects,
        };
        (connector, server)
    }

    /// Hold every connect for `delay` before it succeeds or fails.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Hold connects to `id` for `delay`, overriding the default delay.
    pub fn with_connect_delay_for(mut self, id: &str, delay: Duration) -> Self {
        self.session_delays.insert(id.to_string(), delay);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, session_id: &SessionId) -> Result<MockTransport, ClientError> {
        self.connects.lock().unwrap().push(session_id.clone());
        let delay = self
            .session_delays
            .get(session_id.as_str())
            .copied()
            .unwrap_or(self.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::Acquire) {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let link = MockLink {
            session_id: session_id.clone(),
            server: server_tx,
            sent: sent_rx,
            closed: Arc::clone(&closed),
        };
        let _ = self.links.send(link);

        Ok(MockTransport {
            incoming: server_rx,
            sent: sent_tx,
            closed,
        })
    }
}

// ── MockSessionApi ──────────────────────────────────────────────────

/// Scripted create/join endpoints.
#[derive(Clone, Default)]
pub struct MockSessionApi {
    created: Option<SessionId>,
    joinable: HashSet<String>,
    delays: HashMap<String, Duration>,
    /// Every call, as `"create"` or `"join:<id>"`.
    pub calls: Arc<StdMutex<Vec<String>>>,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create_session` answers with `id`; without this it fails with 500.
    pub fn creating(mut self, id: &str) -> Self {
        self.created = Some(SessionId::new(id));
        self.joinable.insert(id.to_string());
        self
    }

    /// `join_session(id)` succeeds; other ids are rejected with 400.
    pub fn joinable(mut self, id: &str) -> Self {
        self.joinable.insert(id.to_string());
        self
    }

    /// Hold requests for `id` (or `"create"`) for `delay`.
    pub fn delayed(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn pause(&self, key: &str) {
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn create_session(&self) -> Result<SessionId, ClientError> {
        self.calls.lock().unwrap().push("create".into());
        self.pause("create").await;
        self.created.clone().ok_or_else(|| ClientError::Request {
            status: 500,
            url: "http://localhost/game".into(),
        })
    }

    async fn join_session(&self, session_id: &SessionId) -> Result<(), ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("join:{session_id}"));
        self.pause(session_id.as_str()).await;
        if self.joinable.contains(session_id.as_str()) {
            Ok(())
        } else {
            Err(ClientError::Request {
                status: 400,
                url: format!("http://localhost/game/{session_id}"),
            })
        }
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Receive events until one matches `pred`, returning it. Panics on timeout.
pub async fn wait_for(
    events: &mut mpsc::Receiver<GameClientEvent>,
    pred: impl Fn(&GameClientEvent) -> bool,
) -> GameClientEvent {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Drain everything currently queued.
pub fn drain(events: &mut mpsc::Receiver<GameClientEvent>) -> Vec<GameClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ── JSON helper functions ───────────────────────────────────────────

/// A chat transcript entry as the server sends it.
pub fn chat_entry_json(nickname: &str, content: &str) -> Value {
    json!({
        "timestamp": "2024-03-01T12:00:00Z",
        "clientId": format!("client-{nickname}"),
        "nickname": nickname,
        "content": content,
    })
}

/// A `sync` frame carrying `state` and the given transcript.
pub fn sync_json(state: Value, chat_log: Vec<Value>) -> Value {
    json!({
        "type": "sync",
        "timestamp": "2024-03-01T12:00:00Z",
        "state": state,
        "session": { "chatLog": chat_log },
    })
}

/// A `client_chat` frame carrying only the transcript.
pub fn client_chat_json(chat_log: Vec<Value>) -> Value {
    json!({
        "type": "client_chat",
        "clientIdx": 0,
        "session": { "chatLog": chat_log },
    })
}

/// A log-only frame of the given type.
pub fn notice_json(kind: &str, client_idx: u8) -> Value {
    json!({ "type": kind, "clientIdx": client_idx })
}

/// An `error` frame.
pub fn error_json(message: &str) -> Value {
    json!({ "type": "error", "error": { "message": message } })
}
