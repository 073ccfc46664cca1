//! # Loopback Session Example
//!
//! Shows how to implement [`Connector`], [`Transport`] and [`SessionApi`]
//! with in-process channels, and drives a whole session against a tiny fake
//! server. This is useful for:
//!
//! - **Testing**: exercise rendering code without a real server
//! - **Custom backends**: adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_session
//! ```

use async_trait::async_trait;
use battleline_client::{
    ClientConfig, ClientError, Connector, GameClient, GameClientEvent, InboundFrame, SessionApi,
    SessionId, Transport,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based transport
// ─────────────────────────────────────────────────────────────────────

/// The client half of one loopback connection.
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.tx
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.rx.close();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector that hands every connection to the fake server
// ─────────────────────────────────────────────────────────────────────

/// The server half of one loopback connection.
pub struct ServerSide {
    pub session_id: SessionId,
    pub rx: mpsc::UnboundedReceiver<String>,
    pub tx: mpsc::UnboundedSender<InboundFrame>,
}

pub struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<ServerSide>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, session_id: &SessionId) -> Result<LoopbackTransport, ClientError> {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        self.accepted
            .send(ServerSide {
                session_id: session_id.clone(),
                rx: server_rx,
                tx: server_tx,
            })
            .map_err(|_| ClientError::TransportClosed)?;
        Ok(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Session endpoints backed by a shared list
// ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct LoopbackApi {
    sessions: Mutex<Vec<SessionId>>,
}

#[async_trait]
impl SessionApi for LoopbackApi {
    async fn create_session(&self) -> Result<SessionId, ClientError> {
        let mut sessions = self.sessions.lock().await;
        let id = SessionId::new(format!("loop{}", sessions.len() + 1));
        sessions.push(id.clone());
        Ok(id)
    }

    async fn join_session(&self, session_id: &SessionId) -> Result<(), ClientError> {
        if self.sessions.lock().await.contains(session_id) {
            Ok(())
        } else {
            Err(ClientError::Request {
                status: 400,
                url: format!("loopback:/game/{session_id}"),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: A fake server that answers chat and readiness
// ─────────────────────────────────────────────────────────────────────

async fn serve(mut conn: ServerSide) {
    let mut chat_log: Vec<Value> = Vec::new();
    let sync = json!({ "type": "sync", "state": { "turn": 0 }, "session": { "chatLog": [] } });
    let _ = conn.tx.send(InboundFrame::Text(sync.to_string()));

    while let Some(text) = conn.rx.recv().await {
        tracing::info!(session = %conn.session_id, "server received: {text}");
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let reply = match frame["type"].as_str() {
            Some("chat") => {
                chat_log.push(json!({
                    "nickname": "Player 1",
                    "content": frame["data"]["chat"],
                }));
                json!({ "type": "client_chat", "session": { "chatLog": chat_log } })
            }
            Some("set_ready") => json!({ "type": "client_ready", "clientIdx": 0 }),
            _ => json!({ "type": "error", "error": { "message": "unsupported" } }),
        };
        let _ = conn.tx.send(InboundFrame::Text(reply.to_string()));
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 5: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(conn) = accepted_rx.recv().await {
            tokio::spawn(serve(conn));
        }
    });

    let (mut client, mut events) = GameClient::start(
        LoopbackConnector {
            accepted: accepted_tx,
        },
        LoopbackApi::default(),
        ClientConfig::new(),
    );

    let session_id = client.create_session().await?;
    tracing::info!("created session {session_id}");

    let mut chats = 0;
    while let Some(event) = events.recv().await {
        match &event {
            GameClientEvent::Connected { session_id } => {
                tracing::info!("connected to {session_id}");
                client.toggle_ready().await?;
                client.send_chat("hello from the loopback").await?;
            }
            GameClientEvent::ChatTranscriptReplaced { .. } => {
                chats += 1;
                tracing::info!("transcript:\n{}", client.rendered_transcript().await);
                if chats == 2 {
                    break;
                }
            }
            other => tracing::info!("event: {other:?}"),
        }
    }

    tracing::info!(ready = client.is_ready().await, "done");
    client.shutdown().await;
    Ok(())
}
