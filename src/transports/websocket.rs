//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] turns the server's HTTP base URL into the session
//! endpoint `ws(s)://host/ws/{session_id}` and opens a
//! [`WebSocketTransport`] to it. Both `ws://` and `wss://` are supported;
//! TLS is handled by [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::close_code::CloseCode;
use crate::error::ClientError;
use crate::protocol::SessionId;
use crate::transport::{Connector, InboundFrame, Transport};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not lose frames.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the URL is invalid or the connection
    /// cannot be established. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream (custom TLS, headers, ...).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but fails with
    /// [`ClientError::Timeout`] if the connection is not up within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if the deadline elapses, or any error
    /// that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| ClientError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ClientError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(InboundFrame::Text(text.to_string()))),
                Message::Binary(data) => return Some(Ok(InboundFrame::Binary(data.to_vec()))),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    let (code, reason) = match frame {
                        Some(frame) => (
                            CloseCode::from(u16::from(frame.code)),
                            frame.reason.as_str().to_string(),
                        ),
                        None => (CloseCode::NoStatus, String::new()),
                    };
                    return Some(Ok(InboundFrame::Close { code, reason }));
                }
                Message::Ping(_) => {
                    // tungstenite queues the Pong reply itself.
                    tracing::debug!("received WebSocket ping");
                }
                Message::Pong(_) => {
                    tracing::debug!("received WebSocket pong (ignored)");
                }
                Message::Frame(_) => {
                    // Never produced by the read half.
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }
}

/// Opens a [`WebSocketTransport`] per session at `/ws/{session_id}`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: Url,
    connect_timeout: Option<Duration>,
}

impl WebSocketConnector {
    /// `base_url` is the server's HTTP(S) or WS(S) origin.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: None,
        }
    }

    /// Give up on a connection attempt after `timeout`.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The WebSocket endpoint for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] with
    /// [`ErrorKind::InvalidInput`](std::io::ErrorKind::InvalidInput) if the
    /// base URL cannot carry a WebSocket endpoint.
    pub fn endpoint(&self, session_id: &SessionId) -> Result<Url, ClientError> {
        let invalid = || {
            ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot derive a WebSocket endpoint from {}", self.base_url),
            ))
        };

        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            _ => return Err(invalid()),
        };
        url.set_scheme(scheme).map_err(|()| invalid())?;
        url.set_query(None);
        url.set_fragment(None);
        url.set_path("ws");
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .push(session_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, session_id: &SessionId) -> Result<WebSocketTransport, ClientError> {
        let url = self.endpoint(session_id)?;
        match self.connect_timeout {
            Some(timeout) => WebSocketTransport::connect_with_timeout(url.as_str(), timeout).await,
            None => WebSocketTransport::connect(url.as_str()).await,
        }
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn endpoint_maps_scheme_and_path() {
        let connector = WebSocketConnector::new(Url::parse("http://localhost:8080/?game_id=x").unwrap());
        assert_eq!(
            connector.endpoint(&SessionId::new("abc123")).unwrap().as_str(),
            "ws://localhost:8080/ws/abc123"
        );

        let secure = WebSocketConnector::new(Url::parse("https://example.com/lobby").unwrap());
        assert_eq!(
            secure.endpoint(&SessionId::new("a b")).unwrap().as_str(),
            "wss://example.com/ws/a%20b"
        );
    }

    #[test]
    fn endpoint_rejects_other_schemes() {
        let connector = WebSocketConnector::new(Url::parse("ftp://example.com/").unwrap());
        assert!(matches!(
            connector.endpoint(&SessionId::new("abc")),
            Err(ClientError::Io(_))
        ));
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url").await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns its HTTP base URL.
    async fn start_mock_server<F, Fut>(handler: F) -> Url
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_delivers_text_in_order() {
        let base = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"type":"sync"}"#.into())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"tick"}"#.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new(base);
        let mut transport = connector.connect(&SessionId::new("abc")).await.unwrap();

        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            InboundFrame::Text(r#"{"type":"sync"}"#.into())
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            InboundFrame::Text(r#"{"type":"tick"}"#.into())
        );
    }

    #[tokio::test]
    async fn close_frame_carries_code_and_reason() {
        let base = start_mock_server(|mut ws| async move {
            ws.close(Some(CloseFrame {
                code: WsCloseCode::Policy,
                reason: "session full".into(),
            }))
            .await
            .unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(base)
            .connect(&SessionId::new("abc"))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            InboundFrame::Close {
                code: CloseCode::Policy,
                reason: "session full".into(),
            }
        );
    }

    #[tokio::test]
    async fn close_without_status_is_1005() {
        let base = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(base)
            .connect(&SessionId::new("abc"))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            InboundFrame::Close {
                code: CloseCode::NoStatus,
                reason: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn binary_frames_are_surfaced() {
        let base = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(base)
            .connect(&SessionId::new("abc"))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            InboundFrame::Binary(vec![0xDE, 0xAD])
        );
    }

    #[tokio::test]
    async fn send_reaches_the_server() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let base = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(text.to_string());
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(base)
            .connect(&SessionId::new("abc"))
            .await
            .unwrap();
        transport
            .send(r#"{"type":"chat","data":{"chat":"hi"}}"#.to_string())
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), r#"{"type":"chat","data":{"chat":"hi"}}"#);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let base =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketConnector::new(base)
            .connect(&SessionId::new("abc"))
            .await
            .unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, ClientError::TransportClosed));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // Accepts the TCP connection but never answers the handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let err = WebSocketTransport::connect_with_timeout(
            &format!("ws://{addr}/ws/abc"),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Timeout), "unexpected error {err:?}");
        server.abort();
    }
}
