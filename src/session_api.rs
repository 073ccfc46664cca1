//! Session creation and join endpoints.
//!
//! The HTTP side of the protocol is two opaque `POST`s: `/game` creates a
//! session and answers `{"id": "..."}`, `/game/{id}` joins one and answers
//! with a 2xx status on success. The server identifies returning players by
//! cookies it sets on join, so [`HttpSessionApi`] keeps a cookie store.

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::SessionId;

/// The session-management collaborator.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// Create a new session and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`](crate::ClientError::Request) for a
    /// non-success status, or a transport-level error.
    async fn create_session(&self) -> Result<SessionId>;

    /// Join (or rejoin) an existing session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`](crate::ClientError::Request) for a
    /// non-success status, or a transport-level error.
    async fn join_session(&self, session_id: &SessionId) -> Result<()>;
}

#[cfg(feature = "http-api")]
pub use http::HttpSessionApi;

#[cfg(feature = "http-api")]
mod http {
    use async_trait::async_trait;
    use tracing::{debug, info, warn};
    use url::Url;

    use super::SessionApi;
    use crate::error::{ClientError, Result};
    use crate::protocol::{CreateSessionResponse, SessionId};

    /// [`SessionApi`] over HTTP using `reqwest`.
    #[derive(Debug, Clone)]
    pub struct HttpSessionApi {
        client: reqwest::Client,
        base_url: Url,
    }

    impl HttpSessionApi {
        /// Build a client for the server at `base_url` (e.g.
        /// `http://localhost:8080/`).
        ///
        /// # Errors
        ///
        /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
        pub fn new(base_url: Url) -> Result<Self> {
            let client = reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .map_err(|e| ClientError::Http(e.to_string()))?;
            Ok(Self::with_client(client, base_url))
        }

        /// Use a preconfigured `reqwest` client (timeouts, proxies, ...).
        pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
            Self { client, base_url }
        }

        fn endpoint(&self, path: &str) -> Result<Url> {
            Ok(self.base_url.join(path)?)
        }

        /// `/game/{id}`, with the id encoded as a single path segment.
        fn session_endpoint(&self, session_id: &SessionId) -> Result<Url> {
            let mut url = self.endpoint("/game")?;
            url.path_segments_mut()
                .map_err(|()| {
                    ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
                })?
                .push(session_id.as_str());
            Ok(url)
        }

        async fn post(&self, url: Url) -> Result<reqwest::Response> {
            debug!(%url, "POST");
            let response = self
                .client
                .post(url.clone())
                .send()
                .await
                .map_err(|e| ClientError::Http(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                warn!(%url, status = status.as_u16(), "session request rejected");
                return Err(ClientError::Request {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            Ok(response)
        }
    }

    #[async_trait]
    impl SessionApi for HttpSessionApi {
        async fn create_session(&self) -> Result<SessionId> {
            let response = self.post(self.endpoint("/game")?).await?;
            let body: CreateSessionResponse = response
                .json()
                .await
                .map_err(|e| ClientError::Http(e.to_string()))?;
            info!(session_id = %body.id, "session created");
            Ok(body.id)
        }

        async fn join_session(&self, session_id: &SessionId) -> Result<()> {
            let url = self.session_endpoint(session_id)?;
            self.post(url).await?;
            info!(%session_id, "session joined");
            Ok(())
        }
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
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        /// Serve exactly one HTTP request with a canned response; report the
        /// request line back.
        async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, oneshot::Receiver<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel();

            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let text = String::from_utf8_lossy(&request).to_string();
                let first_line = text.lines().next().unwrap_or_default().to_string();
                let _ = tx.send(first_line);

                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            });

            (Url::parse(&format!("http://{addr}/")).unwrap(), rx)
        }

        #[tokio::test]
        async fn create_returns_the_new_id() {
            let (base, request) = serve_once("201 Created", r#"{"id":"abc123"}"#).await;
            let api = HttpSessionApi::new(base).unwrap();

            let id = api.create_session().await.unwrap();
            assert_eq!(id, SessionId::new("abc123"));
            assert_eq!(request.await.unwrap(), "POST /game HTTP/1.1");
        }

        #[tokio::test]
        async fn join_posts_to_the_session_path() {
            let (base, request) = serve_once("200 OK", "{}").await;
            let api = HttpSessionApi::new(base).unwrap();

            api.join_session(&SessionId::new("xyz")).await.unwrap();
            assert_eq!(request.await.unwrap(), "POST /game/xyz HTTP/1.1");
        }

        #[tokio::test]
        async fn join_encodes_the_session_id_as_one_segment() {
            let (base, request) = serve_once("200 OK", "{}").await;
            let api = HttpSessionApi::new(base.join("lobby/").unwrap()).unwrap();

            api.join_session(&SessionId::new("a?b#c")).await.unwrap();
            assert_eq!(request.await.unwrap(), "POST /game/a%3Fb%23c HTTP/1.1");
        }

        #[test]
        fn session_endpoint_stays_under_game() {
            let api = HttpSessionApi::new(Url::parse("http://localhost:8080/").unwrap()).unwrap();
            let url = api.session_endpoint(&SessionId::new("x y?z")).unwrap();
            assert_eq!(url.as_str(), "http://localhost:8080/game/x%20y%3Fz");
        }

        #[tokio::test]
        async fn join_rejection_reports_status() {
            let (base, _request) = serve_once("400 Bad Request", "").await;
            let api = HttpSessionApi::new(base).unwrap();

            let err = api.join_session(&SessionId::new("xyz")).await.unwrap_err();
            assert!(matches!(err, ClientError::Request { status: 400, .. }));
        }

        #[tokio::test]
        async fn unreachable_server_is_an_http_error() {
            let api = HttpSessionApi::new(Url::parse("http://127.0.0.1:1/").unwrap()).unwrap();
            let err = api.create_session().await.unwrap_err();
            assert!(matches!(err, ClientError::Http(_)));
        }
    }
}
