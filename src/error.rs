//! Error types for the Battleline client.

use thiserror::Error;

/// Errors that can occur when using the Battleline client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The current connection is not open, so no frame can be sent.
    #[error("not connected to a game session")]
    NotConnected,

    /// A chat message was empty or whitespace only.
    #[error("chat message is empty")]
    EmptyChat,

    /// A session id was empty or otherwise unusable.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// A URL could not be parsed or joined.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The session endpoint answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Request {
        /// HTTP status code returned by the server.
        status: u16,
        /// The endpoint that was requested.
        url: String,
    },

    /// The HTTP client failed before a response was available.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A newer create/join request was issued before this one completed.
    #[error("request superseded by a newer create or join")]
    Superseded,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Battleline client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
