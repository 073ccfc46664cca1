//! Transport abstraction for the Battleline session protocol.
//!
//! A [`Transport`] is one live, bidirectional frame channel to a session. A
//! [`Connector`] opens a fresh transport for a session id; the client asks
//! for a new one on every connection attempt, including automatic
//! reconnects, so connection setup stays outside the lifecycle code.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use battleline_client::error::ClientError;
//! use battleline_client::protocol::SessionId;
//! use battleline_client::transport::{Connector, InboundFrame, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         // Send the JSON text frame
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>> {
//!         // Deliver the next frame, including the server's close frame
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, session_id: &SessionId) -> Result<MyTransport, ClientError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::close_code::CloseCode;
use crate::error::ClientError;
use crate::protocol::SessionId;

/// One inbound item from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text frame; expected to hold one JSON message.
    Text(String),
    /// A binary frame. The protocol never sends these.
    Binary(Vec<u8>),
    /// The peer closed the connection.
    Close { code: CloseCode, reason: String },
}

/// A bidirectional text frame transport to one game session.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because it is polled
/// inside `tokio::select!`. Channel-based implementations (wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Receive the next inbound frame.
    ///
    /// Returns:
    /// - `Some(Ok(frame))`: a frame arrived, possibly [`InboundFrame::Close`]
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the stream ended without a close frame
    async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens transports to game sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Open a new connection to `session_id`.
    ///
    /// # Errors
    ///
    /// Any error is treated by the client like an abnormal (1006) close.
    async fn connect(&self, session_id: &SessionId) -> Result<Self::Transport, ClientError>;
}
