//! # Battleline Client
//!
//! Async client core for Battleline, a two-player online card game.
//!
//! The crate covers everything between the player's page and the game
//! server: which session the page is bound to, creating and joining
//! sessions, keeping one live connection to the session with bounded
//! automatic reconnects, decoding server frames into a local view of the
//! chat transcript and game state, and encoding the player's commands.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Connector`] and [`Transport`] for any backend
//! - **WebSocket built-in**: default `transport-websocket` feature provides [`WebSocketConnector`]
//! - **HTTP session API**: default `http-api` feature provides [`HttpSessionApi`]
//! - **Event-driven**: receive typed [`GameClientEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "transport-websocket", feature = "http-api"))]
//! # async fn demo() -> Result<(), battleline_client::ClientError> {
//! use battleline_client::{ClientConfig, GameClient, GameClientEvent, HttpSessionApi, WebSocketConnector};
//! use url::Url;
//!
//! let server = Url::parse("http://localhost:8080/")?;
//! let (client, mut events) = GameClient::start(
//!     WebSocketConnector::new(server.clone()),
//!     HttpSessionApi::new(server)?,
//!     ClientConfig::new(),
//! );
//!
//! let session_id = client.create_session().await?;
//! println!("share this id: {session_id}");
//!
//! while let Some(event) = events.recv().await {
//!     if let GameClientEvent::Connected { .. } = event {
//!         client.send_chat("hello").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod close_code;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod identity;
pub mod lifecycle;
pub mod protocol;
pub mod session_api;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ClientConfig, GameClient};
pub use close_code::CloseCode;
pub use error::ClientError;
pub use event::GameClientEvent;
pub use protocol::{Card, ChatEntry, ClientMessage, MoveData, ServerFrame, SessionId, Suit};
#[cfg(feature = "http-api")]
pub use session_api::HttpSessionApi;
pub use session_api::SessionApi;
pub use store::SessionStore;
pub use transport::{Connector, InboundFrame, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
