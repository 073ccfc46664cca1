//! Events emitted to the rendering side of the client.
//!
//! Every state transition, status line and replaced value is reported as a
//! [`GameClientEvent`] on the receiver returned by
//! [`GameClient::start`](crate::GameClient::start). The current values can
//! also be read from the client handle at any time.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::close_code::CloseCode;
use crate::protocol::{ChatEntry, SessionId, SessionMessageType};

/// High-level events produced by the session driver.
#[derive(Debug, Clone)]
pub enum GameClientEvent {
    /// A create or join request succeeded and the client is now bound to
    /// `session_id`. The id should be shown for sharing.
    SessionBound { session_id: SessionId },

    /// The page location changed; mirror it into the address bar
    /// (`pushState`, no reload).
    LocationChanged { url: Url },

    /// A connection attempt started. `attempt` is 0 for the first
    /// connection of a session and counts reconnects after that.
    Connecting { session_id: SessionId, attempt: u32 },

    /// The connection is open; chat and ready controls may be shown.
    Connected { session_id: SessionId },

    /// The connection closed with a retryable code and a new attempt is
    /// scheduled after `delay`.
    Reconnecting {
        session_id: SessionId,
        code: CloseCode,
        reason: String,
        retries_remaining: u32,
        delay: Duration,
    },

    /// The connection closed for good. This event is never dropped; if the
    /// channel is full it waits, in order, for the consumer to catch up.
    Disconnected {
        session_id: SessionId,
        code: CloseCode,
        reason: String,
        /// `true` when a retryable close ran out of reconnect attempts.
        budget_exhausted: bool,
    },

    /// No session is active; show the create-or-join controls.
    AwaitingSession,

    /// A create or join request failed.
    JoinFailed {
        session_id: Option<SessionId>,
        error: String,
    },

    /// Log-only server event rendered as a status line.
    Status {
        kind: SessionMessageType,
        line: String,
    },

    /// The server sent an `error` frame.
    ServerError { message: String, payload: Value },

    /// The chat transcript was replaced.
    ChatTranscriptReplaced { entries: Vec<ChatEntry> },

    /// The game state snapshot was replaced.
    GameStateReplaced { state: Value },

    /// This client's readiness flag changed.
    ReadinessChanged { ready: bool },

    /// A frame was discarded because it was not a JSON text frame.
    MalformedFrame { error: String, raw: String },

    /// A well-formed frame with a type this client does not know.
    UnrecognizedFrame { kind: String, raw: String },
}
