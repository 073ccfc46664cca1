//! Wire types for the Battleline session protocol.
//!
//! Inbound frames are JSON objects with a `type` discriminator plus optional
//! `state`, `session` and `error` members. Go's `encoding/json` writes absent
//! pointers as `null`, so every optional member treats `null` as missing.
//!
//! Outbound frames are adjacently tagged: `{"type": "...", "data": {...}}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

// ── Identifiers ─────────────────────────────────────────────────────

/// Opaque token identifying a server-side game session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a server-issued identifier without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = ClientError;

    /// Parse user input (a join form or a query parameter) into a session id.
    ///
    /// Surrounding whitespace is trimmed. Empty input, ids containing a path
    /// separator and the dot segments `.` and `..` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed == "." || trimmed == ".." {
            return Err(ClientError::InvalidSessionId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Body of a successful `POST /game` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: SessionId,
}

// ── Chat ────────────────────────────────────────────────────────────

/// One line of the server-owned chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    #[serde(default)]
    pub nickname: String,
    pub content: String,
    /// RFC 3339 timestamp as sent by the server.
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

// ── Inbound frames ──────────────────────────────────────────────────

/// Discriminator of an inbound frame.
///
/// Revisions of the server have used different names for the same events
/// (`tick`/`sync`, `chat`/`client_chat`); both spellings are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessageType {
    Ping,
    Sync,
    Tick,
    Error,
    Close,
    SessionStart,
    SessionEnd,
    ClientReady,
    ClientUnready,
    ClientMove,
    ClientChat,
    Chat,
    ClientConnect,
    ClientDisconnect,
    /// Any type this client does not know about.
    Unknown(String),
}

impl SessionMessageType {
    /// Wire name of this message type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Sync => "sync",
            Self::Tick => "tick",
            Self::Error => "error",
            Self::Close => "close",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::ClientReady => "client_ready",
            Self::ClientUnready => "client_unready",
            Self::ClientMove => "client_move",
            Self::ClientChat => "client_chat",
            Self::Chat => "chat",
            Self::ClientConnect => "client_connect",
            Self::ClientDisconnect => "client_disconnect",
            Self::Unknown(name) => name,
        }
    }

    /// Returns `true` for types whose frames carry session state to apply.
    pub fn carries_state(&self) -> bool {
        matches!(
            self,
            Self::Sync | Self::Tick | Self::ClientChat | Self::Chat | Self::ClientMove
        )
    }
}

impl From<&str> for SessionMessageType {
    fn from(name: &str) -> Self {
        match name {
            "ping" => Self::Ping,
            "sync" => Self::Sync,
            "tick" => Self::Tick,
            "error" => Self::Error,
            "close" => Self::Close,
            "session_start" => Self::SessionStart,
            "session_end" => Self::SessionEnd,
            "client_ready" => Self::ClientReady,
            "client_unready" => Self::ClientUnready,
            "client_move" => Self::ClientMove,
            "client_chat" => Self::ClientChat,
            "chat" => Self::Chat,
            "client_connect" => Self::ClientConnect,
            "client_disconnect" => Self::ClientDisconnect,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SessionMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound frame as pushed by the session server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Seat index of the receiving client within the session.
    #[serde(rename = "clientIdx", default, skip_serializing_if = "Option::is_none")]
    pub client_idx: Option<i64>,
    /// Opaque, per-player game state snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Session snapshot; `chatLog` is the only member this client reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ServerFrame {
    /// The frame's discriminator.
    pub fn message_type(&self) -> SessionMessageType {
        SessionMessageType::from(self.kind.as_str())
    }

    /// The game state snapshot, if the frame carries a non-null one.
    pub fn game_state(&self) -> Option<&Value> {
        self.state.as_ref().filter(|v| !v.is_null())
    }

    /// Decode `session.chatLog`.
    ///
    /// Returns `None` when the frame carries no transcript at all, and
    /// `Some(Err(_))` when one is present but malformed.
    pub fn chat_log(&self) -> Option<Result<Vec<ChatEntry>, serde_json::Error>> {
        let log = self.session.as_ref()?.get("chatLog")?;
        if log.is_null() {
            return None;
        }
        Some(Vec::<ChatEntry>::deserialize(log))
    }

    /// Human-readable message of an `error` payload, falling back to the
    /// payload's JSON text.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|v| !v.is_null())?;
        Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )
    }
}

// ── Moves ───────────────────────────────────────────────────────────

/// Card suit, encoded on the wire as its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Suit {
    Red,
    Green,
    Blue,
    Purple,
    Yellow,
    Orange,
}

impl From<Suit> for u8 {
    fn from(suit: Suit) -> Self {
        match suit {
            Suit::Red => 0,
            Suit::Green => 1,
            Suit::Blue => 2,
            Suit::Purple => 3,
            Suit::Yellow => 4,
            Suit::Orange => 5,
        }
    }
}

impl TryFrom<u8> for Suit {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::Red),
            1 => Ok(Self::Green),
            2 => Ok(Self::Blue),
            3 => Ok(Self::Purple),
            4 => Ok(Self::Yellow),
            5 => Ok(Self::Orange),
            other => Err(format!("unknown suit index {other}")),
        }
    }
}

/// A troop card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub value: u8,
}

/// Kind of move a player makes on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveAction {
    Placement,
    Draw,
    Claim,
}

/// Payload of an outbound `move` frame. The server validates legality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveData {
    pub action: MoveAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<u8>,
    #[serde(rename = "tacticsDeck", default, skip_serializing_if = "Option::is_none")]
    pub tactics_deck: Option<bool>,
}

impl MoveData {
    /// Place `card` from the hand onto `lane`.
    pub fn placement(card: Card, lane: u8) -> Self {
        Self {
            action: MoveAction::Placement,
            card: Some(card),
            lane: Some(lane),
            tactics_deck: None,
        }
    }

    /// Claim `lane`.
    pub fn claim(lane: u8) -> Self {
        Self {
            action: MoveAction::Claim,
            card: None,
            lane: Some(lane),
            tactics_deck: None,
        }
    }

    /// Draw from the tactics deck (`true`) or the troop deck (`false`).
    pub fn draw(tactics_deck: bool) -> Self {
        Self {
            action: MoveAction::Draw,
            card: None,
            lane: None,
            tactics_deck: Some(tactics_deck),
        }
    }
}

// ── Outbound frames ─────────────────────────────────────────────────

/// Frames sent from the client to the session server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Post a line to the session chat.
    Chat { chat: String },
    /// Announce this player's readiness.
    SetReady { ready: bool },
    /// Play a move.
    Move {
        #[serde(rename = "move")]
        play: MoveData,
    },
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
    use serde_json::json;

    #[test]
    fn session_id_parse_trims_and_rejects_blank() {
        let id: SessionId = "  abc123 ".parse().unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert!(matches!(
            "   ".parse::<SessionId>(),
            Err(ClientError::InvalidSessionId(_))
        ));
        assert!("a/b".parse::<SessionId>().is_err());
        assert!("..".parse::<SessionId>().is_err());
        assert!(".".parse::<SessionId>().is_err());
    }

    #[test]
    fn null_members_are_treated_as_absent() {
        let frame: ServerFrame = serde_json::from_value(json!({
            "type": "client_ready",
            "timestamp": "2025-01-01T00:00:00Z",
            "clientIdx": 1,
            "state": null,
            "session": null,
            "error": null
        }))
        .unwrap();
        assert!(frame.game_state().is_none());
        assert!(frame.chat_log().is_none());
        assert!(frame.error_message().is_none());
        assert_eq!(frame.client_idx, Some(1));
    }

    #[test]
    fn chat_log_is_decoded_from_session() {
        let frame: ServerFrame = serde_json::from_value(json!({
            "type": "client_chat",
            "session": {
                "id": "abc",
                "chatLog": [
                    {"content": "hi", "nickname": "ann", "timestamp": "t1", "clientId": "c1"}
                ]
            }
        }))
        .unwrap();
        let log = frame.chat_log().unwrap().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "hi");
        assert_eq!(log[0].client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn malformed_chat_log_is_reported() {
        let frame: ServerFrame = serde_json::from_value(json!({
            "type": "sync",
            "session": {"chatLog": "not a list"}
        }))
        .unwrap();
        assert!(frame.chat_log().unwrap().is_err());
    }

    #[test]
    fn error_message_falls_back_to_payload_text() {
        let frame: ServerFrame =
            serde_json::from_value(json!({"type": "error", "error": {"code": 7}})).unwrap();
        assert_eq!(frame.error_message().as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn legacy_names_are_state_carrying() {
        for name in ["tick", "sync", "chat", "client_chat", "client_move"] {
            assert!(SessionMessageType::from(name).carries_state(), "{name}");
        }
        for name in ["session_start", "client_ready", "client_unready", "error", "ping"] {
            assert!(!SessionMessageType::from(name).carries_state(), "{name}");
        }
        assert_eq!(
            SessionMessageType::from("surprise"),
            SessionMessageType::Unknown("surprise".into())
        );
    }

    #[test]
    fn suit_uses_index_on_the_wire() {
        let card = Card {
            suit: Suit::Purple,
            value: 9,
        };
        assert_eq!(serde_json::to_value(card).unwrap(), json!({"suit": 3, "value": 9}));
        assert!(serde_json::from_value::<Card>(json!({"suit": 6, "value": 1})).is_err());
    }
}
