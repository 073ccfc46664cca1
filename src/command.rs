//! Outbound command encoding.

use crate::error::{ClientError, Result};
use crate::protocol::ClientMessage;

/// Validate and serialize an outbound message into one JSON text frame.
///
/// # Errors
///
/// Returns [`ClientError::EmptyChat`] for a chat message that is empty or
/// only whitespace, and [`ClientError::Serialization`] if encoding fails.
pub fn encode(message: &ClientMessage) -> Result<String> {
    if let ClientMessage::Chat { chat } = message {
        if chat.trim().is_empty() {
            return Err(ClientError::EmptyChat);
        }
    }
    Ok(serde_json::to_string(message)?)
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
    use crate::protocol::{Card, MoveData, Suit};
    use serde_json::{json, Value};

    fn encoded(message: ClientMessage) -> Value {
        serde_json::from_str(&encode(&message).unwrap()).unwrap()
    }

    #[test]
    fn chat_frame_shape() {
        assert_eq!(
            encoded(ClientMessage::Chat {
                chat: "good game".into()
            }),
            json!({"type": "chat", "data": {"chat": "good game"}})
        );
    }

    #[test]
    fn whitespace_chat_is_rejected() {
        for text in ["", "  ", "\n\t"] {
            let err = encode(&ClientMessage::Chat { chat: text.into() }).unwrap_err();
            assert!(matches!(err, ClientError::EmptyChat));
        }
    }

    #[test]
    fn set_ready_frame_shape() {
        assert_eq!(
            encoded(ClientMessage::SetReady { ready: false }),
            json!({"type": "set_ready", "data": {"ready": false}})
        );
    }

    #[test]
    fn move_frames_omit_unused_fields() {
        let card = Card {
            suit: Suit::Blue,
            value: 7,
        };
        assert_eq!(
            encoded(ClientMessage::Move {
                play: MoveData::placement(card, 4)
            }),
            json!({"type": "move", "data": {"move": {
                "action": "placement", "card": {"suit": 2, "value": 7}, "lane": 4
            }}})
        );
        assert_eq!(
            encoded(ClientMessage::Move {
                play: MoveData::draw(true)
            }),
            json!({"type": "move", "data": {"move": {"action": "draw", "tacticsDeck": true}}})
        );
        assert_eq!(
            encoded(ClientMessage::Move {
                play: MoveData::claim(8)
            }),
            json!({"type": "move", "data": {"move": {"action": "claim", "lane": 8}}})
        );
    }
}
