//! Inbound frame parsing and routing.
//!
//! [`dispatch`] takes one inbound frame, validates it, applies whatever
//! session state it carries to the [`SessionStore`], and returns the events
//! the rendering side should see. It never fails: malformed or unexpected
//! input is logged, reported as an event, and leaves the store untouched.

use tracing::{debug, info, warn};

use crate::event::GameClientEvent;
use crate::protocol::{ServerFrame, SessionMessageType};
use crate::store::SessionStore;

/// Route a text or binary payload. Close frames are handled by the
/// lifecycle, not here.
pub fn dispatch_payload(payload: Payload<'_>, store: &mut SessionStore) -> Vec<GameClientEvent> {
    let text = match payload {
        Payload::Text(text) => text,
        Payload::Binary(bytes) => {
            warn!(len = bytes.len(), "discarding non-text frame");
            return vec![GameClientEvent::MalformedFrame {
                error: "expected a text frame".into(),
                raw: format!("<{} binary bytes>", bytes.len()),
            }];
        }
    };

    let frame = match serde_json::from_str::<ServerFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("failed to parse server frame: {e}; raw: {text}");
            return vec![GameClientEvent::MalformedFrame {
                error: e.to_string(),
                raw: text.to_string(),
            }];
        }
    };

    dispatch(frame, text, store)
}

/// A payload handed to [`dispatch_payload`].
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Route a parsed frame by its `type`.
pub fn dispatch(frame: ServerFrame, raw: &str, store: &mut SessionStore) -> Vec<GameClientEvent> {
    let kind = frame.message_type();
    match kind {
        SessionMessageType::Ping => {
            debug!("server ping");
            Vec::new()
        }
        SessionMessageType::Error => {
            let message = frame
                .error_message()
                .unwrap_or_else(|| "unspecified server error".to_string());
            warn!("server error: {message}");
            vec![GameClientEvent::ServerError {
                message,
                payload: frame.error.unwrap_or_default(),
            }]
        }
        SessionMessageType::Unknown(name) => {
            info!(kind = %name, "unrecognized server frame: {raw}");
            vec![GameClientEvent::UnrecognizedFrame {
                kind: name,
                raw: raw.to_string(),
            }]
        }
        kind if kind.carries_state() => apply_state(&frame, store),
        kind => {
            let line = status_line(&kind).to_string();
            info!(kind = %kind, "{line}");
            vec![GameClientEvent::Status { kind, line }]
        }
    }
}

/// Replace whatever the frame carries. Each member is applied on its own: a
/// malformed transcript does not stop a valid snapshot from landing.
fn apply_state(frame: &ServerFrame, store: &mut SessionStore) -> Vec<GameClientEvent> {
    let mut events = Vec::new();

    match frame.chat_log() {
        Some(Ok(entries)) => {
            debug!(entries = entries.len(), "replacing chat transcript");
            store.replace_chat_transcript(entries.clone());
            events.push(GameClientEvent::ChatTranscriptReplaced { entries });
        }
        Some(Err(e)) => {
            warn!(kind = %frame.kind, "keeping chat transcript, chatLog is malformed: {e}");
        }
        None => {}
    }

    if let Some(state) = frame.game_state() {
        store.replace_game_state(state.clone());
        events.push(GameClientEvent::GameStateReplaced {
            state: state.clone(),
        });
    }

    if events.is_empty() {
        debug!(kind = %frame.kind, "state frame carried nothing to apply");
    }
    events
}

fn status_line(kind: &SessionMessageType) -> &'static str {
    match kind {
        SessionMessageType::SessionStart => "The game has started.",
        SessionMessageType::SessionEnd => "The game has ended.",
        SessionMessageType::ClientReady => "A player is ready.",
        SessionMessageType::ClientUnready => "A player is no longer ready.",
        SessionMessageType::ClientConnect => "A player connected.",
        SessionMessageType::ClientDisconnect => "A player disconnected.",
        SessionMessageType::Close => "The server is closing the session.",
        _ => "Session update received.",
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
    use serde_json::json;

    fn text(store: &mut SessionStore, value: serde_json::Value) -> Vec<GameClientEvent> {
        let raw = value.to_string();
        dispatch_payload(Payload::Text(&raw), store)
    }

    #[test]
    fn sync_replaces_state_and_transcript() {
        let mut store = SessionStore::new();
        let events = text(
            &mut store,
            json!({"type": "sync", "state": {"turn": 1}, "session": {"chatLog": []}}),
        );
        assert_eq!(store.game_state(), Some(&json!({"turn": 1})));
        assert!(store.chat_transcript().is_empty());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn every_state_type_takes_the_same_path() {
        for kind in ["sync", "tick", "chat", "client_chat", "client_move"] {
            let mut store = SessionStore::new();
            text(
                &mut store,
                json!({
                    "type": kind,
                    "session": {"chatLog": [{"content": "gg", "nickname": "b", "timestamp": "t"}]}
                }),
            );
            assert_eq!(store.render_transcript(), "gg", "{kind}");
        }
    }

    #[test]
    fn binary_frames_are_discarded() {
        let mut store = SessionStore::new();
        store.replace_game_state(json!({"turn": 3}));
        let before = store.clone();
        let events = dispatch_payload(Payload::Binary(&[1, 2, 3]), &mut store);
        assert!(matches!(events[..], [GameClientEvent::MalformedFrame { .. }]));
        assert_eq!(store, before);
    }

    #[test]
    fn invalid_json_surfaces_raw_payload() {
        let mut store = SessionStore::new();
        let events = dispatch_payload(Payload::Text("{not json"), &mut store);
        match &events[..] {
            [GameClientEvent::MalformedFrame { raw, .. }] => assert_eq!(raw, "{not json"),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
        assert_eq!(store, SessionStore::new());
    }

    #[test]
    fn frame_without_type_is_malformed() {
        let mut store = SessionStore::new();
        let events = text(&mut store, json!({"state": {"turn": 9}}));
        assert!(matches!(events[..], [GameClientEvent::MalformedFrame { .. }]));
        assert!(store.game_state().is_none());
    }

    #[test]
    fn log_only_types_do_not_touch_state() {
        let mut store = SessionStore::new();
        for kind in ["session_start", "client_ready", "client_unready"] {
            let events = text(
                &mut store,
                json!({"type": kind, "state": {"turn": 5}, "session": {"chatLog": []}}),
            );
            assert!(matches!(events[..], [GameClientEvent::Status { .. }]), "{kind}");
        }
        assert!(store.game_state().is_none());
    }

    #[test]
    fn error_frames_surface_the_payload() {
        let mut store = SessionStore::new();
        let events = text(
            &mut store,
            json!({"type": "error", "error": {"message": "not your turn"}}),
        );
        match &events[..] {
            [GameClientEvent::ServerError { message, payload }] => {
                assert_eq!(message, "not your turn");
                assert_eq!(payload, &json!({"message": "not your turn"}));
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let mut store = SessionStore::new();
        let events = text(&mut store, json!({"type": "fireworks", "state": {"turn": 2}}));
        match &events[..] {
            [GameClientEvent::UnrecognizedFrame { kind, raw }] => {
                assert_eq!(kind, "fireworks");
                assert!(raw.contains("fireworks"));
            }
            other => panic!("expected UnrecognizedFrame, got {other:?}"),
        }
        assert!(store.game_state().is_none());
    }

    #[test]
    fn malformed_chat_log_keeps_transcript_but_applies_state() {
        let mut store = SessionStore::new();
        text(
            &mut store,
            json!({"type": "sync", "session": {"chatLog": [{"content": "keep", "nickname": "a", "timestamp": "t"}]}}),
        );
        text(
            &mut store,
            json!({"type": "sync", "state": {"turn": 4}, "session": {"chatLog": {"bad": true}}}),
        );
        assert_eq!(store.render_transcript(), "keep");
        assert_eq!(store.game_state(), Some(&json!({"turn": 4})));
    }

    #[test]
    fn null_state_keeps_snapshot() {
        let mut store = SessionStore::new();
        text(&mut store, json!({"type": "tick", "state": {"turn": 1}}));
        let events = text(&mut store, json!({"type": "tick", "state": null, "session": null}));
        assert!(events.is_empty());
        assert_eq!(store.game_state(), Some(&json!({"turn": 1})));
    }

    #[test]
    fn ping_is_silent() {
        let mut store = SessionStore::new();
        assert!(text(&mut store, json!({"type": "ping"})).is_empty());
    }
}
