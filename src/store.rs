//! The client's snapshot of session state.
//!
//! The server owns the chat transcript and the game state; the client only
//! keeps the most recent copy of each and replaces it wholesale whenever a
//! frame carries a new one. Readiness is the one value the client owns: it
//! records what this client last announced.

use serde_json::Value;

use crate::protocol::ChatEntry;

/// Chat transcript, game state snapshot and local readiness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    transcript: Vec<ChatEntry>,
    game_state: Option<Value>,
    ready: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole transcript with `entries`.
    pub fn replace_chat_transcript(&mut self, entries: Vec<ChatEntry>) {
        self.transcript = entries;
    }

    /// Replace the game state snapshot.
    ///
    /// A `null` snapshot is not a state; the prior one is kept and `false`
    /// is returned.
    pub fn replace_game_state(&mut self, snapshot: Value) -> bool {
        if snapshot.is_null() {
            return false;
        }
        self.game_state = Some(snapshot);
        true
    }

    pub fn current_readiness(&self) -> bool {
        self.ready
    }

    pub fn set_readiness(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn chat_transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn game_state(&self) -> Option<&Value> {
        self.game_state.as_ref()
    }

    /// Forget the server-owned values ahead of a new connection. Readiness
    /// lives for the whole client and is kept.
    pub fn reset_view(&mut self) {
        self.transcript.clear();
        self.game_state = None;
    }

    /// The transcript as displayed: message contents separated by blank lines.
    pub fn render_transcript(&self) -> String {
        self.transcript
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
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

    fn entry(content: &str) -> ChatEntry {
        ChatEntry {
            nickname: "ann".into(),
            content: content.into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
            client_id: None,
        }
    }

    #[test]
    fn transcript_replacement_is_idempotent() {
        let mut store = SessionStore::new();
        let log = vec![entry("hello"), entry("there")];
        store.replace_chat_transcript(log.clone());
        store.replace_chat_transcript(log.clone());
        assert_eq!(store.chat_transcript(), log.as_slice());
        assert_eq!(store.render_transcript(), "hello\n\nthere");
    }

    #[test]
    fn shorter_transcript_replaces_longer() {
        let mut store = SessionStore::new();
        store.replace_chat_transcript(vec![entry("a"), entry("b")]);
        store.replace_chat_transcript(vec![entry("c")]);
        assert_eq!(store.render_transcript(), "c");
    }

    #[test]
    fn null_snapshot_keeps_prior_state() {
        let mut store = SessionStore::new();
        assert!(store.replace_game_state(json!({"turn": 1})));
        assert!(!store.replace_game_state(Value::Null));
        assert_eq!(store.game_state(), Some(&json!({"turn": 1})));
    }

    #[test]
    fn snapshot_is_last_write_wins() {
        let mut store = SessionStore::new();
        store.replace_game_state(json!({"turn": 1, "hand": [1, 2]}));
        store.replace_game_state(json!({"turn": 2}));
        assert_eq!(store.game_state(), Some(&json!({"turn": 2})));
    }

    #[test]
    fn reset_view_keeps_readiness() {
        let mut store = SessionStore::new();
        store.set_readiness(true);
        store.replace_chat_transcript(vec![entry("x")]);
        store.replace_game_state(json!({}));
        store.reset_view();
        assert!(store.chat_transcript().is_empty());
        assert!(store.game_state().is_none());
        assert!(store.current_readiness());
    }
}
