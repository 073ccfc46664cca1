//! Integration-style client tests for the Battleline client.
//!
//! Uses the shared `MockConnector` and `MockSessionApi` from `tests/common`
//! to play the server side of each connection and verify that `GameClient`
//! binds sessions, reconnects, applies state and gates outbound commands
//! correctly.

mod common;

use std::time::Duration;

use battleline_client::protocol::SessionMessageType;
use battleline_client::{
    Card, ClientConfig, ClientError, CloseCode, GameClient, GameClientEvent, MoveData, SessionId,
    Suit,
};
use serde_json::json;
use tokio::time::Instant;
use url::Url;

use common::{
    chat_entry_json, client_chat_json, drain, error_json, notice_json, sync_json, wait_for,
    ConnectorControl, MockConnector, MockLink, MockSessionApi,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn start_client(
    api: MockSessionApi,
) -> (
    GameClient,
    tokio::sync::mpsc::Receiver<GameClientEvent>,
    ConnectorControl,
) {
    let (connector, server) = MockConnector::new();
    let (client, events) = GameClient::start(connector, api, ClientConfig::new());
    (client, events, server)
}

fn page(query: &str) -> Url {
    Url::parse(&format!("http://localhost:8080/{query}")).expect("page url")
}

async fn wait_connected(events: &mut tokio::sync::mpsc::Receiver<GameClientEvent>) {
    wait_for(events, |e| matches!(e, GameClientEvent::Connected { .. })).await;
}

/// Resume `id` from the page URL and wait until the connection is open.
async fn resume_connected(
    client: &GameClient,
    events: &mut tokio::sync::mpsc::Receiver<GameClientEvent>,
    server: &mut ConnectorControl,
    id: &str,
) -> MockLink {
    let resumed = client
        .resume(page(&format!("?game_id={id}")))
        .await
        .expect("resume");
    assert_eq!(resumed, Some(SessionId::new(id)));
    let link = server.next_link().await;
    assert_eq!(link.session_id.as_str(), id);
    wait_connected(events).await;
    link
}

// ════════════════════════════════════════════════════════════════════
// Session identity
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_then_sync_populates_state() {
    let (mut client, mut events, mut server) =
        start_client(MockSessionApi::new().creating("abc123"));

    let id = client.create_session().await.expect("create");
    assert_eq!(id.as_str(), "abc123");

    let ev = events.recv().await.expect("event");
    assert!(
        matches!(&ev, GameClientEvent::SessionBound { session_id } if session_id == &id),
        "expected SessionBound, got {ev:?}"
    );
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(ev, GameClientEvent::Connecting { attempt: 0, .. }),
        "expected Connecting, got {ev:?}"
    );

    let link = server.next_link().await;
    assert_eq!(link.session_id, id);
    wait_connected(&mut events).await;
    assert!(client.is_connected());
    assert_eq!(client.session_id().await, Some(id));

    link.push_json(sync_json(json!({ "turn": 1 }), vec![]));
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::GameStateReplaced { .. })
    })
    .await;

    assert_eq!(client.game_state().await, Some(json!({ "turn": 1 })));
    assert!(client.chat_transcript().await.is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn resume_without_session_awaits_user() {
    let api = MockSessionApi::new();
    let api_view = api.clone();
    let (mut client, mut events, server) = start_client(api);

    let resumed = client.resume(page("")).await.expect("resume");
    assert!(resumed.is_none());
    let queued = drain(&mut events);
    assert!(
        matches!(queued.as_slice(), [GameClientEvent::AwaitingSession]),
        "unexpected events {queued:?}"
    );
    assert!(api_view.calls().is_empty());
    assert!(server.connects().is_empty());
    assert_eq!(client.location().await, Some(page("")));

    client.shutdown().await;
}

#[tokio::test]
async fn resume_joins_and_keeps_the_url() {
    let api = MockSessionApi::new().joinable("xyz");
    let api_view = api.clone();
    let (mut client, mut events, mut server) = start_client(api);

    let _link = resume_connected(&client, &mut events, &mut server, "xyz").await;

    assert_eq!(api_view.calls(), vec!["join:xyz".to_string()]);
    assert_eq!(
        client.location().await.expect("location").as_str(),
        "http://localhost:8080/?game_id=xyz"
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_resume_clears_url_and_never_connects() {
    let api = MockSessionApi::new();
    let api_view = api.clone();
    let (mut client, mut events, mut server) = start_client(api);

    let err = client
        .resume(Url::parse("http://localhost:8080/lobby?game_id=gone").expect("url"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ClientError::Request { status: 400, .. }),
        "unexpected error {err:?}"
    );

    let queued = drain(&mut events);
    match queued.as_slice() {
        [GameClientEvent::LocationChanged { url }, GameClientEvent::JoinFailed { session_id, .. }, GameClientEvent::AwaitingSession] =>
        {
            assert_eq!(url.as_str(), "http://localhost:8080/lobby");
            assert_eq!(session_id.as_ref().map(SessionId::as_str), Some("gone"));
        }
        other => panic!("unexpected events {other:?}"),
    }

    assert_eq!(api_view.calls(), vec!["join:gone".to_string()]);
    assert!(server.no_link_within(Duration::from_secs(5)).await);
    assert!(server.connects().is_empty());
    assert!(client.session_id().await.is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn join_rejects_blank_input_locally() {
    let api = MockSessionApi::new();
    let api_view = api.clone();
    let (mut client, _events, _server) = start_client(api);

    let err = client.join_session("   ").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidSessionId(_)));
    assert!(api_view.calls().is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn failed_join_keeps_existing_connection() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    let err = client.join_session("nope").await.unwrap_err();
    assert!(matches!(err, ClientError::Request { status: 400, .. }));
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::JoinFailed { .. })
    })
    .await;

    assert!(client.is_connected());
    assert!(!link.is_closed());
    client.send_chat("still here").await.expect("chat");

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn latest_request_wins_over_slow_resume() {
    let api = MockSessionApi::new()
        .joinable("slow")
        .joinable("fast")
        .delayed("slow", Duration::from_secs(2));
    let api_view = api.clone();
    let (mut client, _events, mut server) = start_client(api);

    let (resumed, joined) = tokio::join!(client.resume(page("?game_id=slow")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.join_session("fast").await
    });

    assert!(
        matches!(resumed, Err(ClientError::Superseded)),
        "unexpected resume result {resumed:?}"
    );
    assert_eq!(joined.expect("join").as_str(), "fast");

    let link = server.next_link().await;
    assert_eq!(link.session_id.as_str(), "fast");
    assert!(server.no_link_within(Duration::from_secs(5)).await);
    assert_eq!(server.connects(), vec![SessionId::new("fast")]);
    assert_eq!(
        client.location().await.expect("location").query(),
        Some("game_id=fast")
    );
    assert_eq!(
        api_view.calls(),
        vec!["join:slow".to_string(), "join:fast".to_string()]
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn terminal_close_codes_never_reconnect() {
    for code in [1000u16, 1001, 1008] {
        let (mut client, mut events, mut server) =
            start_client(MockSessionApi::new().joinable("abc"));
        let link = resume_connected(&client, &mut events, &mut server, "abc").await;

        link.close(code, "bye");
        let ev = wait_for(&mut events, |e| {
            matches!(e, GameClientEvent::Disconnected { .. })
        })
        .await;
        if let GameClientEvent::Disconnected {
            code: got,
            reason,
            budget_exhausted,
            ..
        } = ev
        {
            assert_eq!(got, CloseCode::from(code));
            assert_eq!(reason, "bye");
            assert!(!budget_exhausted);
        } else {
            panic!("expected Disconnected, got {ev:?}");
        }
        wait_for(&mut events, |e| matches!(e, GameClientEvent::AwaitingSession)).await;

        assert!(!client.is_connected());
        assert!(client.session_id().await.is_none());
        assert_eq!(
            client.location().await.expect("location").as_str(),
            "http://localhost:8080/"
        );
        assert!(server.no_link_within(Duration::from_secs(5)).await);
        assert_eq!(server.connects().len(), 1, "code {code} reconnected");

        client.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn retryable_close_reconnects_until_budget_is_spent() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let mut link = resume_connected(&client, &mut events, &mut server, "abc").await;

    for expected_remaining in (0..5u32).rev() {
        let closed_at = Instant::now();
        link.close(1006, "");

        let ev = wait_for(&mut events, |e| {
            matches!(e, GameClientEvent::Reconnecting { .. })
        })
        .await;
        if let GameClientEvent::Reconnecting {
            code,
            retries_remaining,
            delay,
            ..
        } = ev
        {
            assert_eq!(code, CloseCode::Abnormal);
            assert_eq!(retries_remaining, expected_remaining);
            assert_eq!(delay, Duration::from_secs(1));
        } else {
            panic!("expected Reconnecting, got {ev:?}");
        }

        link = server.next_link().await;
        assert!(closed_at.elapsed() >= Duration::from_secs(1));
        assert_eq!(link.session_id.as_str(), "abc");
        wait_connected(&mut events).await;
    }

    link.close(1006, "");
    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Disconnected { .. })
    })
    .await;
    assert!(
        matches!(
            ev,
            GameClientEvent::Disconnected {
                budget_exhausted: true,
                code: CloseCode::Abnormal,
                ..
            }
        ),
        "unexpected {ev:?}"
    );
    assert!(server.no_link_within(Duration::from_secs(5)).await);
    assert_eq!(server.connects().len(), 6);
    assert!(client.location().await.expect("location").query().is_none());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stream_end_without_close_frame_is_retried() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.drop_connection();
    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Reconnecting { .. })
    })
    .await;
    assert!(matches!(
        ev,
        GameClientEvent::Reconnecting {
            code: CloseCode::Abnormal,
            retries_remaining: 4,
            ..
        }
    ));

    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Connecting { .. })
    })
    .await;
    assert!(matches!(ev, GameClientEvent::Connecting { attempt: 1, .. }));
    let _next = server.next_link().await;
    wait_connected(&mut events).await;

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn receive_error_is_retried() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.fail("connection reset");
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Reconnecting { .. })
    })
    .await;
    let next = server.next_link().await;
    assert_eq!(next.session_id.as_str(), "abc");

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_connect_is_retried() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    server
        .refuse
        .store(true, std::sync::atomic::Ordering::Release);

    client.resume(page("?game_id=abc")).await.expect("resume");
    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Reconnecting { .. })
    })
    .await;
    assert!(matches!(
        ev,
        GameClientEvent::Reconnecting {
            code: CloseCode::Abnormal,
            retries_remaining: 4,
            ..
        }
    ));

    server
        .refuse
        .store(false, std::sync::atomic::Ordering::Release);
    let link = server.next_link().await;
    assert_eq!(link.session_id.as_str(), "abc");
    wait_connected(&mut events).await;
    assert_eq!(server.connects().len(), 2);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn superseded_connection_is_ignored() {
    let (mut client, mut events, mut server) =
        start_client(MockSessionApi::new().joinable("abc").joinable("def"));
    let old = resume_connected(&client, &mut events, &mut server, "abc").await;

    let joined = client.join_session("def").await.expect("join");
    assert_eq!(joined.as_str(), "def");
    let current = server.next_link().await;
    assert_eq!(current.session_id.as_str(), "def");

    // The abandoned connection is closed by the client; anything it still
    // reports must not reach the store or the reconnect logic.
    old.wait_closed().await;
    old.push_json(sync_json(json!({ "turn": 99 }), vec![]));
    old.close(1006, "late");

    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Connected { .. })
    })
    .await;
    assert!(
        matches!(&ev, GameClientEvent::Connected { session_id } if session_id.as_str() == "def")
    );

    assert!(server.no_link_within(Duration::from_secs(5)).await);
    let rest = drain(&mut events);
    assert!(
        !rest.iter().any(|e| matches!(
            e,
            GameClientEvent::Reconnecting { .. } | GameClientEvent::GameStateReplaced { .. }
        )),
        "stale connection leaked events: {rest:?}"
    );
    assert!(client.game_state().await.is_none());
    assert_eq!(client.session_id().await, Some(SessionId::new("def")));
    assert_eq!(
        client.location().await.expect("location").query(),
        Some("game_id=def")
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_open_of_superseded_connection_is_ignored() {
    let (connector, mut server) = MockConnector::new();
    let connector = connector
        .with_connect_delay_for("abc", Duration::from_secs(1))
        .with_connect_delay_for("def", Duration::from_secs(5));
    let (mut client, mut events) = GameClient::start(
        connector,
        MockSessionApi::new().joinable("abc").joinable("def"),
        ClientConfig::new(),
    );

    client.resume(page("?game_id=abc")).await.expect("resume");
    client.join_session("def").await.expect("join");

    // The abandoned connect to `abc` completes while `def` is still pending.
    let stale = server.next_link().await;
    assert_eq!(stale.session_id.as_str(), "abc");
    stale.push_json(sync_json(json!({ "turn": 99 }), vec![]));
    stale.close(1006, "late");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!client.is_connected());
    assert!(client.game_state().await.is_none());
    let early = drain(&mut events);
    assert!(
        !early.iter().any(|e| matches!(
            e,
            GameClientEvent::Connected { .. }
                | GameClientEvent::Reconnecting { .. }
                | GameClientEvent::GameStateReplaced { .. }
        )),
        "stale connection leaked events: {early:?}"
    );

    let current = server.next_link().await;
    assert_eq!(current.session_id.as_str(), "def");
    let ev = wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Connected { .. })
    })
    .await;
    assert!(
        matches!(&ev, GameClientEvent::Connected { session_id } if session_id.as_str() == "def")
    );
    assert!(client.is_connected());
    assert!(client.game_state().await.is_none());
    assert!(server.no_link_within(Duration::from_secs(5)).await);
    assert_eq!(
        server.connects(),
        vec![SessionId::new("abc"), SessionId::new("def")]
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn terminal_close_with_backed_up_events_keeps_driver_responsive() {
    let (connector, mut server) = MockConnector::new();
    let (mut client, mut events) = GameClient::start(
        connector,
        MockSessionApi::new().joinable("abc").creating("new"),
        ClientConfig::new().with_event_channel_capacity(1),
    );

    // Nobody reads events: `SessionBound` fills the channel.
    client.resume(page("?game_id=abc")).await.expect("resume");
    let link = server.next_link().await;
    link.close(1000, "bye");

    let created = tokio::time::timeout(Duration::from_secs(5), client.create_session())
        .await
        .expect("driver stalled after terminal close")
        .expect("create");
    assert_eq!(created.as_str(), "new");
    let next = server.next_link().await;
    assert_eq!(next.session_id.as_str(), "new");
    tokio::time::timeout(Duration::from_secs(5), client.send_chat("hi"))
        .await
        .expect("driver stalled after terminal close")
        .ok();

    // `Disconnected` is held back, not lost, and arrives in order.
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(&ev, GameClientEvent::SessionBound { session_id } if session_id.as_str() == "abc"),
        "got {ev:?}"
    );
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(
            ev,
            GameClientEvent::Disconnected {
                code: CloseCode::Normal,
                budget_exhausted: false,
                ..
            }
        ),
        "got {ev:?}"
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pending_reconnect_is_dropped_after_new_join() {
    let (mut client, mut events, mut server) =
        start_client(MockSessionApi::new().joinable("abc").joinable("def"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.close(1011, "server restarting");
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::Reconnecting { .. })
    })
    .await;

    client.join_session("def").await.expect("join");
    let current = server.next_link().await;
    assert_eq!(current.session_id.as_str(), "def");

    // Well past the reconnect delay of the abandoned session.
    assert!(server.no_link_within(Duration::from_secs(5)).await);
    assert_eq!(
        server.connects(),
        vec![SessionId::new("abc"), SessionId::new("def")]
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_starts_from_an_empty_view() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.push_json(sync_json(
        json!({ "turn": 3 }),
        vec![chat_entry_json("alice", "gl hf")],
    ));
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::GameStateReplaced { .. })
    })
    .await;
    client.toggle_ready().await.expect("toggle");

    link.close(1006, "");
    let next = server.next_link().await;
    wait_connected(&mut events).await;

    assert!(client.game_state().await.is_none());
    assert!(client.chat_transcript().await.is_empty());
    assert!(client.is_ready().await);

    next.push_json(sync_json(json!({ "turn": 4 }), vec![]));
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::GameStateReplaced { .. })
    })
    .await;
    assert_eq!(client.game_state().await, Some(json!({ "turn": 4 })));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Inbound frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn transcript_replacement_is_idempotent() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    let log = vec![
        chat_entry_json("alice", "hi"),
        chat_entry_json("bob", "hello"),
    ];
    for _ in 0..2 {
        link.push_json(client_chat_json(log.clone()));
        let ev = wait_for(&mut events, |e| {
            matches!(e, GameClientEvent::ChatTranscriptReplaced { .. })
        })
        .await;
        if let GameClientEvent::ChatTranscriptReplaced { entries } = ev {
            assert_eq!(entries.len(), 2);
        }
        let transcript = client.chat_transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].nickname, "alice");
        assert_eq!(transcript[1].content, "hello");
    }
    assert_eq!(client.rendered_transcript().await, "hi\n\nhello");

    // A client_chat frame leaves the game state alone.
    assert!(client.game_state().await.is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn bad_frames_are_reported_and_skipped() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.push_binary(&[0xde, 0xad]);
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GameClientEvent::MalformedFrame { .. }), "got {ev:?}");

    link.push_text("not json");
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(&ev, GameClientEvent::MalformedFrame { raw, .. } if raw == "not json"),
        "got {ev:?}"
    );

    link.push_json(json!({ "type": "mystery", "payload": 1 }));
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(&ev, GameClientEvent::UnrecognizedFrame { kind, .. } if kind == "mystery"),
        "got {ev:?}"
    );

    // Pings are handled silently; the next event is the error frame.
    link.push_json(json!({ "type": "ping" }));
    link.push_json(error_json("not your turn"));
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(&ev, GameClientEvent::ServerError { message, .. } if message == "not your turn"),
        "got {ev:?}"
    );

    assert!(client.is_connected());
    assert!(client.game_state().await.is_none());
    assert!(client.chat_transcript().await.is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn notices_become_status_lines() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    link.push_json(notice_json("session_start", 0));
    let ev = events.recv().await.expect("event");
    assert!(
        matches!(
            &ev,
            GameClientEvent::Status {
                kind: SessionMessageType::SessionStart,
                ..
            }
        ),
        "got {ev:?}"
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Outbound commands
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn whitespace_chat_sends_nothing() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let mut link = resume_connected(&client, &mut events, &mut server, "abc").await;

    for blank in ["", "   ", "\n\t "] {
        let err = client.send_chat(blank).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyChat));
    }
    assert!(link.nothing_sent());

    client.send_chat("good game").await.expect("chat");
    assert_eq!(
        link.next_sent().await,
        json!({ "type": "chat", "data": { "chat": "good game" } })
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_are_refused_until_open() {
    let (connector, mut server) = MockConnector::new();
    let connector = connector.with_connect_delay(Duration::from_secs(10));
    let (mut client, mut events) = GameClient::start(
        connector,
        MockSessionApi::new().creating("abc"),
        ClientConfig::new(),
    );

    client.create_session().await.expect("create");

    assert!(matches!(
        client.set_ready(true).await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.send_chat("hello?").await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.send_move(MoveData::claim(2)).await,
        Err(ClientError::NotConnected)
    ));
    assert!(!client.is_ready().await);

    let mut link = server.next_link().await;
    wait_connected(&mut events).await;
    client.set_ready(true).await.expect("ready");
    assert_eq!(
        link.next_sent().await,
        json!({ "type": "set_ready", "data": { "ready": true } })
    );

    client.shutdown().await;
}

#[tokio::test]
async fn readiness_is_optimistic() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let mut link = resume_connected(&client, &mut events, &mut server, "abc").await;
    assert!(!client.is_ready().await);

    assert!(client.toggle_ready().await.expect("toggle"));
    assert!(client.is_ready().await);
    assert_eq!(
        link.next_sent().await,
        json!({ "type": "set_ready", "data": { "ready": true } })
    );
    wait_for(&mut events, |e| {
        matches!(e, GameClientEvent::ReadinessChanged { ready: true })
    })
    .await;

    // The server's own view of readiness does not touch the local flag.
    link.push_json(notice_json("client_unready", 0));
    wait_for(&mut events, |e| matches!(e, GameClientEvent::Status { .. })).await;
    assert!(client.is_ready().await);

    assert!(!client.toggle_ready().await.expect("toggle"));
    assert_eq!(
        link.next_sent().await,
        json!({ "type": "set_ready", "data": { "ready": false } })
    );

    client.shutdown().await;
}

#[tokio::test]
async fn moves_are_sent_verbatim() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let mut link = resume_connected(&client, &mut events, &mut server, "abc").await;

    let card = Card {
        suit: Suit::Blue,
        value: 7,
    };
    client
        .send_move(MoveData::placement(card, 4))
        .await
        .expect("move");
    assert_eq!(
        link.next_sent().await,
        json!({
            "type": "move",
            "data": { "move": { "action": "placement", "card": { "suit": 2, "value": 7 }, "lane": 4 } }
        })
    );

    client.send_move(MoveData::draw(true)).await.expect("move");
    assert_eq!(
        link.next_sent().await,
        json!({ "type": "move", "data": { "move": { "action": "draw", "tacticsDeck": true } } })
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Shutdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn shutdown_closes_connection_and_refuses_commands() {
    let (mut client, mut events, mut server) = start_client(MockSessionApi::new().joinable("abc"));
    let link = resume_connected(&client, &mut events, &mut server, "abc").await;

    client.shutdown().await;
    assert!(!client.is_connected());
    link.wait_closed().await;

    assert!(matches!(
        client.send_chat("anyone?").await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.create_session().await,
        Err(ClientError::NotConnected)
    ));
}
