//! # Console Lobby Example
//!
//! A terminal front end for a Battleline server:
//!
//! 1. Resume the session named in a page URL, or create/join one
//! 2. Keep the connection alive across transient drops
//! 3. Print transcript, state and status updates as they arrive
//! 4. Send chat, readiness and moves typed on stdin
//!
//! ## Running
//!
//! ```sh
//! # Start a Battleline server on localhost:8080, then:
//! cargo run --example console_lobby
//!
//! # Resume a session and override the server URL:
//! BATTLELINE_URL=http://my-server:8080/ cargo run --example console_lobby -- 'http://my-server:8080/?game_id=f3a9c2'
//! ```
//!
//! Commands: `create`, `join <id>`, `chat <text>`, `ready`,
//! `play <suit 0-5> <value> <lane>`, `claim <lane>`, `draw troop|tactics`,
//! `state`, `quit`.

use battleline_client::{
    Card, ClientConfig, GameClient, GameClientEvent, HttpSessionApi, MoveData, Suit,
    WebSocketConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

/// Default server URL when `BATTLELINE_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:8080/";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let server = Url::parse(
        &std::env::var("BATTLELINE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
    )?;
    let page = match std::env::args().nth(1) {
        Some(arg) => Url::parse(&arg)?,
        None => server.clone(),
    };
    tracing::info!("using server {server}");

    let (mut client, mut events) = GameClient::start(
        WebSocketConnector::new(server.clone()),
        HttpSessionApi::new(server)?,
        ClientConfig::new(),
    );

    if let Err(e) = client.resume(page).await {
        tracing::warn!("could not resume session: {e}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                render(&client, event).await;
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&client, line.trim()).await {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

async fn render(client: &GameClient, event: GameClientEvent) {
    match event {
        GameClientEvent::SessionBound { session_id } => {
            println!("== session {session_id} (share this id to invite a player)");
        }
        GameClientEvent::LocationChanged { url } => println!("== location {url}"),
        GameClientEvent::Connected { .. } => println!("== connected"),
        GameClientEvent::Reconnecting {
            code,
            retries_remaining,
            delay,
            ..
        } => println!("== connection lost ({code}), retrying in {delay:?}, {retries_remaining} left"),
        GameClientEvent::Disconnected { code, reason, .. } => {
            println!("== disconnected ({code}) {reason}");
        }
        GameClientEvent::AwaitingSession => println!("== type `create` or `join <id>`"),
        GameClientEvent::JoinFailed { error, .. } => println!("== could not join: {error}"),
        GameClientEvent::Status { line, .. } => println!("-- {line}"),
        GameClientEvent::ServerError { message, .. } => println!("!! {message}"),
        GameClientEvent::ChatTranscriptReplaced { .. } => {
            println!("{}\n", client.rendered_transcript().await);
        }
        GameClientEvent::GameStateReplaced { state } => println!("== state {state}"),
        GameClientEvent::ReadinessChanged { ready } => println!("== ready: {ready}"),
        other => tracing::debug!("{other:?}"),
    }
}

/// Run one stdin command. Returns `false` to quit.
async fn run_command(client: &GameClient, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let result = match words.next() {
        Some("quit") => return false,
        Some("create") => client.create_session().await.map(|_| ()),
        Some("join") => client
            .join_session(words.next().unwrap_or_default())
            .await
            .map(|_| ()),
        Some("chat") => {
            let text = line.strip_prefix("chat").unwrap_or_default();
            client.send_chat(text.trim()).await
        }
        Some("ready") => client.toggle_ready().await.map(|_| ()),
        Some("claim") => match parse_u8(words.next()) {
            Some(lane) => client.send_move(MoveData::claim(lane)).await,
            None => usage(),
        },
        Some("draw") => match words.next() {
            Some("troop") => client.send_move(MoveData::draw(false)).await,
            Some("tactics") => client.send_move(MoveData::draw(true)).await,
            _ => usage(),
        },
        Some("play") => {
            let suit = parse_u8(words.next()).and_then(|s| Suit::try_from(s).ok());
            match (suit, parse_u8(words.next()), parse_u8(words.next())) {
                (Some(suit), Some(value), Some(lane)) => {
                    client
                        .send_move(MoveData::placement(Card { suit, value }, lane))
                        .await
                }
                _ => usage(),
            }
        }
        Some("state") => {
            match client.game_state().await {
                Some(state) => println!("{state:#}"),
                None => println!("no state yet"),
            }
            Ok(())
        }
        Some(_) => usage(),
        None => Ok(()),
    };

    if let Err(e) = result {
        println!("!! {e}");
    }
    true
}

fn parse_u8(word: Option<&str>) -> Option<u8> {
    word.and_then(|w| w.parse().ok())
}

fn usage() -> Result<(), battleline_client::ClientError> {
    println!("commands: create | join <id> | chat <text> | ready | play <suit> <value> <lane> | claim <lane> | draw troop|tactics | state | quit");
    Ok(())
}
