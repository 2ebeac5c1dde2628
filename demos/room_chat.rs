//! # Room Chat Example
//!
//! Demonstrates a complete room session against a running chat server:
//!
//! 1. Load (or create) the signed-in identity from a JSON file
//! 2. Join a room over WebSocket
//! 3. Print every message and the room's remaining lifetime
//! 4. Send each line typed on stdin
//! 5. Leave on Ctrl+C, on an expired room, or when reconnects run out
//!
//! ## Running
//!
//! ```sh
//! # Start the chat server on localhost:8080, then:
//! cargo run --example room_chat -- <room-id> [display-name]
//!
//! # Override the server URL:
//! YAPPR_WS_URL=ws://my-server:8080 cargo run --example room_chat -- <room-id>
//! ```

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use yappr_client::{
    ChatConfig, ChatEvent, ChatSession, ConnectionState, Identity, IdentityStore,
    WebSocketConnector,
};

/// Identity file used when `YAPPR_IDENTITY` is not set.
const DEFAULT_IDENTITY_FILE: &str = "yappr-identity.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Arguments ───────────────────────────────────────────────────
    let mut args = std::env::args().skip(1);
    let Some(room) = args.next() else {
        eprintln!("usage: room_chat <room-id> [display-name]");
        std::process::exit(2);
    };
    let display_name = args.next();

    // ── Identity ────────────────────────────────────────────────────
    let store = IdentityStore::new(
        std::env::var("YAPPR_IDENTITY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_IDENTITY_FILE)),
    );
    let identity = match (store.load()?, display_name) {
        (Some(identity), None) => identity,
        (Some(identity), Some(name)) if identity.username == name => identity,
        (_, name) => {
            let name = name.unwrap_or_else(|| "guest".to_string());
            let id = format!("guest-{}", chrono::Utc::now().timestamp_millis());
            let identity = Identity::guest(id, name);
            store.save(&identity)?;
            identity
        }
    };
    tracing::info!(user = %identity.username, path = %store.path().display(), "using identity");

    // ── Session ─────────────────────────────────────────────────────
    let config = ChatConfig::from_env()?;
    tracing::info!(url = %config.ws_base_url, room = %room, "joining room");
    let clock_tick = config.clock_tick;

    let mut session = ChatSession::new(WebSocketConnector::new(), config);
    session.activate(&room, Some(&identity)).await?;

    let (Some(view), Some(mut state)) = (session.view(), session.state_changes()) else {
        return Err("session did not start".into());
    };

    // Print messages in arrival order.
    let me = identity.clone();
    tokio::spawn(async move {
        let mut cursor = view.subscribe();
        while let Some(message) = cursor.next().await {
            if message.system {
                println!("  * {}", message.content);
            } else if message.is_from(&me.id, &me.username) {
                println!("you> {}", message.content);
            } else {
                println!("{}> {}", message.username, message.content);
            }
        }
    });

    // Room lifetime, when the directory is available.
    #[cfg(feature = "http-directory")]
    let room_clock = {
        use yappr_client::{HttpRoomDirectory, RoomDirectory};
        let directory = HttpRoomDirectory::new(session.config())?;
        match directory.find_room(&room).await {
            Ok(found) => found.map(|r| r.clock().with_tick(clock_tick)),
            Err(e) => {
                tracing::warn!("could not load room list: {e}");
                None
            }
        }
    };
    #[cfg(not(feature = "http-directory"))]
    let room_clock: Option<yappr_client::RoomClock> = None;

    let mut ticker = room_clock
        .as_ref()
        .map(|clock| clock.ticker())
        .unwrap_or_else(|| tokio::time::interval(clock_tick));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) if !text.trim().is_empty() => {
                        if !session.state().is_some_and(|s| s.is_open()) {
                            println!("  (not connected, message not sent)");
                        }
                        session.send(text);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                match current {
                    ConnectionState::Open => println!("  * connected"),
                    ConnectionState::Reconnecting { attempt } => {
                        println!("  * connection lost, reconnecting (attempt {attempt})");
                    }
                    _ => {}
                }
            }
            event = session.next_event() => {
                match event {
                    Some(ChatEvent::RoomUnavailable { notice, .. }) => println!("{notice}"),
                    Some(ChatEvent::RetriesExhausted { attempts, .. }) => {
                        println!("Could not reach the server after {attempts} attempts.");
                    }
                    None => {}
                }
                break;
            }
            _ = ticker.tick() => {
                if let Some(clock) = &room_clock {
                    println!("  * time left: {}", clock.remaining());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("leaving room");
                break;
            }
        }
    }

    session.deactivate().await;
    Ok(())
}
