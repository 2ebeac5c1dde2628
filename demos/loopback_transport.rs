//! # Loopback Transport Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with an
//! in-process loopback channel, and walks a room session through a dropped
//! link, a reconnect and finally an expired room.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example loopback_transport
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;
use yappr_client::{
    ChatConfig, ChatError, ChatEvent, ChatMessage, ChatSession, CloseCode, Connector, Identity,
    Transport, TransportEvent,
};

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of one loopback link.
pub struct LoopbackTransport {
    /// Frames the client sends (the fake server reads the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Events the fake server pushes to the client.
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Server half of one loopback link.
pub struct LoopbackLink {
    /// The URL the client connected to.
    pub url: Url,
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Push frames or a close to the client.
    pub tx: mpsc::UnboundedSender<TransportEvent>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChatError> {
        self.tx
            .send(frame)
            .map_err(|e| ChatError::TransportSend(e.to_string()))
    }

    /// `mpsc::UnboundedReceiver::recv` is cancel-safe, so this is too. A
    /// dropped server half looks like a link lost without a close frame.
    async fn recv(&mut self) -> Result<TransportEvent, ChatError> {
        Ok(self.rx.recv().await.unwrap_or(TransportEvent::Closed(None)))
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector handing every new link to the fake server
// ─────────────────────────────────────────────────────────────────────

pub struct LoopbackConnector {
    links: mpsc::UnboundedSender<LoopbackLink>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, url: &Url) -> Result<LoopbackTransport, ChatError> {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();

        self.links
            .send(LoopbackLink {
                url: url.clone(),
                rx: server_rx,
                tx: server_tx,
            })
            .map_err(|_| ChatError::TransportClosed)?;

        Ok(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: A fake room hub
// ─────────────────────────────────────────────────────────────────────

fn broadcast(room: &str, username: &str, content: &str, system: bool) -> TransportEvent {
    let message = ChatMessage {
        content: content.to_string(),
        room_id: room.to_string(),
        username: username.to_string(),
        user_id: None,
        system,
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    };
    TransportEvent::Text(serde_json::to_string(&message).unwrap_or_default())
}

/// First link: echo one message, then drop. Second link: announce that the
/// room expired and close with the room-invalid code.
async fn run_fake_server(mut links: mpsc::UnboundedReceiver<LoopbackLink>) {
    let room = "demo-room";

    if let Some(mut link) = links.recv().await {
        tracing::info!(url = %link.url, "fake server: first link");
        let _ = link.tx.send(broadcast(room, "system", "Ada joined", true));
        if let Some(text) = link.rx.recv().await {
            let _ = link.tx.send(broadcast(room, "Ada", &text, false));
        }
        // Dropping `link` loses the connection without a close frame.
    }

    if let Some(link) = links.recv().await {
        tracing::info!("fake server: second link");
        let _ = link.tx.send(broadcast(room, "system", "Ada rejoined", true));
        let _ = link.tx.send(broadcast(room, "system", "room expired", true));
        let _ = link.tx.send(TransportEvent::Closed(Some(CloseCode::PolicyViolation)));
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Wire together the session and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (links_tx, links_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(run_fake_server(links_rx));

    let config = ChatConfig::new("ws://loopback.invalid")?;
    let mut session = ChatSession::new(LoopbackConnector { links: links_tx }, config);
    let identity = Identity::guest("guest-1", "Ada");
    session.activate("demo-room", Some(&identity)).await?;

    // Print messages as they arrive.
    let Some(view) = session.view() else {
        return Err("session not active".into());
    };
    let printer = tokio::spawn(async move {
        let mut cursor = view.subscribe();
        while let Some(message) = cursor.next().await {
            let marker = if message.system { "*" } else { ">" };
            println!("{marker} {}: {}", message.username, message.content);
        }
    });

    // Wait for the link, then say something.
    if let Some(mut state) = session.state_changes() {
        state.wait_for(|s| s.is_open()).await?;
    }
    session.send("hello from the loopback");

    match session.next_event().await {
        Some(ChatEvent::RoomUnavailable { notice, code, .. }) => {
            println!("room closed ({code}): {notice}");
        }
        Some(ChatEvent::RetriesExhausted { attempts, .. }) => {
            println!("gave up after {attempts} reconnect attempts");
        }
        None => println!("session ended"),
    }

    session.deactivate().await;
    let _ = printer.await;
    let _ = server.await;
    Ok(())
}
