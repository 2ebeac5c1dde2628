#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Yappr client integration tests.
//!
//! Provides a scripted [`MockConnector`] whose [`MockTransport`]s replay
//! canned frames and closes, plus helpers for building server frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;
use yappr_client::{
    ChatConfig, ChatError, ChatMessage, CloseCode, ConnectionState, Connector, Transport,
    TransportEvent,
};

// ── Scripts ─────────────────────────────────────────────────────────

/// One step replayed by a [`MockTransport`]'s `recv`.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver a text frame.
    Frame(String),
    /// Report the close with this code (`None` = dropped without a close frame).
    Close(Option<CloseCode>),
    /// Fail the read with a transport error.
    Fail,
    /// Pause before the next step.
    Wait(Duration),
}

/// Outcome of one `connect` call.
pub enum Link {
    /// The handshake fails.
    Refuse,
    /// The handshake never completes.
    Hang,
    /// The handshake succeeds; `recv` replays the steps, then pends forever.
    Accept(Vec<Step>),
    /// The handshake succeeds; `recv` replays the steps, then reads the feed.
    Live(Vec<Step>, mpsc::UnboundedReceiver<TransportEvent>),
}

/// Shortcut for an accepted link that stays open and silent.
pub fn open_link() -> Link {
    Link::Accept(Vec::new())
}

/// An accepted link fed by the returned sender.
pub fn live_link() -> (Link, mpsc::UnboundedSender<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Link::Live(Vec::new(), rx), tx)
}

// ── Probe ───────────────────────────────────────────────────────────

/// Shared record of everything the connector and its transports saw.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub connects: Arc<StdMutex<Vec<Instant>>>,
    pub urls: Arc<StdMutex<Vec<Url>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
}

impl Probe {
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    /// Time between consecutive connect calls.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        let connects = self.connects.lock().unwrap();
        connects.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector that hands out scripted links in order. Once the script is
/// used up every further handshake is refused.
pub struct MockConnector {
    links: StdMutex<VecDeque<Link>>,
    probe: Probe,
}

impl MockConnector {
    pub fn new(links: Vec<Link>) -> (Self, Probe) {
        let probe = Probe::default();
        let connector = Self {
            links: StdMutex::new(VecDeque::from(links)),
            probe: probe.clone(),
        };
        (connector, probe)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &Url) -> Result<MockTransport, ChatError> {
        self.probe.connects.lock().unwrap().push(Instant::now());
        self.probe.urls.lock().unwrap().push(url.clone());

        let link = self.links.lock().unwrap().pop_front();
        match link {
            None | Some(Link::Refuse) => Err(ChatError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            ))),
            Some(Link::Hang) => std::future::pending().await,
            Some(Link::Accept(steps)) => Ok(MockTransport::new(steps, None, self.probe.clone())),
            Some(Link::Live(steps, feed)) => {
                Ok(MockTransport::new(steps, Some(feed), self.probe.clone()))
            }
        }
    }
}

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted transport. `recv` is cancel-safe: a step is only consumed once
/// it has been fully delivered.
pub struct MockTransport {
    steps: VecDeque<Step>,
    feed: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    wait_until: Option<Instant>,
    probe: Probe,
}

impl MockTransport {
    fn new(
        steps: Vec<Step>,
        feed: Option<mpsc::UnboundedReceiver<TransportEvent>>,
        probe: Probe,
    ) -> Self {
        Self {
            steps: VecDeque::from(steps),
            feed,
            wait_until: None,
            probe,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChatError> {
        self.probe.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<TransportEvent, ChatError> {
        loop {
            match self.steps.front().cloned() {
                Some(Step::Wait(pause)) => {
                    let deadline = *self.wait_until.get_or_insert_with(|| Instant::now() + pause);
                    tokio::time::sleep_until(deadline).await;
                    self.wait_until = None;
                    self.steps.pop_front();
                }
                Some(Step::Frame(text)) => {
                    self.steps.pop_front();
                    return Ok(TransportEvent::Text(text));
                }
                Some(Step::Close(code)) => {
                    self.steps.pop_front();
                    return Ok(TransportEvent::Closed(code));
                }
                Some(Step::Fail) => {
                    self.steps.pop_front();
                    return Err(ChatError::TransportReceive("scripted failure".into()));
                }
                None => break,
            }
        }

        match self.feed.as_mut() {
            Some(feed) => match feed.recv().await {
                Some(event) => Ok(event),
                // Feed dropped: keep the link open until the manager stops.
                None => std::future::pending().await,
            },
            // No more scripted steps: hang so the link stays open.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// A chat message as the server would broadcast it.
pub fn message(room: &str, username: &str, content: &str) -> ChatMessage {
    ChatMessage {
        content: content.into(),
        room_id: room.into(),
        username: username.into(),
        user_id: Some(format!("id-{username}")),
        system: false,
        timestamp: Some("2026-03-01T10:00:00Z".into()),
    }
}

/// JSON text frame for `message`.
pub fn frame(message: &ChatMessage) -> String {
    serde_json::to_string(message).expect("frame serialization")
}

/// Shorthand for a user frame step.
pub fn chat_step(room: &str, username: &str, content: &str) -> Step {
    Step::Frame(frame(&message(room, username, content)))
}

// ── Config / waiting helpers ────────────────────────────────────────

pub fn test_config() -> ChatConfig {
    ChatConfig::new("ws://chat.test").expect("test config")
}

/// Wait until `state` satisfies `pred`, failing the test after a minute of
/// (possibly virtual) time.
pub async fn wait_for_state(
    state: &mut tokio::sync::watch::Receiver<ConnectionState>,
    pred: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let reached = tokio::time::timeout(Duration::from_secs(60), state.wait_for(pred))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
    *reached
}

/// Install a `tracing` subscriber honouring `RUST_LOG` for debugging a test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
