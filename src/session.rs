//! Session façade binding a UI mount cycle to one room connection.
//!
//! A [`ChatSession`] owns at most one [`ConnectionManager`] at a time. Every
//! activation with a new `(room, identity)` pair stops the previous manager
//! and starts a fresh one with an empty message stream, so nothing carries
//! over between rooms or users.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{ChatError, Result};
use crate::event::ChatEvent;
use crate::identity::Identity;
use crate::protocol::ChatMessage;
use crate::stream::MessageView;
use crate::transport::Connector;

/// The live half of a session.
struct ActiveRoom {
    identity: Identity,
    manager: ConnectionManager,
    events: mpsc::Receiver<ChatEvent>,
}

/// Lifecycle owner for room connections.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = ChatSession::new(WebSocketConnector::new(), ChatConfig::from_env()?);
/// session.activate("room-42", Some(&identity)).await?;
/// session.send("hi");
///
/// if let Some(event) = session.next_event().await {
///     if event.should_leave_room() {
///         session.deactivate().await;
///     }
/// }
/// ```
pub struct ChatSession<C: Connector> {
    connector: Arc<C>,
    config: ChatConfig,
    active: Option<ActiveRoom>,
}

impl<C: Connector> ChatSession<C> {
    pub fn new(connector: C, config: ChatConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Bind the session to `room` as `identity`.
    ///
    /// Re-activating with the pair that is already active does nothing while
    /// its connection is still live. A terminated connection, a different
    /// room or a different identity is stopped and replaced.
    ///
    /// # Errors
    ///
    /// [`ChatError::IdentityRequired`] when `identity` is `None`; any previous
    /// connection has been stopped by then. URL errors from
    /// [`ChatConfig::room_endpoint`] are passed through.
    pub async fn activate(&mut self, room: &str, identity: Option<&Identity>) -> Result<()> {
        if let Some(active) = &self.active {
            if active.manager.room() == room
                && Some(&active.identity) == identity
                && !active.manager.state().is_terminated()
            {
                debug!(room = %room, "session already active for this room and identity");
                return Ok(());
            }
        }

        self.deactivate().await;

        let Some(identity) = identity else {
            info!(room = %room, "no identity, not connecting");
            return Err(ChatError::IdentityRequired);
        };

        let (manager, events) =
            ConnectionManager::start(Arc::clone(&self.connector), &self.config, room, identity)?;
        self.active = Some(ActiveRoom {
            identity: identity.clone(),
            manager,
            events,
        });
        Ok(())
    }

    /// Stop the current connection and discard its messages. Safe to call
    /// when nothing is active.
    pub async fn deactivate(&mut self) {
        if let Some(mut active) = self.active.take() {
            info!(room = %active.manager.room(), "deactivating room session");
            active.manager.stop().await;
        }
    }

    /// Forward `text` if a room is active and its link is open.
    pub fn send(&self, text: impl Into<String>) {
        match &self.active {
            Some(active) => active.manager.send(text),
            None => debug!("no active room, dropping outbound message"),
        }
    }

    /// Messages received in the current session, in arrival order. Empty when
    /// nothing is active.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.active
            .as_ref()
            .map(|active| active.manager.snapshot())
            .unwrap_or_default()
    }

    /// Live read handle on the current session's messages.
    pub fn view(&self) -> Option<MessageView<ChatMessage>> {
        self.active.as_ref().map(|active| active.manager.messages())
    }

    pub fn state(&self) -> Option<ConnectionState> {
        self.active.as_ref().map(|active| active.manager.state())
    }

    /// Watch the active connection's state transitions.
    pub fn state_changes(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.active
            .as_ref()
            .map(|active| active.manager.state_changes())
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.manager.room())
    }

    pub fn active_identity(&self) -> Option<&Identity> {
        self.active.as_ref().map(|active| &active.identity)
    }

    /// Wait for the next terminal event of the active session.
    ///
    /// `None` when nothing is active or the session's task has finished
    /// without further events.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.active.as_mut()?.events.recv().await
    }
}

impl<C: Connector> std::fmt::Debug for ChatSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("room", &self.active_room())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
