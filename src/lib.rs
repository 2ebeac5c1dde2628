//! # Yappr Client
//!
//! Realtime session core for the Yappr ephemeral chat rooms.
//!
//! This crate keeps one streaming link per joined room, reconnects it after
//! transient failures, tells an expired room apart from a dropped link, and
//! collects the room's messages into an append-only stream that any number
//! of readers can follow.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement [`Transport`] and [`Connector`] for any backend
//! - **Bounded reconnects** — linear backoff (500 ms × attempt, 5 attempts), reset on every open
//! - **Room-aware closes** — close codes 1008 / 1003 end the session with [`ChatEvent::RoomUnavailable`]
//! - **WebSocket built-in** — default `transport-websocket` feature provides `WebSocketConnector`
//! - **Room directory** — optional `http-directory` feature provides `HttpRoomDirectory`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yappr_client::{ChatConfig, ChatSession, Identity, WebSocketConnector};
//!
//! let config = ChatConfig::from_env()?;
//! let identity = Identity::guest("u-17", "night owl");
//!
//! let mut session = ChatSession::new(WebSocketConnector::new(), config);
//! session.activate("room-42", Some(&identity)).await?;
//!
//! let mut cursor = session.view().expect("active").subscribe();
//! while let Some(message) = cursor.next().await {
//!     println!("{}: {}", message.username, message.content);
//! }
//! ```

pub mod clock;
pub mod close_codes;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod event;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use clock::{Remaining, RoomClock};
pub use close_codes::CloseCode;
pub use config::ChatConfig;
pub use connection::{ConnectionManager, ConnectionState, TerminationReason};
#[cfg(feature = "http-directory")]
pub use directory::HttpRoomDirectory;
pub use directory::{Room, RoomDirectory};
pub use error::{ChatError, Result};
pub use event::ChatEvent;
pub use identity::{Identity, IdentityStore};
pub use protocol::ChatMessage;
pub use session::ChatSession;
pub use stream::{MessageCursor, MessageStream, MessageView};
pub use transport::{Connector, Transport, TransportEvent};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
