//! Transport abstraction for room links.
//!
//! A [`Transport`] is one live, bidirectional text link. A [`Connector`]
//! produces a fresh transport for every connection attempt, which is what
//! lets the connection manager reconnect without knowing anything about
//! sockets, TLS or browsers.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use url::Url;
//! use yappr_client::error::ChatError;
//! use yappr_client::transport::{Connector, Transport, TransportEvent};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), ChatError> {
//!         // Write one text frame
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Result<TransportEvent, ChatError> {
//!         // Wait for the next text frame or the close
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ChatError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, url: &Url) -> Result<MyTransport, ChatError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;
use url::Url;

use crate::close_codes::CloseCode;
use crate::error::ChatError;

/// What a transport observed on its read side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete text frame.
    Text(String),
    /// The link closed. `None` when the link dropped without a close frame.
    Closed(Option<CloseCode>),
}

/// A bidirectional text link to one room.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the connection
/// task polls it inside `tokio::select!`. Channel-based implementations are
/// naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportSend`] if the frame could not be written
    /// or [`ChatError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, frame: String) -> Result<(), ChatError>;

    /// Wait for the next frame or the close.
    ///
    /// After `Ok(TransportEvent::Closed(_))` the transport is finished and
    /// will not be polled again.
    ///
    /// # Errors
    ///
    /// A transport-level failure (e.g. [`ChatError::TransportReceive`]). The
    /// connection manager reacts by force-closing the link.
    async fn recv(&mut self) -> Result<TransportEvent, ChatError>;

    /// Close the link. Must be idempotent and must release resources even if
    /// the close handshake fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails.
    async fn close(&mut self) -> Result<(), ChatError>;
}

/// Opens transports to room endpoints.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Perform the handshake with `url`. Resolves once the link is open.
    ///
    /// # Errors
    ///
    /// Any failure to establish the link. The connection manager treats it as
    /// an unexpected close and schedules a retry.
    async fn connect(&self, url: &Url) -> Result<Self::Transport, ChatError>;
}

#[async_trait]
impl<C: Connector> Connector for std::sync::Arc<C> {
    type Transport = C::Transport;

    async fn connect(&self, url: &Url) -> Result<Self::Transport, ChatError> {
        (**self).connect(url).await
    }
}
