//! Error types for the Yappr client.

use thiserror::Error;

/// Errors that can occur when using the Yappr client.
///
/// Link failures inside a running session never surface as `ChatError`; the
/// connection manager absorbs them into its reconnect state machine. These
/// variants are returned by the transport seams, configuration helpers and
/// the collaborator APIs.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a frame or document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configured base URL or a derived endpoint is not a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot carry a path (e.g. `mailto:`).
    #[error("url cannot be used as a base: {0}")]
    NotABaseUrl(String),

    /// A timestamp was not valid RFC 3339.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    /// A session was requested without an authenticated identity.
    #[error("an authenticated identity is required to join a room")]
    IdentityRequired,

    /// An HTTP collaborator request failed.
    #[cfg(feature = "http-directory")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Yappr client operations.
pub type Result<T> = std::result::Result<T, ChatError>;
