//! Wire types for the room streaming endpoint.
//!
//! Outbound frames are the raw message text with no envelope. Inbound frames
//! are JSON objects produced by the chat server's room hub:
//!
//! ```json
//! {"content":"hi","room_id":"r1","username":"Alice","user_id":"u1","system":false,"timestamp":"2026-01-01T00:00:00Z"}
//! ```
//!
//! Timestamps stay as `String` (RFC 3339) so a frame with an unusual clock
//! format still reaches the message list; parse on demand with
//! [`ChatMessage::sent_at`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── Type aliases ────────────────────────────────────────────────────

/// Opaque room identifier.
pub type RoomId = String;

/// Opaque user identifier.
pub type UserId = String;

// ── Inbound frame ───────────────────────────────────────────────────

/// A message received on a room link. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message text exactly as the sender typed it.
    pub content: String,
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// Sender display name.
    pub username: String,
    /// Sender id. Absent for anonymous or server-generated messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Set by the server for join/leave notices and other announcements.
    #[serde(default)]
    pub system: bool,
    /// Server receive time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    /// Parse one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Serialization`](crate::ChatError::Serialization)
    /// when the frame is not a well-formed message object.
    pub fn from_frame(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Parsed server timestamp, if the frame carried one.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidTimestamp`](crate::ChatError::InvalidTimestamp)
    /// when the timestamp is present but not RFC 3339.
    pub fn sent_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.timestamp
            .as_deref()
            .map(|ts| Ok(DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc)))
            .transpose()
    }

    /// Returns `true` when `user_id` is the sender of this message.
    ///
    /// Falls back to comparing display names for frames without a sender id.
    pub fn is_from(&self, user_id: &str, username: &str) -> bool {
        match &self.user_id {
            Some(id) => id == user_id,
            None => self.username == username,
        }
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

    #[test]
    fn parses_full_server_frame() {
        let frame = r#"{"content":"hello","room_id":"r1","username":"Alice","user_id":"u1","system":false,"timestamp":"2026-03-01T12:30:00Z"}"#;
        let msg = ChatMessage::from_frame(frame).unwrap();
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.user_id.as_deref(), Some("u1"));
        assert!(!msg.system);
        let at = msg.sent_at().unwrap().unwrap();
        assert_eq!(at.to_rfc3339(), "2026-03-01T12:30:00+00:00");
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let frame = r#"{"content":"hi","room_id":"r1","username":"Bob"}"#;
        let msg = ChatMessage::from_frame(frame).unwrap();
        assert!(msg.user_id.is_none());
        assert!(msg.timestamp.is_none());
        assert!(!msg.system);
        assert!(msg.sent_at().unwrap().is_none());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let frame = r#"{"room_id":"r1","username":"Bob"}"#;
        assert!(ChatMessage::from_frame(frame).is_err());
    }

    #[test]
    fn bad_timestamp_is_reported_on_demand() {
        let frame = r#"{"content":"hi","room_id":"r1","username":"Bob","timestamp":"yesterday"}"#;
        let msg = ChatMessage::from_frame(frame).unwrap();
        assert!(msg.sent_at().is_err());
    }

    #[test]
    fn sender_match_prefers_user_id() {
        let msg = ChatMessage {
            content: "x".into(),
            room_id: "r".into(),
            username: "Alice".into(),
            user_id: Some("u1".into()),
            system: false,
            timestamp: None,
        };
        assert!(msg.is_from("u1", "Someone Else"));
        assert!(!msg.is_from("u2", "Alice"));

        let anonymous = ChatMessage {
            user_id: None,
            ..msg
        };
        assert!(anonymous.is_from("u2", "Alice"));
    }
}
