#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Yappr client.
//!
//! Checks inbound frames against JSON fixtures shaped like real server output,
//! close-code classification, and the documents exchanged with the room
//! directory and identity store.

use chrono::{DateTime, TimeZone, Utc};
use yappr_client::close_codes::CloseCode;
use yappr_client::directory::Room;
use yappr_client::protocol::ChatMessage;
use yappr_client::{ChatError, Identity};

// ════════════════════════════════════════════════════════════════════
// Inbound message fixtures
// ════════════════════════════════════════════════════════════════════

/// A user message as broadcast by the room hub.
const USER_FRAME: &str = r#"{
    "content": "anyone up?",
    "room_id": "7d0c2a4e-1f00-4b7e-9f1a-3c2b7d9e0a11",
    "username": "night owl",
    "user_id": "0b8f6c1e-2222-4d4d-8888-1234567890ab",
    "system": false,
    "timestamp": "2026-03-01T23:41:07.512345Z"
}"#;

/// A join notice: no sender id, `system` set.
const SYSTEM_FRAME: &str = r#"{
    "content": "night owl joined the room",
    "room_id": "7d0c2a4e-1f00-4b7e-9f1a-3c2b7d9e0a11",
    "username": "system",
    "system": true
}"#;

#[test]
fn user_frame_decodes_every_field() {
    let message = ChatMessage::from_frame(USER_FRAME).unwrap();
    assert_eq!(message.content, "anyone up?");
    assert_eq!(message.room_id, "7d0c2a4e-1f00-4b7e-9f1a-3c2b7d9e0a11");
    assert_eq!(message.username, "night owl");
    assert_eq!(
        message.user_id.as_deref(),
        Some("0b8f6c1e-2222-4d4d-8888-1234567890ab")
    );
    assert!(!message.system);

    let sent_at = message.sent_at().unwrap().unwrap();
    assert_eq!(
        sent_at.timestamp(),
        Utc.with_ymd_and_hms(2026, 3, 1, 23, 41, 7).unwrap().timestamp()
    );
}

#[test]
fn system_frame_has_no_sender() {
    let message = ChatMessage::from_frame(SYSTEM_FRAME).unwrap();
    assert!(message.system);
    assert_eq!(message.user_id, None);
    assert_eq!(message.timestamp, None);
    assert_eq!(message.sent_at().unwrap(), None);
}

#[test]
fn minimal_frame_defaults_optional_fields() {
    let message =
        ChatMessage::from_frame(r#"{"content":"x","room_id":"r","username":"u"}"#).unwrap();
    assert!(!message.system);
    assert_eq!(message.user_id, None);
}

#[test]
fn unknown_fields_are_ignored() {
    let message = ChatMessage::from_frame(
        r#"{"content":"x","room_id":"r","username":"u","reactions":[],"edited":true}"#,
    )
    .unwrap();
    assert_eq!(message.content, "x");
}

#[test]
fn content_is_not_trimmed_or_unescaped_twice() {
    let message = ChatMessage::from_frame(
        r#"{"content":"  <b>hi</b> \"quoted\" é  ","room_id":"r","username":"u"}"#,
    )
    .unwrap();
    assert_eq!(message.content, "  <b>hi</b> \"quoted\" é  ");
}

#[test]
fn malformed_frames_are_rejected() {
    for frame in [
        "",
        "hello",
        "[]",
        r#"{"content":"x"}"#,
        r#"{"content":1,"room_id":"r","username":"u"}"#,
    ] {
        let err = ChatMessage::from_frame(frame).unwrap_err();
        assert!(
            matches!(err, ChatError::Serialization(_)),
            "frame {frame:?} gave {err:?}"
        );
    }
}

#[test]
fn bad_timestamp_only_fails_on_access() {
    let message = ChatMessage::from_frame(
        r#"{"content":"x","room_id":"r","username":"u","timestamp":"yesterday"}"#,
    )
    .unwrap();
    assert!(matches!(
        message.sent_at().unwrap_err(),
        ChatError::InvalidTimestamp(_)
    ));
}

#[test]
fn serialized_message_omits_absent_options() {
    let message =
        ChatMessage::from_frame(r#"{"content":"x","room_id":"r","username":"u"}"#).unwrap();
    let json = serde_json::to_value(&message).unwrap();
    assert!(json.get("user_id").is_none());
    assert!(json.get("timestamp").is_none());
    assert_eq!(json["system"], false);
}

#[test]
fn sender_match_prefers_id() {
    let message = ChatMessage::from_frame(USER_FRAME).unwrap();
    assert!(message.is_from("0b8f6c1e-2222-4d4d-8888-1234567890ab", "someone else"));
    assert!(!message.is_from("other-id", "night owl"));

    let anonymous =
        ChatMessage::from_frame(r#"{"content":"x","room_id":"r","username":"Ada"}"#).unwrap();
    assert!(anonymous.is_from("any-id", "Ada"));
}

// ════════════════════════════════════════════════════════════════════
// Close codes
// ════════════════════════════════════════════════════════════════════

#[test]
fn only_room_invalid_codes_are_terminal() {
    let terminal: Vec<u16> = (1000..=1015)
        .chain([3000, 4000, 4999])
        .filter(|&raw| CloseCode::from(raw).is_terminal())
        .collect();
    assert_eq!(terminal, vec![1003, 1008]);
}

#[test]
fn close_code_numbers_round_trip() {
    for raw in [1000_u16, 1001, 1003, 1005, 1006, 1008, 1011, 4321] {
        assert_eq!(CloseCode::from(raw).as_u16(), raw);
        assert_eq!(u16::from(CloseCode::from(raw)), raw);
    }
}

#[test]
fn close_code_display_includes_number() {
    let shown = CloseCode::PolicyViolation.to_string();
    assert!(shown.starts_with("1008"), "got {shown}");
}

// ════════════════════════════════════════════════════════════════════
// Room directory documents
// ════════════════════════════════════════════════════════════════════

/// Shape of `GET /ws/getRooms` output.
const ROOM_LIST: &str = r#"[
    {
        "id": "a1",
        "name": "general",
        "creator_id": null,
        "created_at": "2026-03-01T08:00:00Z",
        "expires_at": "2026-03-02T08:00:00Z",
        "is_pinned": true,
        "topic_title": "Daily thread",
        "topic_description": "Whatever is on your mind",
        "topic_url": "https://example.com/daily",
        "topic_source": "editorial",
        "topic_updated_at": "2026-03-01T08:00:00Z"
    },
    {
        "id": "b2",
        "name": "quick one",
        "creator_id": "0b8f6c1e-2222-4d4d-8888-1234567890ab",
        "created_at": "2026-03-01T10:00:00.25+01:00",
        "expires_at": "2026-03-01T10:45:00.25+01:00",
        "is_pinned": false
    }
]"#;

#[test]
fn room_list_decodes() {
    let rooms: Vec<Room> = serde_json::from_str(ROOM_LIST).unwrap();
    assert_eq!(rooms.len(), 2);
    assert!(rooms[0].is_pinned);
    assert_eq!(rooms[0].topic_source.as_deref(), Some("editorial"));
    assert!(!rooms[1].has_topic());
}

#[test]
fn room_offsets_are_normalised_to_utc() {
    let rooms: Vec<Room> = serde_json::from_str(ROOM_LIST).unwrap();
    let expected: DateTime<Utc> = "2026-03-01T09:45:00.25Z".parse().unwrap();
    assert_eq!(rooms[1].expires_at, expected);

    let now: DateTime<Utc> = "2026-03-01T09:00:00Z".parse().unwrap();
    assert_eq!(rooms[1].remaining_at(now).to_string(), "45m");
}

// ════════════════════════════════════════════════════════════════════
// Identity document
// ════════════════════════════════════════════════════════════════════

#[test]
fn identity_document_matches_login_payload() {
    let identity: Identity = serde_json::from_str(
        r#"{"id":"u-1","username":"Ada","email":"ada@example.com","guest":false}"#,
    )
    .unwrap();
    assert_eq!(identity, Identity::new("u-1", "Ada").with_email("ada@example.com"));

    let guest: Identity = serde_json::from_str(r#"{"id":"g-1","username":"guest"}"#).unwrap();
    assert!(!guest.guest);
    let json = serde_json::to_value(Identity::guest("g-1", "guest")).unwrap();
    assert_eq!(json["guest"], true);
    assert!(json.get("email").is_none());
}
