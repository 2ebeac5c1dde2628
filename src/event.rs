//! Session outcomes surfaced to the UI layer.
//!
//! Transient link failures are handled inside the connection manager and
//! never appear here. Only the two outcomes that require the user's
//! attention cross this boundary.

use crate::close_codes::CloseCode;
use crate::protocol::RoomId;

/// Notice shown when the server reports that a room is gone.
pub const ROOM_UNAVAILABLE_NOTICE: &str =
    "This room has expired or doesn't exist. Redirecting to room list...";

/// Events emitted by a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The server closed the link with a room-invalid code. The UI should
    /// leave the room view and show `notice`. No reconnect will happen.
    RoomUnavailable {
        room: RoomId,
        code: CloseCode,
        notice: String,
    },
    /// Every reconnect attempt failed. No further automatic action is taken.
    RetriesExhausted { room: RoomId, attempts: u32 },
}

impl ChatEvent {
    pub(crate) fn room_unavailable(room: &str, code: CloseCode) -> Self {
        Self::RoomUnavailable {
            room: room.to_string(),
            code,
            notice: ROOM_UNAVAILABLE_NOTICE.to_string(),
        }
    }

    /// Room the event concerns.
    pub fn room(&self) -> &str {
        match self {
            Self::RoomUnavailable { room, .. } | Self::RetriesExhausted { room, .. } => room,
        }
    }

    /// `true` when the UI should navigate away from the room view.
    pub fn should_leave_room(&self) -> bool {
        matches!(self, Self::RoomUnavailable { .. })
    }
}
