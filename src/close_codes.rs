//! WebSocket close codes and how the session manager classifies them.
//!
//! The chat server ends a room link with a reserved close code when the room
//! has expired or never existed. Every other closure, including a clean
//! `1000`, is treated as a transient interruption and is retried.

use std::fmt;

/// A WebSocket close code as observed by the client.
///
/// Well-known codes get their own variant; anything else is carried in
/// [`CloseCode::Other`]. Use [`CloseCode::is_terminal`] to decide whether a
/// closure means the room is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000, the peer finished normally.
    Normal,
    /// 1001, the peer is going away (server restart, page navigation).
    GoingAway,
    /// 1002, protocol error.
    Protocol,
    /// 1003, the server uses this for "room does not exist".
    Unsupported,
    /// 1005, a close frame without a status code.
    NoStatus,
    /// 1006, the link dropped without a close frame (also used for failed
    /// handshakes and transport errors).
    Abnormal,
    /// 1007, invalid payload data.
    InvalidPayload,
    /// 1008, the server uses this for "room expired".
    PolicyViolation,
    /// 1009, message too big.
    MessageTooBig,
    /// 1011, unexpected server condition.
    InternalError,
    /// 1012, service restart.
    ServiceRestart,
    /// 1013, try again later.
    TryAgainLater,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Returns `true` when the server is signalling that the room is no longer
    /// valid. Terminal closures are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PolicyViolation | Self::Unsupported)
    }

    /// Returns the numeric wire value.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::Protocol => 1002,
            Self::Unsupported => 1003,
            Self::NoStatus => 1005,
            Self::Abnormal => 1006,
            Self::InvalidPayload => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::InternalError => 1011,
            Self::ServiceRestart => 1012,
            Self::TryAgainLater => 1013,
            Self::Other(code) => *code,
        }
    }

    /// Returns a human-readable description of this close code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "The connection was closed normally.",
            Self::GoingAway => "The server is going away.",
            Self::Protocol => "The connection was closed because of a protocol error.",
            Self::Unsupported | Self::PolicyViolation => {
                "This room has expired or doesn't exist."
            }
            Self::NoStatus => "The connection was closed without a status code.",
            Self::Abnormal => "The connection was lost.",
            Self::InvalidPayload => "The server rejected a malformed frame.",
            Self::MessageTooBig => "A message exceeded the server's size limit.",
            Self::InternalError => "The server hit an internal error.",
            Self::ServiceRestart => "The server is restarting.",
            Self::TryAgainLater => "The server is temporarily overloaded.",
            Self::Other(_) => "The connection was closed.",
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::Protocol,
            1003 => Self::Unsupported,
            1005 => Self::NoStatus,
            1006 => Self::Abnormal,
            1007 => Self::InvalidPayload,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1011 => Self::InternalError,
            1012 => Self::ServiceRestart,
            1013 => Self::TryAgainLater,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
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
    fn only_room_invalid_codes_are_terminal() {
        assert!(CloseCode::from(1008).is_terminal());
        assert!(CloseCode::from(1003).is_terminal());

        for code in [1000, 1001, 1002, 1005, 1006, 1011, 1012, 4000] {
            assert!(
                !CloseCode::from(code).is_terminal(),
                "{code} must be retried"
            );
        }
    }

    #[test]
    fn numeric_value_survives_classification() {
        for code in [1000, 1003, 1006, 1008, 1013, 3001, 4999] {
            assert_eq!(CloseCode::from(code).as_u16(), code);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_other() {
        assert_eq!(CloseCode::from(4001), CloseCode::Other(4001));
        assert_eq!(CloseCode::from(4001).description(), "The connection was closed.");
    }

    #[test]
    fn display_includes_code_and_description() {
        let text = CloseCode::PolicyViolation.to_string();
        assert!(text.starts_with("1008"));
        assert!(text.contains("expired"));
    }
}
