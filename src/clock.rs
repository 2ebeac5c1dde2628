//! Room expiry countdown.
//!
//! Pure functions over `(expires_at, now)`. Nothing here is pushed by the
//! server; callers recompute on their own polling tick (see
//! [`RoomClock::ticker`]).

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Default interval between countdown refreshes.
pub const DEFAULT_CLOCK_TICK: Duration = Duration::from_secs(60);

/// Time left before a room expires, at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// The expiry instant has been reached.
    Expired,
    /// Under an hour left. Whole minutes, rounded down.
    Minutes(i64),
    /// An hour or more left.
    HoursMinutes { hours: i64, minutes: i64 },
}

impl Remaining {
    /// Classify the gap between `now` and `expires_at`.
    pub fn between(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if is_expired(expires_at, now) {
            return Self::Expired;
        }
        let total_minutes = (expires_at - now).num_minutes();
        if total_minutes < 60 {
            Self::Minutes(total_minutes)
        } else {
            Self::HoursMinutes {
                hours: total_minutes / 60,
                minutes: total_minutes % 60,
            }
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("Expired"),
            Self::Minutes(m) => write!(f, "{m}m"),
            Self::HoursMinutes { hours, minutes } => write!(f, "{hours:02}:{minutes:02}"),
        }
    }
}

/// `"Expired"`, `"{m}m"` or `"{HH}:{MM}"` for the time left until `expires_at`.
pub fn remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    Remaining::between(expires_at, now).to_string()
}

/// `true` once `now` has reached `expires_at`. The boundary counts as expired.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

/// Parse an RFC 3339 expiry as sent by the room directory.
///
/// # Errors
///
/// Returns [`ChatError::InvalidTimestamp`](crate::ChatError::InvalidTimestamp)
/// for anything that is not RFC 3339.
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Countdown for one room, refreshed on a fixed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomClock {
    expires_at: DateTime<Utc>,
    tick: Duration,
}

impl RoomClock {
    /// Clock for a room expiring at `expires_at`, refreshed every
    /// [`DEFAULT_CLOCK_TICK`].
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at,
            tick: DEFAULT_CLOCK_TICK,
        }
    }

    /// Override the refresh period. Zero is clamped to one second.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_secs(1));
        self
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Countdown at `now`.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Remaining {
        Remaining::between(self.expires_at, now)
    }

    /// Countdown at the current wall-clock time.
    pub fn remaining(&self) -> Remaining {
        self.remaining_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Interval that fires once immediately and then every tick. Must be
    /// called inside a tokio runtime.
    pub fn ticker(&self) -> tokio::time::Interval {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval
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
    use chrono::TimeDelta;

    fn now() -> DateTime<Utc> {
        parse_expiry("2026-05-01T10:00:00Z").unwrap()
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        assert_eq!(remaining(now(), now()), "Expired");
        assert!(is_expired(now(), now()));
    }

    #[test]
    fn past_expiry_is_expired() {
        let past = now() - TimeDelta::minutes(3);
        assert_eq!(remaining(past, now()), "Expired");
        assert!(is_expired(past, now()));
    }

    #[test]
    fn under_an_hour_shows_minutes() {
        let expiry = now() + TimeDelta::minutes(45);
        assert_eq!(remaining(expiry, now()), "45m");
        assert!(!is_expired(expiry, now()));
    }

    #[test]
    fn partial_minutes_round_down() {
        let expiry = now() + TimeDelta::seconds(59 * 60 + 59);
        assert_eq!(remaining(expiry, now()), "59m");

        let expiry = now() + TimeDelta::seconds(30);
        assert_eq!(remaining(expiry, now()), "0m");
    }

    #[test]
    fn an_hour_or_more_shows_hours_and_minutes() {
        let expiry = now() + TimeDelta::minutes(2 * 60 + 5);
        assert_eq!(remaining(expiry, now()), "02:05");

        let expiry = now() + TimeDelta::minutes(60);
        assert_eq!(remaining(expiry, now()), "01:00");
    }

    #[test]
    fn long_lived_rooms_keep_all_hour_digits() {
        let expiry = now() + TimeDelta::hours(123) + TimeDelta::minutes(4);
        assert_eq!(remaining(expiry, now()), "123:04");
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        let expiry = parse_expiry("2026-05-01T12:30:00+02:00").unwrap();
        assert_eq!(remaining(expiry, now()), "30m");
    }

    #[test]
    fn room_clock_uses_its_expiry() {
        let clock = RoomClock::new(now() + TimeDelta::minutes(90)).with_tick(Duration::ZERO);
        assert_eq!(clock.tick(), Duration::from_secs(1));
        assert_eq!(
            clock.remaining_at(now()),
            Remaining::HoursMinutes {
                hours: 1,
                minutes: 30
            }
        );
        assert!(clock.is_expired_at(now() + TimeDelta::minutes(90)));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_on_each_period() {
        let clock = RoomClock::new(now()).with_tick(Duration::from_secs(60));
        let mut ticker = clock.ticker();
        let start = tokio::time::Instant::now();
        ticker.tick().await;
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }
}
