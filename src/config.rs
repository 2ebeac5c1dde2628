//! Client configuration and room endpoint construction.

use std::time::Duration;

use url::Url;

use crate::clock::DEFAULT_CLOCK_TICK;
use crate::error::{ChatError, Result};
use crate::identity::Identity;

/// Environment variable holding the streaming base URL.
pub const WS_URL_ENV: &str = "YAPPR_WS_URL";

/// Environment variable holding the HTTP API base URL.
pub const API_URL_ENV: &str = "YAPPR_API_URL";

/// Streaming base URL used when nothing else is configured.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080";

/// Default delay unit for linear reconnect backoff.
const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default number of reconnect attempts before giving up.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default timeout for a single connection handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default capacity of the bounded session event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 16;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration shared by every room session a client opens.
///
/// The only required value is the streaming base URL; all others have
/// defaults matching the hosted service.
///
/// # Example
///
/// ```
/// use yappr_client::ChatConfig;
/// use std::time::Duration;
///
/// let config = ChatConfig::new("wss://chat.example.com")?
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_base_delay(Duration::from_millis(250));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// # Ok::<(), yappr_client::ChatError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base of the streaming endpoint (`ws://` or `wss://`).
    pub ws_base_url: Url,
    /// Base of the HTTP API used by collaborators such as the room directory.
    pub api_base_url: Url,
    /// Unit of the linear backoff: attempt `n` waits `n × base`.
    ///
    /// Defaults to **500 ms**.
    pub reconnect_base_delay: Duration,
    /// Unexpected closes tolerated without a successful open.
    ///
    /// Defaults to **5**.
    pub max_reconnect_attempts: u32,
    /// Upper bound on one handshake. A timeout counts as an unexpected close.
    ///
    /// Defaults to **10 seconds**. Values below 1 ms are clamped to 1 ms.
    pub connect_timeout: Duration,
    /// Time the connection task gets to close its socket on stop before it is
    /// aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts immediately.
    pub shutdown_timeout: Duration,
    /// Capacity of the bounded [`ChatEvent`](crate::ChatEvent) channel.
    ///
    /// Defaults to **16**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Refresh period for room countdowns.
    ///
    /// Defaults to **60 seconds**.
    pub clock_tick: Duration,
}

impl ChatConfig {
    /// Create a configuration for the given streaming base URL. The API base
    /// is derived by swapping `ws`/`wss` for `http`/`https`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidUrl`] if `ws_base_url` does not parse.
    pub fn new(ws_base_url: &str) -> Result<Self> {
        let ws_base_url = Url::parse(ws_base_url)?;
        let api_base_url = http_counterpart(&ws_base_url)?;
        Ok(Self {
            ws_base_url,
            api_base_url,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            clock_tick: DEFAULT_CLOCK_TICK,
        })
    }

    /// Build a configuration from `YAPPR_WS_URL` / `YAPPR_API_URL`. Without
    /// `YAPPR_WS_URL` the local development server is assumed; without
    /// `YAPPR_API_URL` the API base is derived from the streaming base.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidUrl`] if either variable holds an invalid URL.
    pub fn from_env() -> Result<Self> {
        let ws = std::env::var(WS_URL_ENV).unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        let config = Self::new(&ws)?;
        match std::env::var(API_URL_ENV) {
            Ok(api) => config.with_api_base_url(&api),
            Err(_) => Ok(config),
        }
    }

    /// Use a different HTTP API base.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidUrl`] if `api_base_url` does not parse.
    pub fn with_api_base_url(mut self, api_base_url: &str) -> Result<Self> {
        self.api_base_url = Url::parse(api_base_url)?;
        Ok(self)
    }

    /// Set the linear backoff unit.
    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set how many reconnect attempts are made before giving up.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the per-handshake timeout. Values below 1 ms are clamped to 1 ms.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the capacity of the session event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the countdown refresh period. Values below 1 s are clamped to 1 s.
    #[must_use]
    pub fn with_clock_tick(mut self, tick: Duration) -> Self {
        self.clock_tick = tick.max(Duration::from_secs(1));
        self
    }

    /// Streaming endpoint for `room` as `identity`:
    /// `{ws_base}/ws/joinRoom/{room}?userId={id}&username={name}`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotABaseUrl`] if the configured base cannot carry
    /// a path.
    pub fn room_endpoint(&self, room: &str, identity: &Identity) -> Result<Url> {
        let mut url = self.ws_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChatError::NotABaseUrl(self.ws_base_url.to_string()))?
            .pop_if_empty()
            .extend(["ws", "joinRoom", room]);
        url.query_pairs_mut()
            .clear()
            .append_pair("userId", &identity.id)
            .append_pair("username", &identity.username);
        Ok(url)
    }

    /// HTTP endpoint under the API base, e.g. `api_endpoint(&["ws", "getRooms"])`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotABaseUrl`] if the configured base cannot carry
    /// a path.
    pub fn api_endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChatError::NotABaseUrl(self.api_base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// `ws://host/x` → `http://host/x`, `wss://` → `https://`; other schemes are
/// kept as they are.
fn http_counterpart(ws: &Url) -> Result<Url> {
    let scheme = match ws.scheme() {
        "ws" => "http",
        "wss" => "https",
        _ => return Ok(ws.clone()),
    };
    let rest = ws
        .as_str()
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    Ok(Url::parse(&format!("{scheme}:{rest}"))?)
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
    fn config_defaults() {
        let config = ChatConfig::new("ws://chat.test:8080").unwrap();
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 16);
        assert_eq!(config.clock_tick, Duration::from_secs(60));
        assert_eq!(config.api_base_url.as_str(), "http://chat.test:8080/");
    }

    #[test]
    fn secure_scheme_maps_to_https() {
        let config = ChatConfig::new("wss://chat.test/base").unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://chat.test/base");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ChatConfig::new("not a url"),
            Err(ChatError::InvalidUrl(_))
        ));
    }

    #[test]
    fn setters_clamp_degenerate_values() {
        let config = ChatConfig::new("ws://chat.test")
            .unwrap()
            .with_event_channel_capacity(0)
            .with_connect_timeout(Duration::ZERO)
            .with_clock_tick(Duration::ZERO);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.connect_timeout, Duration::from_millis(1));
        assert_eq!(config.clock_tick, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn clamped_clock_tick_drives_an_interval() {
        let config = ChatConfig::new("ws://chat.test")
            .unwrap()
            .with_clock_tick(Duration::from_millis(200));
        let mut interval = tokio::time::interval(config.clock_tick);
        let start = tokio::time::Instant::now();
        interval.tick().await;
        interval.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn room_endpoint_encodes_identity() {
        let config = ChatConfig::new("ws://chat.test:8080").unwrap();
        let identity = Identity::new("u-1", "Ada & Bob?");
        let url = config.room_endpoint("room-42", &identity).unwrap();

        assert_eq!(url.path(), "/ws/joinRoom/room-42");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("userId".to_string(), "u-1".to_string()),
                ("username".to_string(), "Ada & Bob?".to_string()),
            ]
        );
        assert!(!url.as_str().contains("Ada & Bob?"));
    }

    #[test]
    fn room_endpoint_keeps_base_path_prefix() {
        let config = ChatConfig::new("wss://chat.test/api/").unwrap();
        let url = config
            .room_endpoint("r1", &Identity::new("u", "n"))
            .unwrap();
        assert_eq!(url.path(), "/api/ws/joinRoom/r1");
    }

    #[test]
    fn room_ids_are_path_escaped() {
        let config = ChatConfig::new("ws://chat.test").unwrap();
        let url = config
            .room_endpoint("a/b", &Identity::new("u", "n"))
            .unwrap();
        assert_eq!(url.path(), "/ws/joinRoom/a%2Fb");
    }

    #[test]
    fn api_endpoint_appends_segments() {
        let config = ChatConfig::new("ws://chat.test")
            .unwrap()
            .with_api_base_url("https://api.chat.test/v1")
            .unwrap();
        let url = config.api_endpoint(&["ws", "getRooms"]).unwrap();
        assert_eq!(url.as_str(), "https://api.chat.test/v1/ws/getRooms");
    }
}
