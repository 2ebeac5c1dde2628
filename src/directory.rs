//! Room directory collaborator.
//!
//! The room list is fetched over HTTP and rendered next to each room's
//! [`RoomClock`]. It is never consulted by the connection manager: a room
//! that expires while joined is reported by the server's close code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Remaining, RoomClock};
use crate::error::Result;
use crate::protocol::RoomId;

/// One entry of the room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_source: Option<String>,
}

impl Room {
    /// Countdown for this room's expiry.
    pub fn clock(&self) -> RoomClock {
        RoomClock::new(self.expires_at)
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Remaining {
        self.clock().remaining_at(now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.clock().is_expired_at(now)
    }

    /// `true` when the room carries a discussion topic.
    pub fn has_topic(&self) -> bool {
        self.topic_title.is_some()
    }
}

/// Split a room list into pinned and regular rooms, keeping server order
/// within each group.
pub fn split_pinned(rooms: Vec<Room>) -> (Vec<Room>, Vec<Room>) {
    rooms.into_iter().partition(|room| room.is_pinned)
}

/// Source of the room list.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Fetch every room the server currently knows about.
    ///
    /// # Errors
    ///
    /// Request, status or decoding failures of the backing service.
    async fn fetch_rooms(&self) -> Result<Vec<Room>>;

    /// Look up one room by id.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_rooms`](RoomDirectory::fetch_rooms).
    async fn find_room(&self, id: &str) -> Result<Option<Room>> {
        Ok(self
            .fetch_rooms()
            .await?
            .into_iter()
            .find(|room| room.id == id))
    }
}

#[cfg(feature = "http-directory")]
pub use http::HttpRoomDirectory;

#[cfg(feature = "http-directory")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tracing::{debug, warn};
    use url::Url;

    use super::{Room, RoomDirectory};
    use crate::config::ChatConfig;
    use crate::error::Result;

    /// Pause before the single retry of a 404 room listing.
    const NOT_FOUND_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// [`RoomDirectory`] backed by the chat server's HTTP API.
    #[derive(Debug, Clone)]
    pub struct HttpRoomDirectory {
        client: reqwest::Client,
        rooms_url: Url,
        create_url: Url,
    }

    impl HttpRoomDirectory {
        /// Directory for the API base in `config`.
        ///
        /// # Errors
        ///
        /// When the API base URL cannot carry a path.
        pub fn new(config: &ChatConfig) -> Result<Self> {
            Self::with_client(config, reqwest::Client::new())
        }

        /// Same as [`new`](Self::new) with a shared HTTP client.
        ///
        /// # Errors
        ///
        /// When the API base URL cannot carry a path.
        pub fn with_client(config: &ChatConfig, client: reqwest::Client) -> Result<Self> {
            Ok(Self {
                client,
                rooms_url: config.api_endpoint(&["ws", "getRooms"])?,
                create_url: config.api_endpoint(&["ws", "createRoom"])?,
            })
        }

        /// Create a room named `name` and return it as stored by the server.
        ///
        /// # Errors
        ///
        /// Request, non-success status or decoding failures.
        #[tracing::instrument(skip(self))]
        pub async fn create_room(&self, name: &str) -> Result<Room> {
            let body = serde_json::json!({ "name": name });
            let response = self
                .client
                .post(self.create_url.clone())
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        }

        async fn get_rooms(&self) -> Result<reqwest::Response> {
            Ok(self.client.get(self.rooms_url.clone()).send().await?)
        }
    }

    #[async_trait]
    impl RoomDirectory for HttpRoomDirectory {
        #[tracing::instrument(skip_all)]
        async fn fetch_rooms(&self) -> Result<Vec<Room>> {
            let mut response = self.get_rooms().await?;
            if response.status() == StatusCode::NOT_FOUND {
                warn!(url = %self.rooms_url, "room listing returned 404, retrying once");
                tokio::time::sleep(NOT_FOUND_RETRY_DELAY).await;
                response = self.get_rooms().await?;
            }

            let rooms: Vec<Room> = response.error_for_status()?.json().await?;
            debug!(count = rooms.len(), "fetched room list");
            Ok(rooms)
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
    use chrono::TimeDelta;

    const ROOM_JSON: &str = r#"{
        "id": "3f1c",
        "name": "late night",
        "creator_id": null,
        "created_at": "2026-03-01T10:00:00Z",
        "expires_at": "2026-03-01T12:05:00.123456Z",
        "is_pinned": false,
        "topic_title": "Rust async"
    }"#;

    fn room(id: &str, pinned: bool) -> Room {
        let created_at: DateTime<Utc> = "2026-03-01T10:00:00Z".parse().unwrap();
        Room {
            id: id.into(),
            name: format!("room {id}"),
            is_pinned: pinned,
            created_at,
            expires_at: created_at + TimeDelta::hours(2),
            topic_title: None,
            topic_description: None,
            topic_url: None,
            topic_source: None,
        }
    }

    #[test]
    fn decodes_server_room() {
        let room: Room = serde_json::from_str(ROOM_JSON).unwrap();
        assert_eq!(room.id, "3f1c");
        assert!(!room.is_pinned);
        assert!(room.has_topic());
        assert_eq!(room.topic_url, None);
    }

    #[test]
    fn pinned_flag_defaults_to_false() {
        let json = r#"{"id":"a","name":"n","created_at":"2026-03-01T10:00:00Z","expires_at":"2026-03-01T11:00:00Z"}"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert!(!room.is_pinned);
        assert!(!room.has_topic());
    }

    #[test]
    fn room_clock_uses_expiry() {
        let room: Room = serde_json::from_str(ROOM_JSON).unwrap();
        let now: DateTime<Utc> = "2026-03-01T10:00:00Z".parse().unwrap();
        assert_eq!(room.remaining_at(now).to_string(), "02:05");
        assert!(!room.is_expired_at(now));
        assert!(room.is_expired_at(room.expires_at));
    }

    #[test]
    fn split_keeps_order_within_groups() {
        let (pinned, regular) = split_pinned(vec![
            room("a", false),
            room("b", true),
            room("c", false),
            room("d", true),
        ]);
        let ids = |rooms: &[Room]| rooms.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&pinned), ["b", "d"]);
        assert_eq!(ids(&regular), ["a", "c"]);
    }

    struct FixedDirectory(Vec<Room>);

    #[async_trait]
    impl RoomDirectory for FixedDirectory {
        async fn fetch_rooms(&self) -> Result<Vec<Room>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn find_room_matches_by_id() {
        let directory = FixedDirectory(vec![room("a", false), room("b", true)]);
        assert_eq!(directory.find_room("b").await.unwrap().unwrap().id, "b");
        assert!(directory.find_room("zzz").await.unwrap().is_none());
    }

    #[cfg(feature = "http-directory")]
    mod http_directory {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        use super::*;
        use crate::config::ChatConfig;
        use crate::error::ChatError;

        /// Serve one canned `(status, body)` per connection and count requests.
        async fn start_mock_api(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&hits);

            tokio::spawn(async move {
                for (status, body) in responses {
                    let (mut socket, _) = listener.accept().await.unwrap();
                    read_request(&mut socket).await;
                    counter.fetch_add(1, Ordering::SeqCst);

                    let reply = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    socket.shutdown().await.unwrap();
                }
            });

            (format!("ws://{addr}"), hits)
        }

        /// Consume the request head and its body so closing the socket
        /// does not reset the connection.
        async fn read_request(socket: &mut tokio::net::TcpStream) {
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request);
                let Some(head_end) = text.find("\r\n\r\n") else {
                    continue;
                };
                let body_len = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + body_len {
                    return;
                }
            }
        }

        fn directory(base: &str) -> HttpRoomDirectory {
            HttpRoomDirectory::new(&ChatConfig::new(base).unwrap()).unwrap()
        }

        #[tokio::test]
        async fn fetches_room_list() {
            let body = format!("[{ROOM_JSON}]");
            let (base, hits) = start_mock_api(vec![(200, body)]).await;

            let rooms = directory(&base).fetch_rooms().await.unwrap();
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].name, "late night");
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn retries_once_after_not_found() {
            let body = format!("[{ROOM_JSON}]");
            let (base, hits) =
                start_mock_api(vec![(404, "{}".to_string()), (200, body)]).await;

            let rooms = directory(&base).fetch_rooms().await.unwrap();
            assert_eq!(rooms.len(), 1);
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn second_not_found_is_an_error() {
            let (base, hits) = start_mock_api(vec![
                (404, "{}".to_string()),
                (404, "{}".to_string()),
            ])
            .await;

            let err = directory(&base).fetch_rooms().await.unwrap_err();
            assert!(matches!(err, ChatError::Http(_)));
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn server_error_is_not_retried() {
            let (base, hits) = start_mock_api(vec![(500, "{}".to_string())]).await;

            let err = directory(&base).fetch_rooms().await.unwrap_err();
            assert!(matches!(err, ChatError::Http(_)));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn create_room_returns_stored_room() {
            let (base, hits) = start_mock_api(vec![(201, ROOM_JSON.to_string())]).await;

            let room = directory(&base).create_room("late night").await.unwrap();
            assert_eq!(room.id, "3f1c");
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }
}
