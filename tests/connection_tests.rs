#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for `ConnectionManager`.
//!
//! Uses the scripted `MockConnector` from `tests/common` to drive the
//! connection task through opens, closes and failures. Backoff timing runs on
//! tokio's paused clock, so delays are exact.

mod common;

use std::time::Duration;

use yappr_client::{
    ChatEvent, CloseCode, ConnectionManager, ConnectionState, Identity, TerminationReason,
    TransportEvent,
};

use common::{
    chat_step, frame, live_link, message, open_link, test_config, wait_for_state, Link,
    MockConnector, Probe, Step,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a manager over scripted links
// ════════════════════════════════════════════════════════════════════

const ROOM: &str = "room-42";

fn ada() -> Identity {
    Identity::new("u-1", "Ada")
}

fn start(
    links: Vec<Link>,
) -> (
    ConnectionManager,
    tokio::sync::mpsc::Receiver<ChatEvent>,
    Probe,
) {
    let (connector, probe) = MockConnector::new(links);
    let (manager, events) =
        ConnectionManager::start(connector, &test_config(), ROOM, &ada()).expect("start");
    (manager, events, probe)
}

async fn wait_open(manager: &ConnectionManager) {
    wait_for_state(&mut manager.state_changes(), ConnectionState::is_open).await;
}

async fn wait_terminated(manager: &ConnectionManager) -> ConnectionState {
    wait_for_state(&mut manager.state_changes(), ConnectionState::is_terminated).await
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ════════════════════════════════════════════════════════════════════
// Message stream
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn frames_are_appended_in_arrival_order() {
    let expected: Vec<_> = (0..20)
        .map(|i| message(ROOM, "Grace", &format!("message {i}")))
        .collect();
    let steps = expected.iter().map(|m| Step::Frame(frame(m))).collect();
    let (mut manager, _events, _probe) = start(vec![Link::Accept(steps)]);

    let mut cursor = manager.messages().subscribe();
    for want in &expected {
        assert_eq!(cursor.next().await.as_ref(), Some(want));
    }

    assert_eq!(manager.snapshot(), expected);
    assert_eq!(manager.state(), ConnectionState::Open);
    manager.stop().await;
}

#[tokio::test]
async fn malformed_frame_is_dropped_without_closing() {
    let (mut manager, _events, probe) = start(vec![Link::Accept(vec![
        chat_step(ROOM, "Grace", "first"),
        Step::Frame("{not json".into()),
        Step::Frame(r#"{"content":"missing fields"}"#.into()),
        chat_step(ROOM, "Grace", "second"),
    ])]);

    let mut cursor = manager.messages().subscribe();
    assert_eq!(cursor.next().await.unwrap().content, "first");
    assert_eq!(cursor.next().await.unwrap().content, "second");

    assert_eq!(manager.snapshot().len(), 2);
    assert!(manager.is_open());
    assert_eq!(probe.connect_count(), 1);
    manager.stop().await;
}

#[tokio::test]
async fn system_notices_are_kept() {
    let notice = r#"{"content":"Grace joined","room_id":"room-42","username":"system","system":true}"#;
    let (mut manager, _events, _probe) = start(vec![Link::Accept(vec![Step::Frame(notice.into())])]);

    let received = manager.messages().subscribe().next().await.unwrap();
    assert!(received.system);
    assert_eq!(received.user_id, None);
    manager.stop().await;
}

// ════════════════════════════════════════════════════════════════════
// Endpoint
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn connects_to_room_endpoint_with_identity() {
    let (connector, probe) = MockConnector::new(vec![open_link()]);
    let identity = Identity::guest("u-17", "night owl & co");
    let (mut manager, _events) =
        ConnectionManager::start(connector, &test_config(), ROOM, &identity).unwrap();
    wait_open(&manager).await;

    let url = &probe.urls()[0];
    assert_eq!(url.path(), "/ws/joinRoom/room-42");
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        query,
        vec![
            ("userId".to_string(), "u-17".to_string()),
            ("username".to_string(), "night owl & co".to_string()),
        ]
    );
    manager.stop().await;
}

// ════════════════════════════════════════════════════════════════════
// Sending
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn send_while_open_writes_raw_text() {
    let (mut manager, _events, probe) = start(vec![open_link()]);
    wait_open(&manager).await;

    manager.send("hello there");
    manager.send(String::from("{\"looks\":\"like json\"}"));
    tokio::time::sleep(ms(10)).await;

    assert_eq!(probe.sent(), vec!["hello there", "{\"looks\":\"like json\"}"]);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn send_while_connecting_is_dropped() {
    let (mut manager, _events, probe) = start(vec![Link::Hang]);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    manager.send("lost");
    tokio::time::sleep(ms(10)).await;

    assert!(probe.sent().is_empty());
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn send_while_reconnecting_is_not_replayed_after_open() {
    let (mut manager, _events, probe) = start(vec![Link::Refuse, open_link()]);
    wait_for_state(&mut manager.state_changes(), |s| {
        matches!(s, ConnectionState::Reconnecting { .. })
    })
    .await;

    manager.send("too early");
    wait_open(&manager).await;
    manager.send("on time");
    tokio::time::sleep(ms(10)).await;

    assert_eq!(probe.sent(), vec!["on time"]);
    manager.stop().await;
}

#[tokio::test]
async fn send_after_stop_is_dropped() {
    let (mut manager, _events, probe) = start(vec![open_link()]);
    wait_open(&manager).await;
    manager.stop().await;

    manager.send("late");
    assert!(probe.sent().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Stop
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn stop_is_idempotent() {
    let (mut manager, mut events, probe) = start(vec![open_link()]);
    wait_open(&manager).await;

    manager.stop().await;
    let once = manager.state();
    manager.stop().await;

    assert_eq!(once, ConnectionState::Terminated(TerminationReason::Stopped));
    assert_eq!(manager.state(), once);
    assert_eq!(probe.close_count(), 1);
    assert!(manager.messages().is_sealed());
    // No terminal event for an explicit stop; the channel just closes.
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn frames_racing_with_stop_are_not_appended() {
    let (link, feed) = live_link();
    let (mut manager, _events, _probe) = start(vec![link]);
    wait_open(&manager).await;

    feed.send(TransportEvent::Text(frame(&message(ROOM, "Grace", "kept"))))
        .unwrap();
    let mut cursor = manager.messages().subscribe();
    assert_eq!(cursor.next().await.unwrap().content, "kept");

    // Queued but not yet read when stop is requested.
    feed.send(TransportEvent::Text(frame(&message(ROOM, "Grace", "late"))))
        .unwrap();
    manager.stop().await;
    let _ = feed.send(TransportEvent::Text(frame(&message(ROOM, "Grace", "later"))));
    tokio::time::sleep(ms(10)).await;

    assert_eq!(manager.snapshot().len(), 1);
    assert_eq!(cursor.next().await, None);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_retry() {
    let (mut manager, _events, probe) = start(vec![Link::Refuse, open_link()]);
    wait_for_state(&mut manager.state_changes(), |s| {
        *s == ConnectionState::Reconnecting { attempt: 1 }
    })
    .await;

    manager.stop().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(probe.connect_count(), 1);
    assert_eq!(
        manager.state(),
        ConnectionState::Terminated(TerminationReason::Stopped)
    );
}

#[tokio::test(start_paused = true)]
async fn stop_during_handshake_abandons_it() {
    let (mut manager, _events, probe) = start(vec![Link::Hang, open_link()]);
    tokio::time::sleep(ms(10)).await;

    manager.stop().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(probe.connect_count(), 1);
    assert!(manager.state().is_terminated());
}

#[tokio::test(start_paused = true)]
async fn drop_aborts_the_connection_task() {
    let (manager, _events, probe) = start(vec![Link::Refuse, open_link()]);
    let mut state = manager.state_changes();
    let view = manager.messages();
    tokio::time::sleep(ms(10)).await;

    drop(manager);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(probe.connect_count(), 1);
    assert!(view.is_sealed());
    assert_eq!(
        *state.borrow_and_update(),
        ConnectionState::Terminated(TerminationReason::Stopped)
    );
}

// ════════════════════════════════════════════════════════════════════
// Terminal closes
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn policy_violation_close_ends_session_without_retry() {
    let (mut manager, mut events, probe) = start(vec![
        Link::Accept(vec![
            chat_step(ROOM, "Grace", "last words"),
            Step::Close(Some(CloseCode::PolicyViolation)),
        ]),
        open_link(),
    ]);

    let event = events.recv().await.expect("room event");
    assert!(event.should_leave_room());
    assert_eq!(
        event,
        ChatEvent::RoomUnavailable {
            room: ROOM.into(),
            code: CloseCode::PolicyViolation,
            notice: yappr_client::event::ROOM_UNAVAILABLE_NOTICE.into(),
        }
    );

    assert_eq!(
        wait_terminated(&manager).await,
        ConnectionState::Terminated(TerminationReason::RoomInvalid)
    );
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(probe.connect_count(), 1);
    assert_eq!(manager.snapshot().len(), 1);

    // Stopping afterwards keeps the original reason.
    manager.stop().await;
    assert_eq!(
        manager.state(),
        ConnectionState::Terminated(TerminationReason::RoomInvalid)
    );
}

#[tokio::test(start_paused = true)]
async fn unsupported_close_after_failures_skips_remaining_retries() {
    let (manager, mut events, probe) = start(vec![
        Link::Refuse,
        Link::Refuse,
        Link::Refuse,
        Link::Accept(vec![Step::Close(Some(CloseCode::Unsupported))]),
    ]);

    let event = events.recv().await.expect("room event");
    assert!(matches!(
        event,
        ChatEvent::RoomUnavailable {
            code: CloseCode::Unsupported,
            ..
        }
    ));
    assert_eq!(
        wait_terminated(&manager).await,
        ConnectionState::Terminated(TerminationReason::RoomInvalid)
    );
    assert_eq!(probe.connect_count(), 4);
    assert_eq!(events.recv().await, None);
}

// ════════════════════════════════════════════════════════════════════
// Reconnect backoff
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn retries_with_linear_backoff_then_gives_up() {
    let (manager, mut events, probe) = start(Vec::new());

    let event = events.recv().await.expect("exhausted event");
    assert_eq!(
        event,
        ChatEvent::RetriesExhausted {
            room: ROOM.into(),
            attempts: 5,
        }
    );
    assert!(!event.should_leave_room());

    assert_eq!(
        wait_terminated(&manager).await,
        ConnectionState::Terminated(TerminationReason::Exhausted)
    );
    assert_eq!(probe.connect_count(), 6);
    assert_eq!(
        probe.connect_gaps(),
        vec![ms(500), ms(1000), ms(1500), ms(2000), ms(2500)]
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(probe.connect_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn counter_resets_after_successful_reopen() {
    let (mut manager, _events, probe) = start(vec![
        Link::Refuse,
        Link::Refuse,
        Link::Accept(vec![Step::Close(Some(CloseCode::Normal))]),
        Link::Refuse,
        open_link(),
    ]);

    // The third link opens briefly; wait for the one that stays open.
    let counter = probe.clone();
    wait_for_state(&mut manager.state_changes(), move |s| {
        s.is_open() && counter.connect_count() == 5
    })
    .await;
    assert_eq!(
        probe.connect_gaps(),
        vec![ms(500), ms(1000), ms(500), ms(1000)]
    );
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn transport_error_forces_close_and_reconnects() {
    let (mut manager, _events, probe) = start(vec![
        Link::Accept(vec![chat_step(ROOM, "Grace", "before"), Step::Fail]),
        Link::Accept(vec![chat_step(ROOM, "Grace", "after")]),
    ]);

    let mut cursor = manager.messages().subscribe();
    assert_eq!(cursor.next().await.unwrap().content, "before");
    assert_eq!(cursor.next().await.unwrap().content, "after");

    assert_eq!(probe.close_count(), 1);
    assert_eq!(probe.connect_gaps(), vec![ms(500)]);
    assert!(manager.is_open());
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn dropped_link_without_close_frame_is_retried() {
    let (mut manager, _events, probe) = start(vec![
        Link::Accept(vec![Step::Wait(ms(250)), Step::Close(None)]),
        open_link(),
    ]);

    wait_for_state(&mut manager.state_changes(), |s| {
        *s == ConnectionState::Reconnecting { attempt: 1 }
    })
    .await;
    wait_open(&manager).await;

    assert_eq!(probe.connect_gaps(), vec![ms(750)]);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn handshake_timeout_counts_as_failure() {
    let (connector, probe) = MockConnector::new(vec![Link::Hang, open_link()]);
    let config = test_config().with_connect_timeout(Duration::from_secs(3));
    let (mut manager, _events) =
        ConnectionManager::start(connector, &config, ROOM, &ada()).unwrap();

    wait_open(&manager).await;
    assert_eq!(probe.connect_gaps(), vec![ms(3500)]);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn custom_policy_from_config() {
    let (connector, probe) = MockConnector::new(Vec::new());
    let config = test_config()
        .with_reconnect_base_delay(ms(100))
        .with_max_reconnect_attempts(2);
    let (manager, mut events) =
        ConnectionManager::start(connector, &config, ROOM, &ada()).unwrap();

    assert_eq!(
        events.recv().await,
        Some(ChatEvent::RetriesExhausted {
            room: ROOM.into(),
            attempts: 2,
        })
    );
    assert_eq!(probe.connect_gaps(), vec![ms(100), ms(200)]);
    assert!(manager.state().is_terminated());
}
