//! Per-room connection manager.
//!
//! [`ConnectionManager`] owns one streaming link to a room endpoint. A
//! background task connects through a [`Connector`], appends every inbound
//! message to the session's [`MessageStream`], reconnects after unexpected
//! closes with linear backoff, and gives up when the server says the room is
//! gone or the retry budget runs out.
//!
//! The reconnect rules live in [`ConnectionMachine`], a plain state machine
//! with no I/O, so ordering and cancellation can be tested without sockets.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ChatConfig::new("wss://chat.example.com")?;
//! let identity = Identity::new("u1", "Ada");
//! let (mut manager, mut events) =
//!     ConnectionManager::start(WebSocketConnector::new(), &config, "room-42", &identity)?;
//!
//! manager.send("hello");
//! let mut cursor = manager.messages().subscribe();
//! while let Some(message) = cursor.next().await {
//!     println!("{}: {}", message.username, message.content);
//! }
//! manager.stop().await;
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::close_codes::CloseCode;
use crate::config::ChatConfig;
use crate::error::Result;
use crate::event::ChatEvent;
use crate::identity::Identity;
use crate::protocol::{ChatMessage, RoomId};
use crate::stream::{MessageStream, MessageView};
use crate::transport::{Connector, Transport, TransportEvent};

// ── State ───────────────────────────────────────────────────────────

/// Why a connection stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// [`ConnectionManager::stop`] was called (or the manager was dropped).
    Stopped,
    /// The server closed with a room-invalid code.
    RoomInvalid,
    /// The reconnect budget ran out.
    Exhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::RoomInvalid => "room_invalid",
            Self::Exhausted => "exhausted",
        })
    }
}

/// Lifecycle of one room link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A handshake is in flight.
    Connecting,
    /// The link is live; sends are forwarded.
    Open,
    /// Waiting for the retry timer of reconnect `attempt` (1-based).
    Reconnecting { attempt: u32 },
    /// Absorbing: nothing else happens on this manager.
    Terminated(TerminationReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Terminated(reason) => write!(f, "terminated ({reason})"),
        }
    }
}

// ── Backoff ─────────────────────────────────────────────────────────

/// Linear, jitter-free reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempt `n` waits `n × base_delay`.
    pub base_delay: Duration,
    /// Unexpected closes tolerated without a successful open.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 5)
    }
}

impl From<&ChatConfig> for ReconnectPolicy {
    fn from(config: &ChatConfig) -> Self {
        Self::new(config.reconnect_base_delay, config.max_reconnect_attempts)
    }
}

// ── State machine ───────────────────────────────────────────────────

/// What the driver must do after feeding an input to [`ConnectionMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The input does not apply in the current state.
    Ignored,
    /// `Connecting → Open`; the backoff counter was reset.
    Opened,
    /// Arm the retry timer for `attempt` with `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// The retry timer fired; start a new handshake.
    Reconnect,
    /// Entered `Terminated(reason)`.
    Terminated(TerminationReason),
}

/// Reconnect rules for one room link, free of I/O.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    /// A machine in `Connecting` with a zeroed counter.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current backoff counter.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// The handshake completed.
    pub fn on_open(&mut self) -> Transition {
        if self.state != ConnectionState::Connecting {
            return Transition::Ignored;
        }
        self.state = ConnectionState::Open;
        self.attempts = 0;
        Transition::Opened
    }

    /// The link closed (or the handshake failed) with `code`.
    pub fn on_close(&mut self, code: CloseCode) -> Transition {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {}
            ConnectionState::Reconnecting { .. } | ConnectionState::Terminated(_) => {
                return Transition::Ignored;
            }
        }

        if code.is_terminal() {
            return self.terminate(TerminationReason::RoomInvalid);
        }
        if self.attempts >= self.policy.max_attempts {
            return self.terminate(TerminationReason::Exhausted);
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.state = ConnectionState::Reconnecting { attempt };
        Transition::RetryScheduled {
            attempt,
            delay: self.policy.delay_for(attempt),
        }
    }

    /// The retry timer fired.
    pub fn on_retry_elapsed(&mut self) -> Transition {
        if !matches!(self.state, ConnectionState::Reconnecting { .. }) {
            return Transition::Ignored;
        }
        self.state = ConnectionState::Connecting;
        Transition::Reconnect
    }

    /// Explicit stop. An already-terminated machine keeps its reason.
    pub fn on_stop(&mut self) -> Transition {
        if self.state.is_terminated() {
            return Transition::Ignored;
        }
        self.terminate(TerminationReason::Stopped)
    }

    fn terminate(&mut self, reason: TerminationReason) -> Transition {
        self.state = ConnectionState::Terminated(reason);
        Transition::Terminated(reason)
    }
}

/// The pending reconnect. Dropping it cancels the retry.
struct RetryTimer {
    attempt: u32,
    sleep: Pin<Box<Sleep>>,
}

impl RetryTimer {
    fn new(attempt: u32, delay: Duration) -> Self {
        Self {
            attempt,
            sleep: Box::pin(tokio::time::sleep(delay)),
        }
    }
}

// ── Shared context ──────────────────────────────────────────────────

/// Everything the connection task publishes into.
struct LinkContext {
    room: RoomId,
    stream: Arc<MessageStream<ChatMessage>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: mpsc::Sender<ChatEvent>,
}

impl LinkContext {
    fn publish(&self, machine: &ConnectionMachine) {
        self.state_tx.send_replace(machine.state());
    }

    /// Delivered with `send().await`: these are the last events of a session
    /// and must not be dropped for lack of capacity.
    async fn emit(&self, event: ChatEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!(room = %self.room, "event channel closed, receiver dropped");
        }
    }
}

// ── Manager handle ──────────────────────────────────────────────────

/// Handle to the connection task of one room.
///
/// Created via [`ConnectionManager::start`]. Dropping the handle aborts the
/// task; call [`stop`](ConnectionManager::stop) for a graceful close.
pub struct ConnectionManager {
    room: RoomId,
    /// Outbound frames for the connection task.
    cmd_tx: mpsc::UnboundedSender<String>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    stream: Arc<MessageStream<ChatMessage>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ConnectionManager {
    /// Start connecting to `room` as `identity`.
    ///
    /// Returns immediately in `Connecting`; success is observed as the state
    /// moving to `Open`. The receiver yields the session's terminal
    /// [`ChatEvent`]s. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Only when the room endpoint URL cannot be built from `config`.
    #[must_use = "the event receiver must be used to learn about terminal failures"]
    pub fn start<C: Connector>(
        connector: C,
        config: &ChatConfig,
        room: &str,
        identity: &Identity,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>)> {
        let url = config.room_endpoint(room, identity)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);
        let stream = Arc::new(MessageStream::new());

        let ctx = LinkContext {
            room: room.to_string(),
            stream: Arc::clone(&stream),
            state_tx: Arc::clone(&state_tx),
            event_tx,
        };

        info!(room = %room, user = %identity.id, "starting room session");
        let task = tokio::spawn(connection_loop(
            connector,
            url,
            ReconnectPolicy::from(config),
            config.connect_timeout,
            ctx,
            cmd_rx,
            shutdown_rx,
        ));

        let manager = Self {
            room: room.to_string(),
            cmd_tx,
            state_tx,
            state_rx,
            stream,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };
        Ok((manager, event_rx))
    }

    /// Forward `text` verbatim if the link is open. Otherwise the text is
    /// dropped: nothing is queued or retried.
    pub fn send(&self, text: impl Into<String>) {
        if !self.state().is_open() {
            debug!(room = %self.room, state = %self.state(), "link not open, dropping outbound message");
            return;
        }
        if self.cmd_tx.send(text.into()).is_err() {
            debug!(room = %self.room, "connection task gone, dropping outbound message");
        }
    }

    /// Close the link, cancel any pending retry and end the session.
    ///
    /// Idempotent. Once this returns no message is appended and no event is
    /// emitted. A manager that already terminated keeps its reason.
    pub async fn stop(&mut self) {
        debug!(room = %self.room, "stop requested");

        // Seal first so frames racing with the shutdown signal are refused.
        self.stream.seal();

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the task with a timeout. If it doesn't exit in time, abort it
        // so the socket cannot outlive the session.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!(room = %self.room, "connection task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!(room = %self.room, "connection task did not exit within timeout; aborting");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!(room = %self.room, "connection task aborted: {join_err}");
                    }
                }
            }
        }

        self.mark_stopped();
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Room this manager is bound to.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Read handle on the messages received so far.
    pub fn messages(&self) -> MessageView<ChatMessage> {
        self.stream.view()
    }

    /// Ordered copy of the messages received so far.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.stream.snapshot()
    }

    fn mark_stopped(&self) {
        self.state_tx.send_if_modified(|state| {
            if state.is_terminated() {
                return false;
            }
            *state = ConnectionState::Terminated(TerminationReason::Stopped);
            true
        });
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("room", &self.room)
            .field("state", &self.state())
            .field("messages", &self.stream.len())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // `Drop` cannot await the graceful close; abort the task so the
        // socket and any pending retry are dropped with it.
        self.stream.seal();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.mark_stopped();
    }
}

// ── Connection task ─────────────────────────────────────────────────

/// How an open link ended.
enum LinkOutcome {
    Closed(CloseCode),
    Stopped,
}

/// Background task driving [`ConnectionMachine`] against real transports.
///
/// Exits when the machine terminates or the shutdown signal fires (or its
/// sender is dropped).
async fn connection_loop<C: Connector>(
    connector: C,
    url: Url,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    ctx: LinkContext,
    mut cmd_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(room = %ctx.room, "connection task started");

    let mut machine = ConnectionMachine::new(policy);
    let mut retry: Option<RetryTimer> = None;

    loop {
        match machine.state() {
            ConnectionState::Connecting => {
                let connect = tokio::time::timeout(connect_timeout, connector.connect(&url));
                tokio::pin!(connect);

                let attempt = loop {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown_rx => break None,
                        Some(_) = cmd_rx.recv() => {
                            debug!(room = %ctx.room, "link not open, dropping outbound message");
                        }
                        result = &mut connect => break Some(result),
                    }
                };

                let code = match attempt {
                    None => {
                        stop_machine(&mut machine, &ctx);
                        break;
                    }
                    Some(Ok(Ok(transport))) => {
                        machine.on_open();
                        ctx.publish(&machine);
                        info!(room = %ctx.room, "room link open");
                        match run_open_link(transport, &ctx, &mut cmd_rx, &mut shutdown_rx).await {
                            LinkOutcome::Closed(code) => code,
                            LinkOutcome::Stopped => {
                                stop_machine(&mut machine, &ctx);
                                break;
                            }
                        }
                    }
                    Some(Ok(Err(e))) => {
                        warn!(room = %ctx.room, "handshake failed: {e}");
                        CloseCode::Abnormal
                    }
                    Some(Err(_)) => {
                        warn!(room = %ctx.room, timeout_ms = connect_timeout.as_millis() as u64, "handshake timed out");
                        CloseCode::Abnormal
                    }
                };

                match machine.on_close(code) {
                    Transition::RetryScheduled { attempt, delay } => {
                        info!(
                            room = %ctx.room,
                            code = code.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "room link closed, scheduling reconnect"
                        );
                        retry = Some(RetryTimer::new(attempt, delay));
                        ctx.publish(&machine);
                    }
                    Transition::Terminated(TerminationReason::RoomInvalid) => {
                        warn!(room = %ctx.room, code = code.as_u16(), "room is no longer valid");
                        ctx.publish(&machine);
                        ctx.emit(ChatEvent::room_unavailable(&ctx.room, code)).await;
                    }
                    Transition::Terminated(TerminationReason::Exhausted) => {
                        error!(room = %ctx.room, attempts = machine.attempts(), "giving up on room link: retries exhausted");
                        ctx.publish(&machine);
                        ctx.emit(ChatEvent::RetriesExhausted {
                            room: ctx.room.clone(),
                            attempts: machine.attempts(),
                        })
                        .await;
                    }
                    Transition::Terminated(TerminationReason::Stopped) => {
                        ctx.publish(&machine);
                    }
                    Transition::Ignored | Transition::Opened | Transition::Reconnect => {}
                }
            }

            ConnectionState::Reconnecting { .. } => {
                let Some(timer) = retry.as_mut() else {
                    machine.on_retry_elapsed();
                    ctx.publish(&machine);
                    continue;
                };

                let fired = loop {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown_rx => break false,
                        Some(_) = cmd_rx.recv() => {
                            debug!(room = %ctx.room, "link not open, dropping outbound message");
                        }
                        () = &mut timer.sleep => break true,
                    }
                };

                if !fired {
                    retry = None;
                    stop_machine(&mut machine, &ctx);
                    break;
                }

                debug!(room = %ctx.room, attempt = timer.attempt, "retry timer fired, reconnecting");
                retry = None;
                machine.on_retry_elapsed();
                ctx.publish(&machine);
            }

            // `Open` is only held inside `run_open_link`.
            ConnectionState::Open | ConnectionState::Terminated(_) => break,
        }
    }

    // A finished link never receives messages again.
    ctx.stream.seal();
    debug!(room = %ctx.room, state = %machine.state(), "connection task exited");
}

fn stop_machine(machine: &mut ConnectionMachine, ctx: &LinkContext) {
    debug!(room = %ctx.room, "shutdown signal received");
    machine.on_stop();
    ctx.publish(machine);
}

/// Multiplex outbound frames, inbound frames and the shutdown signal over one
/// open transport until it closes.
async fn run_open_link<T: Transport>(
    mut transport: T,
    ctx: &LinkContext,
    cmd_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> LinkOutcome {
    loop {
        tokio::select! {
            biased;

            // Branch 1: stop
            _ = &mut *shutdown_rx => {
                if let Err(e) = transport.close().await {
                    debug!(room = %ctx.room, "close on stop failed: {e}");
                }
                return LinkOutcome::Stopped;
            }

            // Branch 2: outbound text from the handle
            Some(frame) = cmd_rx.recv() => {
                if let Err(e) = transport.send(frame).await {
                    warn!(room = %ctx.room, "send failed, forcing link closed: {e}");
                    let _ = transport.close().await;
                    return LinkOutcome::Closed(CloseCode::Abnormal);
                }
            }

            // Branch 3: inbound frames
            incoming = transport.recv() => {
                match incoming {
                    Ok(TransportEvent::Text(text)) => match ChatMessage::from_frame(&text) {
                        Ok(message) => {
                            if !ctx.stream.append(message) {
                                debug!(room = %ctx.room, "session ended, discarding inbound message");
                            }
                        }
                        Err(e) => {
                            warn!(room = %ctx.room, "failed to parse inbound frame: {e} (raw: {text})");
                        }
                    },
                    Ok(TransportEvent::Closed(code)) => {
                        let code = code.unwrap_or(CloseCode::Abnormal);
                        debug!(room = %ctx.room, code = code.as_u16(), "room link closed by server");
                        return LinkOutcome::Closed(code);
                    }
                    Err(e) => {
                        warn!(room = %ctx.room, "transport error, forcing link closed: {e}");
                        let _ = transport.close().await;
                        return LinkOutcome::Closed(CloseCode::Abnormal);
                    }
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(ReconnectPolicy::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_connecting_with_zero_attempts() {
        let m = machine();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.attempts(), 0);
    }

    #[test]
    fn open_resets_counter() {
        let mut m = machine();
        m.on_close(CloseCode::Abnormal);
        m.on_retry_elapsed();
        assert_eq!(m.attempts(), 1);

        assert_eq!(m.on_open(), Transition::Opened);
        assert_eq!(m.state(), ConnectionState::Open);
        assert_eq!(m.attempts(), 0);
    }

    #[test]
    fn linear_backoff_then_exhaustion() {
        let mut m = machine();
        let mut delays = Vec::new();

        for _ in 0..5 {
            match m.on_close(CloseCode::Abnormal) {
                Transition::RetryScheduled { delay, .. } => delays.push(delay),
                other => panic!("expected a retry, got {other:?}"),
            }
            assert_eq!(m.on_retry_elapsed(), Transition::Reconnect);
        }

        assert_eq!(delays, vec![ms(500), ms(1000), ms(1500), ms(2000), ms(2500)]);
        assert_eq!(
            m.on_close(CloseCode::Abnormal),
            Transition::Terminated(TerminationReason::Exhausted)
        );
        assert_eq!(
            m.state(),
            ConnectionState::Terminated(TerminationReason::Exhausted)
        );
    }

    #[test]
    fn closes_never_terminate_as_stopped() {
        for raw in [1000u16, 1001, 1003, 1005, 1006, 1008, 1011, 4000] {
            let mut m = machine();
            loop {
                match m.on_close(CloseCode::from(raw)) {
                    Transition::RetryScheduled { .. } => {
                        m.on_retry_elapsed();
                    }
                    Transition::Terminated(reason) => {
                        assert_ne!(reason, TerminationReason::Stopped, "close code {raw}");
                        break;
                    }
                    other => panic!("unexpected transition {other:?} for {raw}"),
                }
            }
        }
    }

    #[test]
    fn terminal_code_skips_retries_at_any_counter() {
        for prior_failures in 0..5 {
            let mut m = machine();
            for _ in 0..prior_failures {
                m.on_close(CloseCode::GoingAway);
                m.on_retry_elapsed();
            }
            m.on_open();
            assert_eq!(
                m.on_close(CloseCode::PolicyViolation),
                Transition::Terminated(TerminationReason::RoomInvalid)
            );
        }

        let mut m = machine();
        m.on_close(CloseCode::Abnormal);
        m.on_retry_elapsed();
        assert_eq!(
            m.on_close(CloseCode::Unsupported),
            Transition::Terminated(TerminationReason::RoomInvalid)
        );
    }

    #[test]
    fn counter_restarts_after_successful_reopen() {
        let mut m = machine();
        m.on_close(CloseCode::Abnormal);
        m.on_retry_elapsed();
        m.on_close(CloseCode::Abnormal);
        m.on_retry_elapsed();
        m.on_open();

        assert_eq!(
            m.on_close(CloseCode::Normal),
            Transition::RetryScheduled {
                attempt: 1,
                delay: ms(500)
            }
        );
    }

    #[test]
    fn terminated_is_absorbing() {
        let mut m = machine();
        m.on_open();
        m.on_close(CloseCode::PolicyViolation);

        assert_eq!(m.on_close(CloseCode::Abnormal), Transition::Ignored);
        assert_eq!(m.on_retry_elapsed(), Transition::Ignored);
        assert_eq!(m.on_open(), Transition::Ignored);
        assert_eq!(m.on_stop(), Transition::Ignored);
        assert_eq!(
            m.state(),
            ConnectionState::Terminated(TerminationReason::RoomInvalid)
        );
    }

    #[test]
    fn stop_is_idempotent_from_any_live_state() {
        let mut connecting = machine();
        assert_eq!(
            connecting.on_stop(),
            Transition::Terminated(TerminationReason::Stopped)
        );
        assert_eq!(connecting.on_stop(), Transition::Ignored);

        let mut reconnecting = machine();
        reconnecting.on_close(CloseCode::Abnormal);
        reconnecting.on_stop();
        assert_eq!(
            reconnecting.state(),
            ConnectionState::Terminated(TerminationReason::Stopped)
        );
        assert_eq!(reconnecting.on_retry_elapsed(), Transition::Ignored);
    }

    #[test]
    fn close_while_waiting_for_retry_is_ignored() {
        let mut m = machine();
        m.on_close(CloseCode::Abnormal);
        assert_eq!(m.on_close(CloseCode::Abnormal), Transition::Ignored);
        assert_eq!(m.attempts(), 1);
    }

    #[test]
    fn zero_budget_terminates_on_first_close() {
        let mut m = ConnectionMachine::new(ReconnectPolicy::new(ms(500), 0));
        m.on_open();
        assert_eq!(
            m.on_close(CloseCode::Abnormal),
            Transition::Terminated(TerminationReason::Exhausted)
        );
    }

    #[test]
    fn policy_follows_config() {
        let config = ChatConfig::new("ws://chat.test")
            .unwrap()
            .with_reconnect_base_delay(ms(100))
            .with_max_reconnect_attempts(2);
        let policy = ReconnectPolicy::from(&config);
        assert_eq!(policy.delay_for(3), ms(300));
        assert_eq!(policy.max_attempts, 2);
    }

    #[test]
    fn state_display_is_readable() {
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "reconnecting (attempt 2)"
        );
        assert_eq!(
            ConnectionState::Terminated(TerminationReason::RoomInvalid).to_string(),
            "terminated (room_invalid)"
        );
    }
}
