//! Async client for the Click Duel game server.
//!
//! [`ClickDuelClient`] is a thin handle around a background transport loop.
//! The loop owns the [`GameState`] and the local countdown and multiplexes
//! three event sources with `tokio::select!`:
//!
//! - inbound server messages from the [`Transport`]
//! - countdown ticks (only while a match is running)
//! - click commands queued by [`ClickDuelClient::submit_click`]
//!
//! Each handler runs to completion before the next one, so the state needs no
//! locking. After every change the loop publishes a snapshot on a `watch`
//! channel and mirrors the change as a [`GameEvent`] on a bounded channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClickDuelConfig::new(Endpoint::from_origin("https://duel.example.com")?);
//! let (client, mut events) = ClickDuelClient::connect(config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::MatchStarted { .. } => { /* show the click button */ }
//!         GameEvent::MatchEnded(_) => println!("{:?}", client.view().result_text),
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::countdown::{CountdownSlot, MIN_TICK_INTERVAL};
use crate::endpoint::Endpoint;
use crate::event::GameEvent;
use crate::protocol::ClientMessage;
use crate::state::{GameState, Phase, Transition, View};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for establishing the connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default period of the local countdown.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ClickDuelClient`].
///
/// The only required field is the server `endpoint`; everything else has a
/// default.
///
/// ```
/// use click_duel_client::{ClickDuelConfig, Endpoint};
/// use std::time::Duration;
///
/// let endpoint = Endpoint::from_origin("https://duel.example.com").unwrap();
/// let config = ClickDuelConfig::new(endpoint)
///     .with_event_channel_capacity(128)
///     .with_connect_timeout(Duration::from_secs(3));
/// assert_eq!(config.endpoint.as_str(), "wss://duel.example.com/ws");
/// assert_eq!(config.tick_interval, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct ClickDuelConfig {
    /// Game server to connect to.
    pub endpoint: Endpoint,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped (with a warning)
    /// rather than stalling the loop. `Disconnected` is always delivered.
    ///
    /// Defaults to **64**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`ClickDuelClient::shutdown`] waits for a graceful close
    /// before aborting the loop. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// How long [`ClickDuelClient::connect`] waits for the handshake.
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Period of the local countdown. Defaults to **1 second**; values below
    /// 1 ms are clamped.
    pub tick_interval: Duration,
}

impl ClickDuelConfig {
    /// Create a configuration for `endpoint` with default values.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the capacity of the bounded event channel. Clamped to at least 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown. Zero aborts immediately.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the connection handshake timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the local countdown period. Clamped to at least 1 ms.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running Click Duel client.
///
/// Created via [`ClickDuelClient::start`] (any connected [`Transport`]) or
/// [`ClickDuelClient::connect`] (WebSocket). The connection is never
/// re-established: once it closes, the client stays disconnected and the click
/// action stays disabled.
pub struct ClickDuelClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// Latest state published by the transport loop.
    state_rx: watch::Receiver<GameState>,
    /// Shared with the loop so the handle can publish the close if the loop
    /// had to be aborted.
    state_tx: Arc<watch::Sender<GameState>>,
    /// Weak, so the event stream still ends when the loop exits on its own.
    event_tx: mpsc::WeakSender<GameEvent>,
    /// Cleared when the connection closes or the client shuts down.
    connected: Arc<AtomicBool>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ClickDuelClient {
    /// Start the client on an already-connected transport.
    ///
    /// The connection is considered open immediately: the first event is
    /// [`GameEvent::Connected`] and the status shows the waiting
    /// presentation until the server says otherwise.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: ClickDuelConfig,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GameEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let mut state = GameState::new();
        state.open();
        let (state_tx, state_rx) = watch::channel(state.clone());
        let state_tx = Arc::new(state_tx);
        let connected = Arc::new(AtomicBool::new(true));
        let weak_event_tx = event_tx.downgrade();

        let game_loop = GameLoop {
            state,
            countdown: CountdownSlot::new(),
            tick_interval: config.tick_interval.max(MIN_TICK_INTERVAL),
            event_tx,
            state_tx: Arc::clone(&state_tx),
            connected: Arc::clone(&connected),
        };
        let task = tokio::spawn(game_loop.run(transport, cmd_rx, shutdown_rx));

        let client = Self {
            cmd_tx,
            state_rx,
            state_tx,
            event_tx: weak_event_tx,
            connected,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    /// Connect to `config.endpoint` over WebSocket and start the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::Timeout`](crate::ClickDuelError::Timeout) if
    /// the handshake exceeds `config.connect_timeout`, or
    /// [`ClickDuelError::Io`](crate::ClickDuelError::Io) if it fails.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(
        config: ClickDuelConfig,
    ) -> crate::error::Result<(Self, mpsc::Receiver<GameEvent>)> {
        let transport = crate::transports::WebSocketTransport::connect_with_timeout(
            &config.endpoint,
            config.connect_timeout,
        )
        .await?;
        Ok(Self::start(transport, config))
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Send one click to the server.
    ///
    /// Returns `true` if the click was queued. While the click action is
    /// disabled (no running match, or the connection is closed) this is a
    /// no-op returning `false`. A click queued just before the match ends is
    /// dropped by the loop instead of being sent.
    pub fn submit_click(&self) -> bool {
        if !self.is_click_enabled() {
            debug!("click ignored: action disabled");
            return false;
        }
        self.cmd_tx.send(ClientMessage::Click).is_ok()
    }

    /// Shut down the client, closing the transport and stopping the loop.
    ///
    /// Afterwards the state is closed exactly as after a server close, and the
    /// event receiver yields a final [`GameEvent::Disconnected`] and then
    /// `None`. This holds even when the loop is stuck and has to be aborted.
    /// Calling this twice is harmless.
    pub async fn shutdown(&mut self) {
        debug!("ClickDuelClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // If the loop does not exit in time, abort it so it cannot detach.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    // Upgrade first: the loop's sender goes away with the task.
                    let events = self.event_tx.upgrade();
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                    self.close_after_abort(events).await;
                }
            }
        }

        self.connected.store(false, Ordering::Release);
    }

    /// Publish the close and deliver `Disconnected` on behalf of an aborted loop.
    async fn close_after_abort(&self, events: Option<mpsc::Sender<GameEvent>>) {
        self.connected.store(false, Ordering::Release);
        self.state_tx.send_modify(|state| {
            state.close();
        });

        let Some(events) = events else {
            return;
        };
        let disconnected = GameEvent::Disconnected {
            reason: Some("client shut down".into()),
        };
        match tokio::time::timeout(self.shutdown_timeout, events.send(disconnected)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("event channel closed, receiver dropped"),
            Err(_) => warn!("event channel full, Disconnected not delivered"),
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Activation state of the click control.
    pub fn is_click_enabled(&self) -> bool {
        self.is_connected() && self.state_rx.borrow().click_enabled()
    }

    pub fn phase(&self) -> Phase {
        self.state_rx.borrow().phase()
    }

    /// Snapshot of the full state.
    pub fn state(&self) -> GameState {
        self.state_rx.borrow().clone()
    }

    /// Render-ready snapshot of the UI.
    pub fn view(&self) -> View {
        self.state_rx.borrow().view()
    }

    /// A receiver that is notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state_rx.clone()
    }
}

impl std::fmt::Debug for ClickDuelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickDuelClient")
            .field("connected", &self.is_connected())
            .field("phase", &self.phase())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ClickDuelClient {
    fn drop(&mut self) {
        // `Drop` cannot await a graceful close; aborting drops the loop future,
        // and with it the transport and any running countdown.
        if let Some(task) = self.task.take() {
            task.abort();
            self.connected.store(false, Ordering::Release);
            self.state_tx.send_modify(|state| {
                state.close();
            });
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// State owned by the background transport loop.
struct GameLoop {
    state: GameState,
    countdown: CountdownSlot,
    tick_interval: Duration,
    event_tx: mpsc::Sender<GameEvent>,
    state_tx: Arc<watch::Sender<GameState>>,
    connected: Arc<AtomicBool>,
}

impl GameLoop {
    /// Exits when:
    /// - the command channel closes (client handle dropped)
    /// - shutdown is requested
    /// - the transport returns `None` (server closed connection)
    /// - a transport error occurs
    async fn run(
        mut self,
        mut transport: impl Transport,
        mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!("transport loop started");
        self.emit(GameEvent::Connected);

        loop {
            tokio::select! {
                // Branch 1: click queued by the handle
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(msg) => {
                            if let Err(reason) = self.send_command(&mut transport, msg).await {
                                self.disconnect(Some(reason)).await;
                                break;
                            }
                        }
                        // Command channel closed: the client handle was dropped.
                        None => {
                            debug!("command channel closed, shutting down transport loop");
                            let _ = transport.close().await;
                            self.disconnect(Some("client shut down".into())).await;
                            break;
                        }
                    }
                }

                // Branch 2: shutdown signal
                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    let _ = transport.close().await;
                    self.disconnect(Some("client shut down".into())).await;
                    break;
                }

                // Branch 3: message from the server
                incoming = transport.recv() => {
                    match incoming {
                        Some(Ok(text)) => {
                            let transition = self.state.apply_json(&text);
                            self.after_transition(transition);
                        }
                        Some(Err(e)) => {
                            error!("transport receive error: {e}");
                            self.disconnect(Some(format!("transport receive error: {e}"))).await;
                            break;
                        }
                        None => {
                            debug!("transport closed by server");
                            self.disconnect(None).await;
                            break;
                        }
                    }
                }

                // Branch 4: local countdown (pends while no match is running)
                () = self.countdown.tick() => {
                    self.on_tick();
                }
            }
        }

        debug!("transport loop exited");
    }

    /// Write a queued command, re-checking enablement against the loop's own
    /// state. Returns the disconnect reason if the transport failed.
    async fn send_command(
        &mut self,
        transport: &mut impl Transport,
        msg: ClientMessage,
    ) -> Result<(), String> {
        match msg {
            ClientMessage::Click if !self.state.click_enabled() => {
                debug!(phase = ?self.state.phase(), "dropping click queued outside a match");
                return Ok(());
            }
            ClientMessage::Click => {}
        }

        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                // Serialization errors are programming bugs; don't kill the loop.
                error!("failed to serialize ClientMessage: {e}");
                return Ok(());
            }
        };
        transport.send(json).await.map_err(|e| {
            error!("transport send error: {e}");
            format!("transport send error: {e}")
        })
    }

    /// Reconcile the countdown with a reducer transition, publish the new
    /// state and emit the matching event.
    fn after_transition(&mut self, transition: Transition) {
        if transition.is_ignored() {
            return;
        }
        match &transition {
            Transition::Started { .. } => {
                if self.state.countdown_active() {
                    self.countdown.acquire(self.tick_interval);
                } else {
                    self.countdown.release();
                }
            }
            _ if self.state.phase() != Phase::Playing => {
                self.countdown.release();
            }
            _ => {}
        }
        self.publish();
        if let Some(event) = GameEvent::from_transition(transition) {
            self.emit(event);
        }
    }

    fn on_tick(&mut self) {
        if self.state.tick() {
            let remaining_secs = self
                .state
                .session()
                .map_or(0, |session| session.time_remaining());
            self.publish();
            self.emit(GameEvent::CountdownTick { remaining_secs });
        }
        if !self.state.countdown_active() {
            self.countdown.release();
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    /// Emit an event. If the channel is full, log a warning and drop the
    /// event to avoid blocking the loop.
    fn emit(&self, event: GameEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Close the state, stop the countdown and deliver `Disconnected`.
    ///
    /// Uses `send().await` instead of `try_send` because `Disconnected` is the
    /// last event and must never be dropped.
    async fn disconnect(&mut self, reason: Option<String>) {
        self.state.close();
        self.countdown.release();
        self.connected.store(false, Ordering::Release);
        self.publish();
        if self
            .event_tx
            .send(GameEvent::Disconnected { reason })
            .await
            .is_err()
        {
            debug!("event channel closed, receiver dropped");
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
    use crate::error::ClickDuelError;
    use crate::protocol::{MatchResult, ServerMessage};
    use crate::state::ConnectionState;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replays scripted responses, records sent messages, then hangs.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, ClickDuelError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, ClickDuelError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClickDuelError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClickDuelError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ClickDuelError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn config() -> ClickDuelConfig {
        ClickDuelConfig::new(Endpoint::from_origin("http://localhost:8000").unwrap())
    }

    fn msg(json: &str) -> Option<std::result::Result<String, ClickDuelError>> {
        Some(Ok(json.to_string()))
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn config_defaults() {
        let config = config();
        assert_eq!(config.endpoint.as_str(), "ws://localhost:8000/ws");
        assert_eq!(config.event_channel_capacity, 64);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_clamps() {
        let config = config()
            .with_event_channel_capacity(0)
            .with_tick_interval(Duration::ZERO)
            .with_shutdown_timeout(Duration::from_millis(5));
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.tick_interval, MIN_TICK_INTERVAL);
        assert_eq!(config.shutdown_timeout, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn connected_is_first_event_and_status_is_waiting() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        assert_eq!(events.recv().await.unwrap(), GameEvent::Connected);
        assert!(client.is_connected());
        assert_eq!(client.view().status, "Connected. Waiting for opponent…");
        assert!(!client.is_click_enabled());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn scripted_match_ends_with_final_scores() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            msg(r#"{"type":"waiting"}"#),
            msg(r#"{"type":"start","duration":10}"#),
            msg(r#"{"type":"score_update","you":3,"opponent":1}"#),
            msg(r#"{"type":"end","result":"win","your_score":5,"opponent_score":2}"#),
        ]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        assert_eq!(events.recv().await.unwrap(), GameEvent::Connected);
        assert_eq!(events.recv().await.unwrap(), GameEvent::Waiting);
        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::MatchStarted { duration_secs: 10 }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::ScoreUpdated { you: 3, opponent: 1 }
        );
        let ended = events.recv().await.unwrap();
        assert!(matches!(ended, GameEvent::MatchEnded(_)), "got {ended:?}");

        let view = client.view();
        assert_eq!(view.result_text.as_deref(), Some("You Win! (5 : 2)"));
        assert!(!view.click_enabled);
        assert_eq!(client.phase(), Phase::Finished);

        // Disabled click is a no-op.
        assert!(!client.submit_click());
        tokio::task::yield_now().await;
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_messages_do_not_disconnect() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            msg("not json"),
            msg(r#"{"type":"mystery"}"#),
            msg(r#"{"type":"online_count","count":42}"#),
        ]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        assert_eq!(events.recv().await.unwrap(), GameEvent::Connected);
        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::OnlineCount { count: 42 }
        );
        assert!(client.is_connected());
        assert_eq!(client.phase(), Phase::Idle);
        assert_eq!(client.view().online_count, Some(42));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn click_while_playing_is_sent() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![msg(r#"{"type":"start","duration":10}"#)]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted

        assert!(client.is_click_enabled());
        assert!(client.submit_click());
        assert!(client.submit_click());

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 2);
            assert!(messages.iter().all(|m| m == r#"{"type":"click"}"#));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_close_while_playing_disables_click() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            msg(r#"{"type":"start","duration":10}"#),
            msg(r#"{"type":"score_update","you":2,"opponent":2}"#),
            None,
        ]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted
        let _ = events.recv().await; // ScoreUpdated
        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::Disconnected { reason: None }
        );
        assert!(events.recv().await.is_none());

        assert!(!client.is_connected());
        assert!(!client.is_click_enabled());
        assert!(!client.submit_click());
        let view = client.view();
        assert_eq!(view.status, "Disconnected from server.");
        assert_eq!((view.your_score, view.opponent_score), (2, 2));
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            ClickDuelError::TransportReceive("boom".into()),
        ))]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        let GameEvent::Disconnected { reason } = event else {
            panic!("expected Disconnected, got {event:?}");
        };
        assert!(reason.unwrap().contains("boom"));
        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_emits_disconnected() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(closed.load(Ordering::Relaxed));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown_ends_event_stream() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (client, mut events) = ClickDuelClient::start(transport, config());
        let _ = events.recv().await; // Connected

        drop(client);
        while let Some(_event) = events.recv().await {}
    }

    /// Transport that replays `incoming`, then hangs, and never finishes `close()`.
    struct HangingCloseTransport {
        incoming: VecDeque<String>,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), ClickDuelError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClickDuelError>> {
            match self.incoming.pop_front() {
                Some(text) => Some(Ok(text)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ClickDuelError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingCloseTransport {
            incoming: VecDeque::new(),
            dropped: Arc::clone(&dropped),
        };
        let config = config().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = ClickDuelClient::start(transport, config);
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        assert!(dropped.load(Ordering::Acquire));
        assert!(!client.is_connected());
        assert!(!client.view().click_enabled);
    }

    #[tokio::test]
    async fn aborted_shutdown_during_match_still_closes_state() {
        let transport = HangingCloseTransport {
            incoming: VecDeque::from([r#"{"type":"start","duration":10}"#.to_string()]),
            dropped: Arc::new(AtomicBool::new(false)),
        };
        let config = config().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = ClickDuelClient::start(transport, config);
        assert_eq!(events.recv().await.unwrap(), GameEvent::Connected);
        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::MatchStarted { duration_secs: 10 }
        );
        let mut watch = client.subscribe();

        client.shutdown().await;

        let state = client.state();
        assert_eq!(state.connection(), ConnectionState::Closed);
        assert_eq!(state.phase(), Phase::Playing);
        assert!(!state.click_enabled());
        assert!(!client.is_click_enabled());

        let view = client.view();
        assert_eq!(view.status, "Disconnected from server.");
        assert!(!view.click_enabled);

        let published = watch
            .wait_for(|state| state.connection() == ConnectionState::Closed)
            .await
            .unwrap()
            .clone();
        assert_eq!(published, state);

        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(events.recv().await.is_none());
    }

    // ── Loop-side click gate ────────────────────────────────────────

    fn playing_state() -> GameState {
        let mut state = GameState::new();
        state.open();
        state.apply(&ServerMessage::Start { duration: 10 });
        state
    }

    fn loop_with_state(state: GameState) -> (GameLoop, mpsc::Receiver<GameEvent>) {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (state_tx, _state_rx) = watch::channel(state.clone());
        let game_loop = GameLoop {
            state,
            countdown: CountdownSlot::new(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_tx,
            state_tx: Arc::new(state_tx),
            connected: Arc::new(AtomicBool::new(true)),
        };
        (game_loop, event_rx)
    }

    #[tokio::test]
    async fn loop_writes_click_while_playing() {
        let (mut game_loop, _events) = loop_with_state(playing_state());
        let (mut transport, sent, _closed) = MockTransport::new(vec![]);

        game_loop
            .send_command(&mut transport, ClientMessage::Click)
            .await
            .unwrap();

        assert_eq!(*sent.lock().unwrap(), vec![r#"{"type":"click"}"#.to_string()]);
    }

    #[tokio::test]
    async fn loop_drops_click_queued_before_match_end_or_close() {
        let mut finished = playing_state();
        finished.apply(&ServerMessage::End {
            result: MatchResult::Win,
            your_score: Some(1),
            opponent_score: Some(0),
            reason: None,
        });
        assert_eq!(finished.phase(), Phase::Finished);

        let mut closed = playing_state();
        closed.close();

        for state in [finished, closed] {
            let (mut game_loop, _events) = loop_with_state(state);
            let (mut transport, sent, _closed) = MockTransport::new(vec![]);

            game_loop
                .send_command(&mut transport, ClientMessage::Click)
                .await
                .unwrap();

            assert!(sent.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn full_event_channel_drops_events_but_not_disconnected() {
        let mut incoming = Vec::new();
        for count in 0..20 {
            incoming.push(Some(Ok(format!(
                r#"{{"type":"online_count","count":{count}}}"#
            ))));
        }
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = config().with_event_channel_capacity(1);
        let (mut client, mut events) = ClickDuelClient::start(transport, config);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(event);
        }
        assert!(seen.len() < 22, "expected some events to be dropped");
        assert!(matches!(
            seen.last(),
            Some(GameEvent::Disconnected { reason: None })
        ));
        // State is still exact even though events were dropped.
        assert_eq!(client.state().online_count(), Some(19));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = ClickDuelClient::start(transport, config());
        let _ = events.recv().await; // Connected

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("ClickDuelClient"));
        assert!(debug_str.contains("phase"));

        client.shutdown().await;
    }
}
