#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Click Duel client integration tests.
//!
//! Provides a channel-based [`MockTransport`] driven live by a [`MockServer`]
//! handle, plus helpers that build server JSON the way the game server sends
//! it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use click_duel_client::protocol::{MatchResult, ServerMessage};
use click_duel_client::{ClickDuelError, Transport};
use tokio::sync::mpsc;

type Incoming = Option<Result<String, ClickDuelError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Client side of the in-process connection.
///
/// `recv()` yields whatever the paired [`MockServer`] pushes, in order. Once
/// the server handle is dropped it hangs forever, so the transport loop stays
/// alive until shutdown.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ClickDuelError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClickDuelError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClickDuelError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockServer ──────────────────────────────────────────────────────

/// Server side of the in-process connection.
pub struct MockServer {
    tx: mpsc::UnboundedSender<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, json: impl Into<String>) {
        let _ = self.tx.send(Some(Ok(json.into())));
    }

    /// Close the connection cleanly from the server side.
    pub fn hang_up(&self) {
        let _ = self.tx.send(None);
    }

    /// Make the next `recv()` fail with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .tx
            .send(Some(Err(ClickDuelError::TransportReceive(reason.into()))));
    }

    /// Every frame the client has sent so far.
    pub fn received(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of click messages the client has sent so far.
    pub fn clicks(&self) -> usize {
        self.received()
            .iter()
            .filter(|msg| msg.as_str() == r#"{"type":"click"}"#)
            .count()
    }

    /// Wait until the client has sent at least `n` clicks.
    pub async fn wait_for_clicks(&self, n: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.clicks() < n {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for clicks");
    }

    /// Whether the client called `close()` on its transport.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Create a connected transport/server pair.
pub fn mock_connection() -> (MockTransport, MockServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        incoming: rx,
        sent: Arc::clone(&sent),
        closed: Arc::clone(&closed),
    };
    let server = MockServer { tx, sent, closed };
    (transport, server)
}

// ── JSON helper functions ───────────────────────────────────────────

fn to_json(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).expect("server message serialization")
}

pub fn online_count_json(count: u32) -> String {
    to_json(&ServerMessage::OnlineCount { count })
}

pub fn waiting_json() -> String {
    to_json(&ServerMessage::Waiting)
}

pub fn start_json(duration: u32) -> String {
    to_json(&ServerMessage::Start { duration })
}

pub fn score_json(you: u32, opponent: u32) -> String {
    to_json(&ServerMessage::ScoreUpdate { you, opponent })
}

/// A regular end of match with final scores.
pub fn end_json(result: MatchResult, your_score: u32, opponent_score: u32) -> String {
    to_json(&ServerMessage::End {
        result,
        your_score: Some(your_score),
        opponent_score: Some(opponent_score),
        reason: None,
    })
}

/// The end message sent to the remaining player when the opponent drops.
pub fn opponent_left_json() -> String {
    r#"{"type":"end","result":"win","reason":"opponent_disconnected"}"#.to_string()
}
