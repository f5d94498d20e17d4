//! # Scripted Match Example
//!
//! Plays one full Click Duel match against an in-process fake server, with no
//! network involved. Shows how to implement the [`Transport`] trait over
//! channels, which is also how you would unit-test UI code built on the
//! client.
//!
//! The fake server queues the player, starts a short match, plays an opponent
//! that clicks at a fixed rate, and reports the result when time is up.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_match
//! ```

use std::time::Duration;

use async_trait::async_trait;
use click_duel_client::protocol::{ClientMessage, MatchResult, ServerMessage};
use click_duel_client::{
    ClickDuelClient, ClickDuelConfig, ClickDuelError, Endpoint, GameEvent, Transport,
};
use tokio::sync::mpsc;

/// Match length announced by the fake server.
const MATCH_SECS: u32 = 5;

/// One "second" of game time; shortened so the demo finishes quickly.
const GAME_SECOND: Duration = Duration::from_millis(200);

// ─────────────────────────────────────────────────────────────────────
// Loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of an in-process connection.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: reads what the client sent, writes what the client receives.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClickDuelError> {
        self.tx
            .send(message)
            .map_err(|e| ClickDuelError::TransportSend(e.to_string()))
    }

    /// `None` once the server half is dropped. Cancel-safe because
    /// `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, ClickDuelError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClickDuelError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Fake server
// ─────────────────────────────────────────────────────────────────────

impl LoopbackServer {
    fn push(&self, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => tracing::error!("fake server failed to encode message: {e}"),
        }
    }

    /// Run one match, then hang up.
    async fn run(mut self) {
        self.push(&ServerMessage::OnlineCount { count: 2 });
        self.push(&ServerMessage::Waiting);
        tokio::time::sleep(GAME_SECOND).await;

        self.push(&ServerMessage::Start {
            duration: MATCH_SECS,
        });

        let (mut you, mut opponent) = (0_u32, 0_u32);
        let deadline = tokio::time::sleep(GAME_SECOND * MATCH_SECS);
        tokio::pin!(deadline);
        let mut opponent_clicks = tokio::time::interval(GAME_SECOND / 2);

        loop {
            tokio::select! {
                () = &mut deadline => break,
                _ = opponent_clicks.tick() => {
                    opponent += 1;
                }
                frame = self.rx.recv() => {
                    let Some(frame) = frame else { return };
                    match serde_json::from_str::<ClientMessage>(&frame) {
                        Ok(ClientMessage::Click) => you += 1,
                        Err(e) => {
                            tracing::warn!("fake server ignoring bad frame: {e}");
                            continue;
                        }
                    }
                }
            }
            self.push(&ServerMessage::ScoreUpdate { you, opponent });
        }

        let result = match you.cmp(&opponent) {
            std::cmp::Ordering::Greater => MatchResult::Win,
            std::cmp::Ordering::Less => MatchResult::Lose,
            std::cmp::Ordering::Equal => MatchResult::Draw,
        };
        self.push(&ServerMessage::End {
            result,
            your_score: Some(you),
            opponent_score: Some(opponent),
            reason: None,
        });
        tokio::time::sleep(GAME_SECOND).await;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Player
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    let server_task = tokio::spawn(server.run());

    // The endpoint is not dialled by `start`; it only labels the config.
    let config = ClickDuelConfig::new(Endpoint::from_origin("http://localhost:8000")?)
        .with_tick_interval(GAME_SECOND);
    let (mut client, mut event_rx) = ClickDuelClient::start(transport, config);

    while let Some(event) = event_rx.recv().await {
        match event {
            GameEvent::MatchStarted { duration_secs } => {
                tracing::info!("match started ({duration_secs}s)");
                client.submit_click();
            }
            // Three clicks per game second beats the opponent's two.
            GameEvent::CountdownTick { remaining_secs } => {
                for _ in 0..3 {
                    client.submit_click();
                }
                tracing::info!("{remaining_secs}s left");
            }
            GameEvent::ScoreUpdated { you, opponent } => {
                tracing::debug!("score {you} : {opponent}");
            }
            GameEvent::MatchEnded(_) => {
                let view = client.view();
                println!("{}", view.result_text.unwrap_or_default());
            }
            GameEvent::Disconnected { .. } => {
                println!("{}", client.view().status);
                break;
            }
            other => tracing::info!("{other:?}"),
        }
    }

    client.shutdown().await;
    server_task.await?;
    Ok(())
}
