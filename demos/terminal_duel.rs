//! # Terminal Duel
//!
//! Plays Click Duel from a terminal:
//!
//! 1. Derive the game endpoint from the server origin and connect
//! 2. Wait in the matchmaking queue
//! 3. Press Enter to click while the match is running
//! 4. Print the result, then keep waiting for the next match
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start the game server on localhost:8000, then (in two terminals):
//! cargo run --example terminal_duel
//!
//! # Point at another origin, or bypass derivation with an explicit socket URL:
//! CLICK_DUEL_ORIGIN=https://duel.example.com cargo run --example terminal_duel
//! CLICK_DUEL_URL=ws://10.0.0.5:8000/ws cargo run --example terminal_duel
//! ```

use click_duel_client::{ClickDuelClient, ClickDuelConfig, Endpoint, GameEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Origin used when neither `CLICK_DUEL_URL` nor `CLICK_DUEL_ORIGIN` is set.
const DEFAULT_ORIGIN: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let endpoint = match std::env::var("CLICK_DUEL_URL") {
        Ok(url) => Endpoint::from_url(&url)?,
        Err(_) => {
            let origin =
                std::env::var("CLICK_DUEL_ORIGIN").unwrap_or_else(|_| DEFAULT_ORIGIN.to_string());
            Endpoint::from_origin(&origin)?
        }
    };
    tracing::info!("Connecting to {endpoint}");

    // ── Connect ─────────────────────────────────────────────────────
    let (mut client, mut event_rx) =
        ClickDuelClient::connect(ClickDuelConfig::new(endpoint)).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    GameEvent::Connected | GameEvent::Waiting => {
                        println!("{}", client.view().status);
                    }
                    GameEvent::OnlineCount { count } => {
                        println!("Online: {count}");
                    }
                    GameEvent::MatchStarted { duration_secs } => {
                        println!("Game started! {duration_secs}s on the clock.");
                        println!("Press Enter to click.");
                    }
                    GameEvent::ScoreUpdated { you, opponent } => {
                        println!("You {you} : {opponent} Opponent");
                    }
                    GameEvent::CountdownTick { remaining_secs } => {
                        println!("{remaining_secs}s left");
                    }
                    GameEvent::MatchEnded(outcome) => {
                        if let Some(text) = client.view().result_text {
                            println!("{text}");
                        }
                        if let Some(reason) = outcome.reason {
                            println!("({reason})");
                        }
                    }
                    GameEvent::Disconnected { reason } => {
                        match reason {
                            Some(reason) => tracing::warn!("Disconnected: {reason}"),
                            None => println!("{}", client.view().status),
                        }
                        break;
                    }
                }
            }

            line = stdin.next_line() => {
                match line {
                    Ok(Some(_)) => {
                        if !client.submit_click() {
                            tracing::debug!("click ignored outside a match");
                        }
                    }
                    Ok(None) => {
                        tracing::info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("failed to read stdin: {e}");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}
