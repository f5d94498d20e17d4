//! # Click Duel Client
//!
//! Client-side state machine for Click Duel, a two-player real-time clicking
//! game played over a persistent WebSocket connection.
//!
//! The server is authoritative for matchmaking, scores and results. This crate
//! tracks the connection, reduces server messages into a game phase, runs the
//! local countdown while a match is in progress and sends clicks.
//!
//! ## Layout
//!
//! - [`state`]: the synchronous reducer ([`GameState`]) and its render target ([`View`])
//! - [`protocol`]: wire messages ([`ServerMessage`], [`ClientMessage`])
//! - [`ClickDuelClient`]: async handle that drives a [`Transport`] in a background task
//! - [`WebSocketTransport`]: the default transport (`transport-websocket` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), click_duel_client::ClickDuelError> {
//! use click_duel_client::{ClickDuelClient, ClickDuelConfig, Endpoint, GameEvent};
//!
//! let endpoint = Endpoint::from_origin("http://localhost:8000")?;
//! let (client, mut events) = ClickDuelClient::connect(ClickDuelConfig::new(endpoint)).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let GameEvent::MatchStarted { .. } = event {
//!         client.submit_click();
//!     }
//!     println!("{}", client.view().status);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "tokio-runtime")]
pub mod client;
#[cfg(feature = "tokio-runtime")]
pub mod countdown;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod transports;

#[cfg(feature = "tokio-runtime")]
pub use client::{ClickDuelClient, ClickDuelConfig};
pub use endpoint::Endpoint;
pub use error::ClickDuelError;
pub use event::GameEvent;
pub use protocol::{ClientMessage, MatchResult, ServerMessage};
pub use state::{ConnectionState, GameState, MatchOutcome, Phase, View};
pub use transport::Transport;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
