//! The byte-pipe seam between the game client and the server.
//!
//! A [`Transport`] moves whole JSON text frames in both directions. It knows
//! nothing about matches or phases; [`GameState`](crate::GameState) does the
//! interpretation. Connecting is done before a transport is handed over:
//! build one yourself and pass it to `ClickDuelClient::start`, or let
//! `ClickDuelClient::connect` dial a WebSocket for you.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use click_duel_client::{ClickDuelError, Transport};
//! use tokio::sync::mpsc;
//!
//! /// Frames arrive from some other task; sends are discarded.
//! struct Inbox(mpsc::UnboundedReceiver<String>);
//!
//! #[async_trait]
//! impl Transport for Inbox {
//!     async fn send(&mut self, _message: String) -> Result<(), ClickDuelError> {
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClickDuelError>> {
//!         self.0.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClickDuelError> {
//!         self.0.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClickDuelError;

/// One open, ordered, text-framed connection to the game server.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is raced against countdown ticks and queued
/// clicks in a `tokio::select!`, so it must be cancel-safe: dropping a pending
/// `recv` future must not swallow a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame.
    ///
    /// # Errors
    ///
    /// [`ClickDuelError::TransportSend`] if the frame could not be written, or
    /// [`ClickDuelError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, message: String) -> Result<(), ClickDuelError>;

    /// Read the next frame.
    ///
    /// `None` means the server closed the connection cleanly; `Some(Err(_))`
    /// means it broke. Either way the client treats the connection as gone.
    async fn recv(&mut self) -> Option<Result<String, ClickDuelError>>;

    /// Close the connection. Calling it more than once is allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails; resources are released
    /// regardless.
    async fn close(&mut self) -> Result<(), ClickDuelError>;
}
