//! Error types for the Click Duel client.

use thiserror::Error;

/// Errors that can occur at the fallible edges of the Click Duel client.
///
/// The game state machine itself never fails: malformed or out-of-phase
/// server messages are ignored. These errors only surface while connecting,
/// deriving the endpoint, or moving text through a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum ClickDuelError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The page origin could not be turned into a game server endpoint.
    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin {
        /// The rejected origin or URL, as given.
        origin: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Connecting to the server timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Click Duel client operations.
pub type Result<T> = std::result::Result<T, ClickDuelError>;
