//! Built-in [`Transport`](crate::Transport) implementations.
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! Anything else (in-process channels for tests, other socket libraries) can
//! implement the trait directly; see `demos/scripted_match.rs`.

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;
