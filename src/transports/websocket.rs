//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the game's JSON text messages over a single
//! WebSocket. `ws://` and `wss://` endpoints are both supported; TLS is
//! handled by [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), click_duel_client::ClickDuelError> {
//! use click_duel_client::{Endpoint, Transport, WebSocketTransport};
//!
//! let endpoint = Endpoint::from_origin("http://localhost:8000")?;
//! let mut transport = WebSocketTransport::connect(&endpoint).await?;
//! transport.send(r#"{"type":"click"}"#.to_string()).await?;
//!
//! while let Some(Ok(msg)) = transport.recv().await {
//!     println!("server said: {msg}");
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::endpoint::Endpoint;
use crate::error::ClickDuelError;
use crate::transport::Transport;

/// The underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by one WebSocket connection.
///
/// Text frames are delivered as messages. Binary frames are skipped, control
/// frames are handled by tungstenite, and a close frame ends the stream.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::Io`] if the handshake fails. An underlying
    /// I/O error keeps its [`ErrorKind`](std::io::ErrorKind); anything else
    /// maps to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, ClickDuelError> {
        tracing::debug!(%endpoint, "connecting to game server");

        let (stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| {
                let kind = match &e {
                    tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                    _ => std::io::ErrorKind::Other,
                };
                ClickDuelError::Io(std::io::Error::new(kind, e))
            })?;

        tracing::info!(%endpoint, "connected to game server");
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::Timeout`] if the deadline elapses, or any
    /// error [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Self, ClickDuelError> {
        tokio::time::timeout(timeout, Self::connect(endpoint))
            .await
            .map_err(|_| ClickDuelError::Timeout)?
    }

    /// Wrap a stream that was connected elsewhere (custom TLS, proxies).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ClickDuelError> {
        if self.closed {
            return Err(ClickDuelError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ClickDuelError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClickDuelError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(close)) => {
                    tracing::debug!(?close, "server sent close frame");
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame");
                }
                // Pings are answered by tungstenite; pongs and raw frames carry nothing for us.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(ClickDuelError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), ClickDuelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ClickDuelError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use tokio::net::TcpListener;

    type ServerSide = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket connection on a local port, run `handler` on it,
    /// and return the endpoint to dial.
    async fn game_server<F, Fut>(handler: F) -> Endpoint
    where
        F: FnOnce(ServerSide) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        Endpoint::from_origin(&format!("http://{addr}")).unwrap()
    }

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_bounds<T: Send + std::fmt::Debug>() {}
        assert_bounds::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let endpoint = Endpoint::from_url("ws://127.0.0.1:1/ws").unwrap();
        let err = WebSocketTransport::connect(&endpoint).await.unwrap_err();
        assert!(matches!(err, ClickDuelError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // The kernel completes the TCP handshake, but nobody answers the upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = Endpoint::from_origin(&format!("http://{addr}")).unwrap();

        let err = WebSocketTransport::connect_with_timeout(&endpoint, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClickDuelError::Timeout));
        drop(listener);
    }

    #[tokio::test]
    async fn receives_server_messages_then_none_on_close() {
        let endpoint = game_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"type":"waiting"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"start","duration":10}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&endpoint).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"waiting"}"#
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"start","duration":10}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn binary_frames_are_skipped() {
        let endpoint = game_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xCA, 0xFE].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"online_count","count":3}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&endpoint).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"online_count","count":3}"#
        );
    }

    #[tokio::test]
    async fn click_reaches_the_server() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        let endpoint = game_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&endpoint).await.unwrap();
        transport
            .send(r#"{"type":"click"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(seen_rx.await.unwrap(), r#"{"type":"click"}"#);
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_is_rejected_and_close_is_idempotent() {
        let endpoint =
            game_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await;

        let mut transport = WebSocketTransport::connect(&endpoint).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport
            .send(r#"{"type":"click"}"#.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ClickDuelError::TransportClosed));
    }
}
