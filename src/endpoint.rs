//! Game server endpoint selection.
//!
//! In production the endpoint is derived from the origin the client was
//! served from: same host and port, `wss` when the origin is `https` and `ws`
//! otherwise, path [`GAME_PATH`].

use std::fmt;

use url::Url;

use crate::error::{ClickDuelError, Result};

/// Path of the game socket on the server.
pub const GAME_PATH: &str = "/ws";

/// A validated `ws://` or `wss://` game server URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Derive the endpoint from a page origin such as `https://duel.example.com`.
    ///
    /// Any path, query or fragment on `origin` is discarded, so a full page
    /// URL works too.
    ///
    /// ```
    /// use click_duel_client::Endpoint;
    ///
    /// let endpoint = Endpoint::from_origin("https://duel.example.com").unwrap();
    /// assert_eq!(endpoint.as_str(), "wss://duel.example.com/ws");
    ///
    /// let endpoint = Endpoint::from_origin("http://localhost:8000/index.html").unwrap();
    /// assert_eq!(endpoint.as_str(), "ws://localhost:8000/ws");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::InvalidOrigin`] if `origin` does not parse,
    /// is not `http`/`https`, or has no host.
    pub fn from_origin(origin: &str) -> Result<Self> {
        let parsed = Url::parse(origin).map_err(|e| invalid(origin, e.to_string()))?;
        let scheme = match parsed.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(invalid(origin, format!("unsupported scheme `{other}`"))),
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid(origin, "origin has no host".into()))?;
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let url = Url::parse(&format!("{scheme}://{authority}{GAME_PATH}"))
            .map_err(|e| invalid(origin, e.to_string()))?;
        Ok(Self { url })
    }

    /// Use an explicit `ws://` or `wss://` URL.
    ///
    /// Intended for local development against a server on another host.
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::InvalidOrigin`] if `url` does not parse, is
    /// not a WebSocket URL, or has no host.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| invalid(url, e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(invalid(
                url,
                format!("expected ws or wss scheme, got `{}`", parsed.scheme()),
            ));
        }
        if parsed.host_str().is_none() {
            return Err(invalid(url, "url has no host".into()));
        }
        Ok(Self { url: parsed })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the endpoint uses TLS.
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

fn invalid(origin: &str, reason: String) -> ClickDuelError {
    ClickDuelError::InvalidOrigin {
        origin: origin.to_string(),
        reason,
    }
}

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

    #[test]
    fn secure_origin_yields_wss() {
        let endpoint = Endpoint::from_origin("https://duel.example.com").unwrap();
        assert_eq!(endpoint.as_str(), "wss://duel.example.com/ws");
        assert!(endpoint.is_secure());
    }

    #[test]
    fn insecure_origin_keeps_port() {
        let endpoint = Endpoint::from_origin("http://10.17.38.163:8000").unwrap();
        assert_eq!(endpoint.as_str(), "ws://10.17.38.163:8000/ws");
        assert!(!endpoint.is_secure());
    }

    #[test]
    fn default_port_is_dropped() {
        let endpoint = Endpoint::from_origin("https://example.com:443/").unwrap();
        assert_eq!(endpoint.as_str(), "wss://example.com/ws");
    }

    #[test]
    fn non_default_secure_port_is_kept() {
        let endpoint = Endpoint::from_origin("https://example.com:8443").unwrap();
        assert_eq!(endpoint.as_str(), "wss://example.com:8443/ws");
    }

    #[test]
    fn page_url_path_query_and_fragment_are_discarded() {
        let endpoint =
            Endpoint::from_origin("http://localhost:8000/play/index.html?room=1#top").unwrap();
        assert_eq!(endpoint.as_str(), "ws://localhost:8000/ws");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let endpoint = Endpoint::from_origin("http://[::1]:8000").unwrap();
        assert_eq!(endpoint.as_str(), "ws://[::1]:8000/ws");
    }

    #[test]
    fn rejects_bad_origins() {
        for origin in ["not a url", "ftp://example.com", "file:///tmp/index.html", "ws://x"] {
            let err = Endpoint::from_origin(origin).unwrap_err();
            assert!(
                matches!(err, ClickDuelError::InvalidOrigin { .. }),
                "expected InvalidOrigin for {origin:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn explicit_ws_url_is_accepted_verbatim() {
        let endpoint = Endpoint::from_url("ws://10.0.0.5:8000/ws").unwrap();
        assert_eq!(endpoint.to_string(), "ws://10.0.0.5:8000/ws");
    }

    #[test]
    fn explicit_url_must_be_websocket() {
        let err = Endpoint::from_url("http://localhost:8000/ws").unwrap_err();
        assert!(matches!(err, ClickDuelError::InvalidOrigin { .. }));
    }
}
