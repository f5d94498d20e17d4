//! Wire-compatible protocol types for the Click Duel game server.
//!
//! Every message is a JSON object tagged by a `"type"` field, e.g.
//! `{"type":"start","duration":10}`. Integers on the wire are non-negative
//! and modelled as `u32`; a payload that violates this fails to parse and is
//! treated like any other malformed message.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── Enums ───────────────────────────────────────────────────────────

/// Outcome of a finished match, from this player's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Lose,
    Draw,
}

impl MatchResult {
    /// Headline shown in the result panel.
    pub fn headline(self) -> &'static str {
        match self {
            Self::Win => "You Win!",
            Self::Lose => "You Lose!",
            Self::Draw => "Draw",
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One discrete click by the player.
    Click,
}

/// Message types sent from server to client.
///
/// Unknown `type` values deserialize to [`ServerMessage::Unknown`] instead of
/// failing, so the reducer can handle them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Number of players currently connected to the server.
    OnlineCount { count: u32 },
    /// Queued for matchmaking; no opponent yet.
    Waiting,
    /// A match begins now and lasts `duration` seconds.
    Start { duration: u32 },
    /// Live scores for the running match.
    ScoreUpdate { you: u32, opponent: u32 },
    /// The match is over.
    End {
        result: MatchResult,
        /// Final score for this player. Omitted when the opponent dropped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        your_score: Option<u32>,
        /// Final score for the opponent. Omitted when the opponent dropped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opponent_score: Option<u32>,
        /// Why the match ended early, e.g. `"opponent_disconnected"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClickDuelError::Serialization`](crate::ClickDuelError::Serialization)
    /// if the text is not JSON, lacks a `type` field, or a known message has
    /// missing or ill-typed fields.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
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
    use crate::ClickDuelError;

    #[test]
    fn click_serializes_to_bare_type_tag() {
        let json = serde_json::to_string(&ClientMessage::Click).unwrap();
        assert_eq!(json, r#"{"type":"click"}"#);
    }

    #[test]
    fn parses_every_known_server_message() {
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"online_count","count":42}"#).unwrap(),
            ServerMessage::OnlineCount { count: 42 }
        );
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"waiting"}"#).unwrap(),
            ServerMessage::Waiting
        );
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"start","duration":10}"#).unwrap(),
            ServerMessage::Start { duration: 10 }
        );
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"score_update","you":3,"opponent":1}"#).unwrap(),
            ServerMessage::ScoreUpdate { you: 3, opponent: 1 }
        );
        assert_eq!(
            ServerMessage::from_json(
                r#"{"type":"end","result":"win","your_score":5,"opponent_score":2}"#
            )
            .unwrap(),
            ServerMessage::End {
                result: MatchResult::Win,
                your_score: Some(5),
                opponent_score: Some(2),
                reason: None,
            }
        );
    }

    #[test]
    fn end_without_scores_carries_reason() {
        let msg = ServerMessage::from_json(
            r#"{"type":"end","result":"win","reason":"opponent_disconnected"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::End {
                result: MatchResult::Win,
                your_score: None,
                opponent_score: None,
                reason: Some("opponent_disconnected".into()),
            }
        );
    }

    #[test]
    fn unknown_type_maps_to_unknown_variant() {
        let msg = ServerMessage::from_json(r#"{"type":"leaderboard","top":[1,2,3]}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let msg = ServerMessage::from_json(r#"{"type":"waiting","queue_position":2}"#).unwrap();
        assert_eq!(msg, ServerMessage::Waiting);
    }

    #[test]
    fn malformed_payloads_are_serialization_errors() {
        for text in [
            "not json",
            "",
            "[]",
            r#"{"count":3}"#,
            r#"{"type":"start"}"#,
            r#"{"type":"start","duration":-1}"#,
            r#"{"type":"score_update","you":"three","opponent":1}"#,
            r#"{"type":"end","result":"forfeit"}"#,
        ] {
            let err = ServerMessage::from_json(text).unwrap_err();
            assert!(
                matches!(err, ClickDuelError::Serialization(_)),
                "expected Serialization error for {text:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn headlines_match_result() {
        assert_eq!(MatchResult::Win.headline(), "You Win!");
        assert_eq!(MatchResult::Lose.headline(), "You Lose!");
        assert_eq!(MatchResult::Draw.headline(), "Draw");
    }
}
