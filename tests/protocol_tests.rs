#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Click Duel protocol.
//!
//! Fixtures are written exactly as the game server emits them (including
//! Python's `", "` separators), so a change to the serde attributes that
//! breaks compatibility fails here.

use click_duel_client::protocol::{ClientMessage, MatchResult, ServerMessage};
use click_duel_client::ClickDuelError;
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Server → client fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_fixtures_parse() {
    let cases = [
        (
            r#"{"type": "online_count", "count": 12}"#,
            ServerMessage::OnlineCount { count: 12 },
        ),
        (r#"{"type": "waiting"}"#, ServerMessage::Waiting),
        (
            r#"{"type": "start", "duration": 10}"#,
            ServerMessage::Start { duration: 10 },
        ),
        (
            r#"{"type": "score_update", "you": 7, "opponent": 3}"#,
            ServerMessage::ScoreUpdate { you: 7, opponent: 3 },
        ),
        (
            r#"{"type": "end", "result": "lose", "your_score": 3, "opponent_score": 7}"#,
            ServerMessage::End {
                result: MatchResult::Lose,
                your_score: Some(3),
                opponent_score: Some(7),
                reason: None,
            },
        ),
        (
            r#"{"type": "end", "result": "win", "reason": "opponent_disconnected"}"#,
            ServerMessage::End {
                result: MatchResult::Win,
                your_score: None,
                opponent_score: None,
                reason: Some("opponent_disconnected".into()),
            },
        ),
    ];

    for (json, expected) in cases {
        let parsed = ServerMessage::from_json(json)
            .unwrap_or_else(|e| panic!("failed to parse {json}: {e}"));
        assert_eq!(parsed, expected, "fixture {json}");
    }
}

#[test]
fn field_order_does_not_matter() {
    let parsed = ServerMessage::from_json(r#"{"opponent": 1, "you": 2, "type": "score_update"}"#)
        .unwrap();
    assert_eq!(parsed, ServerMessage::ScoreUpdate { you: 2, opponent: 1 });
}

#[test]
fn extra_fields_are_tolerated() {
    let parsed =
        ServerMessage::from_json(r#"{"type": "start", "duration": 10, "mode": "ranked"}"#)
            .unwrap();
    assert_eq!(parsed, ServerMessage::Start { duration: 10 });
}

#[test]
fn unknown_types_map_to_unknown() {
    for json in [
        r#"{"type": "chat", "text": "gg"}"#,
        r#"{"type": "Start", "duration": 10}"#,
        r#"{"type": ""}"#,
    ] {
        assert_eq!(
            ServerMessage::from_json(json).unwrap(),
            ServerMessage::Unknown,
            "{json}"
        );
    }
}

#[test]
fn malformed_frames_are_serialization_errors() {
    for json in [
        "",
        "click",
        "[]",
        r#"{"duration": 10}"#,
        r#"{"type": "start"}"#,
        r#"{"type": "start", "duration": -1}"#,
        r#"{"type": "start", "duration": 1.5}"#,
        r#"{"type": "score_update", "you": 1}"#,
        r#"{"type": "online_count", "count": "many"}"#,
        r#"{"type": "end", "result": "victory"}"#,
        r#"{"type": "end"}"#,
    ] {
        let err = ServerMessage::from_json(json).unwrap_err();
        assert!(
            matches!(err, ClickDuelError::Serialization(_)),
            "expected Serialization error for {json:?}, got {err:?}"
        );
    }
}

#[test]
fn end_serializes_without_absent_fields() {
    let value = serde_json::to_value(ServerMessage::End {
        result: MatchResult::Draw,
        your_score: None,
        opponent_score: None,
        reason: None,
    })
    .unwrap();
    assert_eq!(value, json!({"type": "end", "result": "draw"}));
}

// ════════════════════════════════════════════════════════════════════
// Client → server
// ════════════════════════════════════════════════════════════════════

#[test]
fn click_is_a_bare_type_tag() {
    let value = serde_json::to_value(ClientMessage::Click).unwrap();
    assert_eq!(value, json!({"type": "click"}));
}

#[test]
fn click_round_trips_from_server_view() {
    let parsed: ClientMessage = serde_json::from_str(r#"{"type": "click"}"#).unwrap();
    assert_eq!(parsed, ClientMessage::Click);
}
