#![cfg(feature = "tokio-runtime")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the Click Duel client.
//!
//! Uses the live `MockServer` from `tests/common` to push server messages
//! while the client runs, and verifies state transitions, outbound clicks,
//! countdown behaviour and event delivery.

mod common;

use std::time::Duration;

use click_duel_client::protocol::MatchResult;
use click_duel_client::{
    ClickDuelClient, ClickDuelConfig, ConnectionState, Endpoint, GameEvent, MatchOutcome, Phase,
};
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;

use common::{
    end_json, mock_connection, online_count_json, opponent_left_json, score_json, start_json,
    waiting_json, MockServer,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn config() -> ClickDuelConfig {
    ClickDuelConfig::new(Endpoint::from_origin("http://localhost:8000").unwrap())
}

/// Start a client on a fresh mock connection and consume `Connected`.
async fn start_client() -> (ClickDuelClient, Receiver<GameEvent>, MockServer) {
    start_client_with(config()).await
}

async fn start_client_with(
    config: ClickDuelConfig,
) -> (ClickDuelClient, Receiver<GameEvent>, MockServer) {
    let (transport, server) = mock_connection();
    let (client, mut events) = ClickDuelClient::start(transport, config);
    let ev = next_event(&mut events).await;
    assert_eq!(ev, GameEvent::Connected, "first event should be Connected");
    (client, events, server)
}

/// Next event, failing the test instead of hanging.
async fn next_event(rx: &mut Receiver<GameEvent>) -> GameEvent {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Whether any event arrives within `window`.
async fn quiet_for(rx: &mut Receiver<GameEvent>, window: Duration) -> bool {
    tokio::time::timeout(window, rx.recv()).await.is_err()
}

// ════════════════════════════════════════════════════════════════════
// Match lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_match_ends_with_win_result() {
    let (mut client, mut events, server) = start_client().await;

    server.push(waiting_json());
    assert_eq!(next_event(&mut events).await, GameEvent::Waiting);
    assert_eq!(client.view().status, "Waiting for opponent…");

    server.push(start_json(10));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::MatchStarted { duration_secs: 10 }
    );
    let view = client.view();
    assert_eq!(view.status, "Game started!");
    assert!(view.show_game);
    assert!(view.click_enabled);
    assert_eq!((view.your_score, view.opponent_score), (0, 0));

    server.push(score_json(3, 1));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::ScoreUpdated { you: 3, opponent: 1 }
    );

    server.push(end_json(MatchResult::Win, 5, 2));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::MatchEnded(MatchOutcome {
            result: MatchResult::Win,
            your_score: 5,
            opponent_score: 2,
            reason: None,
        })
    );

    let view = client.view();
    assert_eq!(view.status, "Game over.");
    assert!(view.show_result);
    assert!(!view.show_game);
    assert!(!view.click_enabled);
    assert_eq!(view.result_text.as_deref(), Some("You Win! (5 : 2)"));

    client.shutdown().await;
}

#[tokio::test]
async fn lose_and_draw_results_are_rendered() {
    for (result, you, opponent, text) in [
        (MatchResult::Lose, 3, 7, "You Lose! (3 : 7)"),
        (MatchResult::Draw, 4, 4, "Draw (4 : 4)"),
    ] {
        let (mut client, mut events, server) = start_client().await;
        server.push(start_json(10));
        server.push(end_json(result, you, opponent));
        let _ = next_event(&mut events).await; // MatchStarted
        let _ = next_event(&mut events).await; // MatchEnded

        assert_eq!(client.view().result_text.as_deref(), Some(text));
        client.shutdown().await;
    }
}

#[tokio::test]
async fn opponent_disconnect_ends_match_with_last_known_scores() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    server.push(score_json(4, 2));
    server.push(opponent_left_json());
    let _ = next_event(&mut events).await; // MatchStarted
    let _ = next_event(&mut events).await; // ScoreUpdated

    let ev = next_event(&mut events).await;
    let GameEvent::MatchEnded(outcome) = ev else {
        panic!("expected MatchEnded, got {ev:?}");
    };
    assert_eq!(outcome.result, MatchResult::Win);
    assert_eq!((outcome.your_score, outcome.opponent_score), (4, 2));
    assert_eq!(outcome.reason.as_deref(), Some("opponent_disconnected"));

    assert_eq!(client.view().result_text.as_deref(), Some("You Win! (4 : 2)"));
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn new_start_after_finished_begins_fresh_session() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    server.push(score_json(6, 6));
    server.push(end_json(MatchResult::Draw, 6, 6));
    for _ in 0..3 {
        let _ = next_event(&mut events).await;
    }

    server.push(start_json(10));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::MatchStarted { duration_secs: 10 }
    );

    let view = client.view();
    assert_eq!(client.phase(), Phase::Playing);
    assert_eq!((view.your_score, view.opponent_score), (0, 0));
    assert_eq!(view.countdown, Some(10));
    assert!(!view.show_result);
    assert!(view.result_text.is_none());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Presence and ignored input
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn online_count_updates_in_every_phase() {
    let (mut client, mut events, server) = start_client().await;

    server.push(online_count_json(7));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 7 }
    );
    assert_eq!(client.view().online_count, Some(7));

    server.push(start_json(10));
    server.push(online_count_json(2));
    let _ = next_event(&mut events).await; // MatchStarted
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 2 }
    );
    assert_eq!(client.phase(), Phase::Playing);
    assert_eq!(client.view().online_count, Some(2));

    client.shutdown().await;
}

#[tokio::test]
async fn malformed_and_unknown_messages_are_ignored() {
    let (mut client, mut events, server) = start_client().await;
    let before = client.state();

    server.push("not json at all");
    server.push(r#"{"count":3}"#);
    server.push(r#"{"type":"start","duration":"ten"}"#);
    server.push(r#"{"type":"score_update","you":-1,"opponent":0}"#);
    server.push(r#"{"type":"rematch_offer"}"#);
    server.push(online_count_json(5));

    // Only the valid message produces an event.
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 5 }
    );
    let after = client.state();
    assert_eq!(after.phase(), before.phase());
    assert!(after.session().is_none());
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn out_of_phase_messages_are_ignored() {
    let (mut client, mut events, server) = start_client().await;

    // score_update and end before any match.
    server.push(score_json(9, 9));
    server.push(end_json(MatchResult::Win, 9, 9));
    server.push(online_count_json(1));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 1 }
    );
    assert_eq!(client.phase(), Phase::Idle);

    // waiting while playing.
    server.push(start_json(10));
    server.push(waiting_json());
    server.push(online_count_json(2));
    let _ = next_event(&mut events).await; // MatchStarted
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 2 }
    );
    assert_eq!(client.phase(), Phase::Playing);

    // score_update after end.
    server.push(end_json(MatchResult::Lose, 1, 2));
    server.push(score_json(8, 8));
    server.push(online_count_json(3));
    let _ = next_event(&mut events).await; // MatchEnded
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::OnlineCount { count: 3 }
    );
    let view = client.view();
    assert_eq!((view.your_score, view.opponent_score), (1, 2));
    assert_eq!(view.result_text.as_deref(), Some("You Lose! (1 : 2)"));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Clicks
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn clicks_are_sent_only_while_playing() {
    let (mut client, mut events, server) = start_client().await;

    assert!(!client.is_click_enabled());
    assert!(!client.submit_click());

    server.push(waiting_json());
    let _ = next_event(&mut events).await;
    assert!(!client.submit_click());

    server.push(start_json(10));
    let _ = next_event(&mut events).await;
    assert!(client.is_click_enabled());
    for _ in 0..3 {
        assert!(client.submit_click());
    }

    server.wait_for_clicks(3).await;
    server.push(score_json(3, 0));
    let _ = next_event(&mut events).await;

    server.push(end_json(MatchResult::Win, 3, 0));
    let _ = next_event(&mut events).await;
    assert!(!client.is_click_enabled());
    assert!(!client.submit_click());

    client.shutdown().await;
    assert_eq!(server.clicks(), 3);
    assert_eq!(server.received().len(), 3);
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn server_close_while_playing_freezes_session() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    server.push(score_json(2, 5));
    let _ = next_event(&mut events).await;
    let _ = next_event(&mut events).await;

    server.hang_up();
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::Disconnected { reason: None }
    );
    assert!(events.recv().await.is_none());

    let state = client.state();
    assert_eq!(state.connection(), ConnectionState::Closed);
    assert_eq!(state.phase(), Phase::Playing);

    let view = client.view();
    assert_eq!(view.status, "Disconnected from server.");
    assert!(!view.click_enabled);
    assert_eq!((view.your_score, view.opponent_score), (2, 5));
    assert!(!client.submit_click());

    client.shutdown().await;
    assert_eq!(server.clicks(), 0);
}

#[tokio::test]
async fn transport_error_while_waiting_disconnects() {
    let (mut client, mut events, server) = start_client().await;

    server.push(waiting_json());
    let _ = next_event(&mut events).await;

    server.fail("connection reset");
    let ev = next_event(&mut events).await;
    let GameEvent::Disconnected { reason } = ev else {
        panic!("expected Disconnected, got {ev:?}");
    };
    assert!(reason.unwrap().contains("connection reset"));
    assert!(!client.is_connected());
    assert_eq!(client.view().status, "Disconnected from server.");

    client.shutdown().await;
}

#[tokio::test]
async fn messages_after_close_are_not_applied() {
    let (mut client, mut events, server) = start_client().await;

    server.hang_up();
    server.push(start_json(10));
    let _ = next_event(&mut events).await; // Disconnected
    assert!(events.recv().await.is_none());

    assert_eq!(client.phase(), Phase::Idle);
    assert!(!client.is_click_enabled());

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_transport() {
    let (mut client, mut events, server) = start_client().await;

    client.shutdown().await;

    assert_eq!(
        next_event(&mut events).await,
        GameEvent::Disconnected {
            reason: Some("client shut down".into())
        }
    );
    assert!(server.client_closed());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn subscribers_observe_state_changes() {
    let (mut client, mut events, server) = start_client().await;
    let mut watch = client.subscribe();

    server.push(start_json(10));
    let state = watch
        .wait_for(|state| state.phase() == Phase::Playing)
        .await
        .unwrap()
        .clone();
    assert!(state.click_enabled());
    let _ = next_event(&mut events).await;

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Countdown (virtual time)
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn countdown_ticks_once_per_second_and_holds_at_zero() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(3));
    let _ = next_event(&mut events).await; // MatchStarted
    let started = Instant::now();

    for (n, expected) in [2, 1, 0].into_iter().enumerate() {
        assert_eq!(
            next_event(&mut events).await,
            GameEvent::CountdownTick {
                remaining_secs: expected
            }
        );
        let elapsed = started.elapsed();
        let whole = Duration::from_secs(n as u64 + 1);
        assert!(
            elapsed >= whole && elapsed < whole + Duration::from_millis(100),
            "tick {n} fired after {elapsed:?}"
        );
    }

    // Exhausted: no further ticks, but the match is still live until `end`.
    assert!(quiet_for(&mut events, Duration::from_secs(5)).await);
    let view = client.view();
    assert_eq!(view.countdown, Some(0));
    assert!(view.click_enabled);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn end_cancels_countdown() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    let _ = next_event(&mut events).await;
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::CountdownTick { remaining_secs: 9 }
    );

    server.push(end_json(MatchResult::Win, 1, 0));
    assert!(matches!(
        next_event(&mut events).await,
        GameEvent::MatchEnded(_)
    ));

    assert!(quiet_for(&mut events, Duration::from_secs(5)).await);
    assert_eq!(client.view().countdown, Some(9));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn close_cancels_countdown() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    let _ = next_event(&mut events).await;
    let _ = next_event(&mut events).await; // 9

    server.hang_up();
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::Disconnected { reason: None }
    );
    assert!(events.recv().await.is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.view().countdown, Some(9));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restart_replaces_running_countdown() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(10));
    let _ = next_event(&mut events).await;
    let _ = next_event(&mut events).await; // 9

    tokio::time::sleep(Duration::from_millis(500)).await;
    server.push(start_json(5));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::MatchStarted { duration_secs: 5 }
    );
    let restarted = Instant::now();

    // A full period after the restart, counting down from the new duration.
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::CountdownTick { remaining_secs: 4 }
    );
    assert!(restarted.elapsed() >= Duration::from_secs(1));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn zero_duration_match_never_ticks() {
    let (mut client, mut events, server) = start_client().await;

    server.push(start_json(0));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::MatchStarted { duration_secs: 0 }
    );

    assert!(quiet_for(&mut events, Duration::from_secs(5)).await);
    assert_eq!(client.view().countdown, Some(0));
    assert!(client.is_click_enabled());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn custom_tick_interval_is_honoured() {
    let config = config().with_tick_interval(Duration::from_millis(250));
    let (mut client, mut events, server) = start_client_with(config).await;

    server.push(start_json(2));
    let _ = next_event(&mut events).await;
    let started = Instant::now();
    let _ = next_event(&mut events).await; // 1
    let _ = next_event(&mut events).await; // 0

    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(600),
        "two ticks took {elapsed:?}"
    );

    client.shutdown().await;
}
