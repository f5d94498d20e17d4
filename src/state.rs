//! Connection and match state machine for the Click Duel client.
//!
//! [`GameState`] is a plain, synchronous value. It is driven by three kinds of
//! input and never fails:
//!
//! - connection lifecycle: [`GameState::open`] and [`GameState::close`]
//! - server messages: [`GameState::apply`] / [`GameState::apply_json`]
//! - local countdown ticks: [`GameState::tick`]
//!
//! Messages that are malformed, unknown, or arrive in the wrong phase leave
//! the state untouched and report [`Transition::Ignored`].
//!
//! ```
//! use click_duel_client::protocol::{MatchResult, ServerMessage};
//! use click_duel_client::state::{GameState, Phase};
//!
//! let mut state = GameState::new();
//! state.open();
//! state.apply(&ServerMessage::Start { duration: 10 });
//! state.apply(&ServerMessage::ScoreUpdate { you: 3, opponent: 1 });
//! state.apply(&ServerMessage::End {
//!     result: MatchResult::Win,
//!     your_score: Some(5),
//!     opponent_score: Some(2),
//!     reason: None,
//! });
//!
//! assert_eq!(state.phase(), Phase::Finished);
//! assert!(!state.click_enabled());
//! assert_eq!(state.view().result_text.as_deref(), Some("You Win! (5 : 2)"));
//! ```

use tracing::{debug, warn};

use crate::protocol::{MatchResult, ServerMessage};

/// Lifecycle of the single connection a client owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    /// Terminal. A closed client never reconnects.
    Closed,
}

/// Coarse game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No server message has placed us anywhere yet.
    #[default]
    Idle,
    /// Queued for an opponent.
    Waiting,
    /// A match is running.
    Playing,
    /// The last match ended. Only a new `start` leaves this phase.
    Finished,
}

/// Authoritative outcome of a sealed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub your_score: u32,
    pub opponent_score: u32,
    /// Early-termination reason reported by the server, if any.
    pub reason: Option<String>,
}

/// One match attempt, from `start` to `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    duration_secs: u32,
    time_remaining: u32,
    your_score: u32,
    opponent_score: u32,
    outcome: Option<MatchOutcome>,
}

impl GameSession {
    fn new(duration_secs: u32) -> Self {
        Self {
            duration_secs,
            time_remaining: duration_secs,
            your_score: 0,
            opponent_score: 0,
            outcome: None,
        }
    }

    /// Match length announced by the server.
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Locally estimated seconds left. Cosmetic only.
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// This player's score. Equals the final score once sealed.
    pub fn your_score(&self) -> u32 {
        self.your_score
    }

    /// The opponent's score. Equals the final score once sealed.
    pub fn opponent_score(&self) -> u32 {
        self.opponent_score
    }

    /// The final outcome, present once the server has ended the match.
    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    /// Whether the session has been ended by the server.
    pub fn is_sealed(&self) -> bool {
        self.outcome.is_some()
    }

    fn seal(
        &mut self,
        result: MatchResult,
        your_score: Option<u32>,
        opponent_score: Option<u32>,
        reason: Option<String>,
    ) -> MatchOutcome {
        // Final scores are authoritative; fall back to the live ones when the
        // server omits them (opponent disconnect).
        self.your_score = your_score.unwrap_or(self.your_score);
        self.opponent_score = opponent_score.unwrap_or(self.opponent_score);
        let outcome = MatchOutcome {
            result,
            your_score: self.your_score,
            opponent_score: self.opponent_score,
            reason,
        };
        self.outcome = Some(outcome.clone());
        outcome
    }
}

/// What a single input did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    Ignored,
    PresenceChanged { count: u32 },
    Waiting,
    Started { duration_secs: u32 },
    ScoresChanged { you: u32, opponent: u32 },
    Ended(MatchOutcome),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// Full client-side state: connection, presence, phase and current session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    connection: ConnectionState,
    phase: Phase,
    online_count: Option<u32>,
    session: Option<GameSession>,
}

impl GameState {
    /// A fresh state: connecting, idle, no session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last presence count received, if any.
    pub fn online_count(&self) -> Option<u32> {
        self.online_count
    }

    /// The live or most recently sealed session.
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    /// The click control is active iff a match is running on an open connection.
    pub fn click_enabled(&self) -> bool {
        self.phase == Phase::Playing && self.connection == ConnectionState::Open
    }

    /// Whether a local countdown tick would still change anything.
    pub fn countdown_active(&self) -> bool {
        self.click_enabled()
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.time_remaining > 0)
    }

    /// Mark the connection as established. Returns `false` if it was not
    /// `Connecting`.
    pub fn open(&mut self) -> bool {
        if self.connection != ConnectionState::Connecting {
            return false;
        }
        self.connection = ConnectionState::Open;
        debug!("state: connection open");
        true
    }

    /// Mark the connection as closed. The phase and session are frozen where
    /// they are. Idempotent; returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.connection == ConnectionState::Closed {
            return false;
        }
        self.connection = ConnectionState::Closed;
        debug!(phase = ?self.phase, "state: connection closed");
        true
    }

    /// Apply one server message.
    pub fn apply(&mut self, msg: &ServerMessage) -> Transition {
        if self.connection == ConnectionState::Closed {
            debug!("ignoring server message after close");
            return Transition::Ignored;
        }

        match msg {
            ServerMessage::OnlineCount { count } => {
                self.online_count = Some(*count);
                Transition::PresenceChanged { count: *count }
            }
            ServerMessage::Waiting => match self.phase {
                Phase::Idle | Phase::Waiting => {
                    self.phase = Phase::Waiting;
                    debug!("state: waiting for opponent");
                    Transition::Waiting
                }
                Phase::Playing | Phase::Finished => {
                    debug!(phase = ?self.phase, "ignoring out-of-phase waiting");
                    Transition::Ignored
                }
            },
            ServerMessage::Start { duration } => {
                self.session = Some(GameSession::new(*duration));
                self.phase = Phase::Playing;
                debug!(duration, "state: match started");
                Transition::Started {
                    duration_secs: *duration,
                }
            }
            ServerMessage::ScoreUpdate { you, opponent } => match self.live_session() {
                Some(session) => {
                    session.your_score = *you;
                    session.opponent_score = *opponent;
                    Transition::ScoresChanged {
                        you: *you,
                        opponent: *opponent,
                    }
                }
                None => {
                    debug!(phase = ?self.phase, "ignoring out-of-phase score_update");
                    Transition::Ignored
                }
            },
            ServerMessage::End {
                result,
                your_score,
                opponent_score,
                reason,
            } => match self.live_session() {
                Some(session) => {
                    let outcome =
                        session.seal(*result, *your_score, *opponent_score, reason.clone());
                    self.phase = Phase::Finished;
                    debug!(?outcome, "state: match ended");
                    Transition::Ended(outcome)
                }
                None => {
                    debug!(phase = ?self.phase, "ignoring out-of-phase end");
                    Transition::Ignored
                }
            },
            ServerMessage::Unknown => {
                debug!("ignoring unknown server message type");
                Transition::Ignored
            }
        }
    }

    /// Parse and apply one inbound text frame. Malformed payloads are logged
    /// and ignored.
    pub fn apply_json(&mut self, text: &str) -> Transition {
        match ServerMessage::from_json(text) {
            Ok(msg) => self.apply(&msg),
            Err(e) => {
                warn!(len = text.len(), "ignoring malformed server message: {e}");
                Transition::Ignored
            }
        }
    }

    /// Advance the local countdown by one second. Holds at zero and does
    /// nothing outside a running match. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        if !self.countdown_active() {
            return false;
        }
        match self.live_session() {
            Some(session) => {
                session.time_remaining = session.time_remaining.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Render-ready snapshot for the UI.
    pub fn view(&self) -> View {
        let status = match (self.connection, self.phase) {
            (ConnectionState::Closed, _) => "Disconnected from server.",
            (ConnectionState::Connecting, _) => "Connecting…",
            (ConnectionState::Open, Phase::Idle) => "Connected. Waiting for opponent…",
            (ConnectionState::Open, Phase::Waiting) => "Waiting for opponent…",
            (ConnectionState::Open, Phase::Playing) => "Game started!",
            (ConnectionState::Open, Phase::Finished) => "Game over.",
        };

        let session = self.session.as_ref();
        let result_text = session.and_then(GameSession::outcome).map(|outcome| {
            format!(
                "{} ({} : {})",
                outcome.result.headline(),
                outcome.your_score,
                outcome.opponent_score
            )
        });

        View {
            status,
            online_count: self.online_count,
            countdown: session.map(GameSession::time_remaining),
            your_score: session.map_or(0, GameSession::your_score),
            opponent_score: session.map_or(0, GameSession::opponent_score),
            click_enabled: self.click_enabled(),
            show_game: self.phase == Phase::Playing,
            show_result: self.phase == Phase::Finished && result_text.is_some(),
            result_text,
        }
    }

    /// The session, but only while it may still be mutated.
    fn live_session(&mut self) -> Option<&mut GameSession> {
        if self.phase != Phase::Playing {
            return None;
        }
        self.session.as_mut().filter(|session| !session.is_sealed())
    }
}

/// One-way rendering target derived from [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Status line text.
    pub status: &'static str,
    /// Online-count indicator. `None` until the server reports one.
    pub online_count: Option<u32>,
    /// Countdown display. `None` before the first match.
    pub countdown: Option<u32>,
    pub your_score: u32,
    pub opponent_score: u32,
    /// Activation state of the click control.
    pub click_enabled: bool,
    /// Whether the in-match panel is visible.
    pub show_game: bool,
    /// Whether the result panel is visible.
    pub show_result: bool,
    /// Result panel text, e.g. `"You Win! (5 : 2)"`.
    pub result_text: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────────

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

    fn open_state() -> GameState {
        let mut state = GameState::new();
        assert!(state.open());
        state
    }

    fn start(duration: u32) -> ServerMessage {
        ServerMessage::Start { duration }
    }

    fn score(you: u32, opponent: u32) -> ServerMessage {
        ServerMessage::ScoreUpdate { you, opponent }
    }

    fn end(result: MatchResult, your_score: u32, opponent_score: u32) -> ServerMessage {
        ServerMessage::End {
            result,
            your_score: Some(your_score),
            opponent_score: Some(opponent_score),
            reason: None,
        }
    }

    #[test]
    fn new_state_is_connecting_and_idle() {
        let state = GameState::new();
        assert_eq!(state.connection(), ConnectionState::Connecting);
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.session().is_none());
        assert!(!state.click_enabled());
        assert_eq!(state.view().status, "Connecting…");
    }

    #[test]
    fn open_shows_waiting_presentation_without_session() {
        let state = open_state();
        let view = state.view();
        assert_eq!(view.status, "Connected. Waiting for opponent…");
        assert!(state.session().is_none());
        assert!(!view.click_enabled);
        assert!(!view.show_game);
        assert!(!view.show_result);
    }

    #[test]
    fn open_is_only_valid_from_connecting() {
        let mut state = open_state();
        assert!(!state.open());
        state.close();
        assert!(!state.open());
        assert_eq!(state.connection(), ConnectionState::Closed);
    }

    #[test]
    fn win_scenario_freezes_final_scores() {
        let mut state = open_state();
        assert_eq!(
            state.apply(&start(10)),
            Transition::Started { duration_secs: 10 }
        );
        assert_eq!(
            state.apply(&score(3, 1)),
            Transition::ScoresChanged { you: 3, opponent: 1 }
        );
        let transition = state.apply(&end(MatchResult::Win, 5, 2));
        assert!(matches!(transition, Transition::Ended(_)));

        let view = state.view();
        assert_eq!(state.phase(), Phase::Finished);
        assert_eq!(view.result_text.as_deref(), Some("You Win! (5 : 2)"));
        assert_eq!((view.your_score, view.opponent_score), (5, 2));
        assert!(!view.click_enabled);
        assert!(view.show_result);
        assert!(!view.show_game);
        assert!(!state.countdown_active());
    }

    #[test]
    fn end_overrides_live_scores_even_when_lower() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&score(9, 9));
        state.apply(&end(MatchResult::Draw, 7, 7));
        let session = state.session().unwrap();
        assert_eq!((session.your_score(), session.opponent_score()), (7, 7));
        assert_eq!(state.view().result_text.as_deref(), Some("Draw (7 : 7)"));
    }

    #[test]
    fn end_without_scores_keeps_last_known_scores() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&score(4, 6));
        let transition = state.apply(&ServerMessage::End {
            result: MatchResult::Win,
            your_score: None,
            opponent_score: None,
            reason: Some("opponent_disconnected".into()),
        });
        let Transition::Ended(outcome) = transition else {
            panic!("expected Ended, got {transition:?}");
        };
        assert_eq!(outcome.your_score, 4);
        assert_eq!(outcome.opponent_score, 6);
        assert_eq!(outcome.reason.as_deref(), Some("opponent_disconnected"));
        assert_eq!(state.view().result_text.as_deref(), Some("You Win! (4 : 6)"));
    }

    #[test]
    fn score_update_outside_playing_is_ignored() {
        let mut state = open_state();
        assert_eq!(state.apply(&score(1, 1)), Transition::Ignored);

        state.apply(&ServerMessage::Waiting);
        let before = state.clone();
        assert_eq!(state.apply(&score(2, 2)), Transition::Ignored);
        assert_eq!(state, before);

        state.apply(&start(10));
        state.apply(&end(MatchResult::Lose, 1, 3));
        let before = state.clone();
        assert_eq!(state.apply(&score(8, 8)), Transition::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn end_outside_playing_is_ignored() {
        let mut state = open_state();
        assert_eq!(state.apply(&end(MatchResult::Win, 1, 0)), Transition::Ignored);
        assert_eq!(state.phase(), Phase::Idle);

        state.apply(&start(10));
        state.apply(&end(MatchResult::Win, 1, 0));
        let before = state.clone();
        assert_eq!(state.apply(&end(MatchResult::Lose, 0, 9)), Transition::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn waiting_only_moves_from_idle_or_waiting() {
        let mut state = open_state();
        assert_eq!(state.apply(&ServerMessage::Waiting), Transition::Waiting);
        assert_eq!(state.apply(&ServerMessage::Waiting), Transition::Waiting);
        assert_eq!(state.view().status, "Waiting for opponent…");

        state.apply(&start(10));
        assert_eq!(state.apply(&ServerMessage::Waiting), Transition::Ignored);
        assert_eq!(state.phase(), Phase::Playing);

        state.apply(&end(MatchResult::Win, 1, 0));
        assert_eq!(state.apply(&ServerMessage::Waiting), Transition::Ignored);
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn new_start_supersedes_finished_session() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&score(3, 1));
        state.apply(&end(MatchResult::Win, 5, 2));

        state.apply(&start(15));
        let session = state.session().unwrap();
        assert_eq!(state.phase(), Phase::Playing);
        assert_eq!(session.duration_secs(), 15);
        assert_eq!(session.time_remaining(), 15);
        assert_eq!((session.your_score(), session.opponent_score()), (0, 0));
        assert!(!session.is_sealed());
        assert!(state.click_enabled());
        assert!(state.view().result_text.is_none());
    }

    #[test]
    fn start_while_playing_restarts_session() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&score(2, 2));
        state.tick();
        state.apply(&start(10));
        let session = state.session().unwrap();
        assert_eq!(session.time_remaining(), 10);
        assert_eq!(session.your_score(), 0);
    }

    #[test]
    fn online_count_never_changes_phase() {
        let mut state = open_state();
        let steps = [
            None,
            Some(ServerMessage::Waiting),
            Some(start(10)),
            Some(end(MatchResult::Lose, 0, 1)),
        ];
        for step in steps {
            if let Some(msg) = step {
                state.apply(&msg);
            }
            let mut expected = state.clone();
            expected.online_count = Some(42);

            let transition = state.apply(&ServerMessage::OnlineCount { count: 42 });
            assert_eq!(transition, Transition::PresenceChanged { count: 42 });
            assert_eq!(state, expected);
            assert_eq!(state.view().online_count, Some(42));
        }
    }

    #[test]
    fn malformed_and_unknown_payloads_change_nothing() {
        let mut state = open_state();
        state.apply(&start(10));
        let before = state.clone();
        for text in [
            "not json",
            "{}",
            r#"{"type":"mystery"}"#,
            r#"{"type":"score_update","you":1}"#,
        ] {
            assert_eq!(state.apply_json(text), Transition::Ignored);
            assert_eq!(state, before);
        }
        assert_eq!(state.apply(&ServerMessage::Unknown), Transition::Ignored);
        assert_eq!(state, before);
    }

    /// `io::Write` sink shared with the test body.
    #[derive(Clone, Default)]
    struct LogCapture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn malformed_payload_is_logged_by_length_only() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let payload = format!("HOSTILE-FRAME {}", "x".repeat(10_000));
        let mut state = open_state();
        let transition =
            tracing::subscriber::with_default(subscriber, || state.apply_json(&payload));
        assert_eq!(transition, Transition::Ignored);

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("ignoring malformed server message"), "{logged}");
        assert!(logged.contains(&format!("len={}", payload.len())), "{logged}");
        assert!(!logged.contains("HOSTILE-FRAME"), "{logged}");
        assert!(logged.len() < 1_000);
    }

    #[test]
    fn click_enabled_iff_playing_and_open() {
        let mut state = GameState::new();
        state.apply(&start(10));
        assert_eq!(state.phase(), Phase::Playing);
        assert!(!state.click_enabled(), "still connecting");

        state.open();
        assert!(state.click_enabled());

        state.apply(&end(MatchResult::Win, 1, 0));
        assert!(!state.click_enabled());

        state.apply(&start(10));
        assert!(state.click_enabled());

        state.close();
        assert!(!state.click_enabled());
    }

    #[test]
    fn close_while_playing_freezes_everything() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&score(3, 1));
        state.tick();
        assert!(state.close());
        assert!(!state.close());

        let frozen = state.clone();
        assert_eq!(state.apply(&score(4, 1)), Transition::Ignored);
        assert_eq!(state.apply(&end(MatchResult::Win, 9, 9)), Transition::Ignored);
        assert_eq!(state.apply(&start(10)), Transition::Ignored);
        assert_eq!(
            state.apply(&ServerMessage::OnlineCount { count: 7 }),
            Transition::Ignored
        );
        assert!(!state.tick());
        assert_eq!(state, frozen);

        let view = state.view();
        assert_eq!(view.status, "Disconnected from server.");
        assert!(!view.click_enabled);
        assert_eq!(view.countdown, Some(9));
        assert_eq!((view.your_score, view.opponent_score), (3, 1));
    }

    #[test]
    fn close_after_finish_keeps_result_panel() {
        let mut state = open_state();
        state.apply(&start(10));
        state.apply(&end(MatchResult::Lose, 2, 4));
        state.close();
        let view = state.view();
        assert_eq!(view.status, "Disconnected from server.");
        assert_eq!(view.result_text.as_deref(), Some("You Lose! (2 : 4)"));
        assert!(view.show_result);
    }

    #[test]
    fn tick_counts_down_and_holds_at_zero() {
        let mut state = open_state();
        state.apply(&start(2));
        assert!(state.tick());
        assert_eq!(state.view().countdown, Some(1));
        assert!(state.tick());
        assert_eq!(state.view().countdown, Some(0));
        assert!(!state.countdown_active());
        assert!(!state.tick());
        assert_eq!(state.view().countdown, Some(0));
    }

    #[test]
    fn zero_duration_match_never_ticks() {
        let mut state = open_state();
        state.apply(&start(0));
        assert!(state.click_enabled());
        assert!(!state.countdown_active());
        assert!(!state.tick());
        assert_eq!(state.view().countdown, Some(0));
    }

    #[test]
    fn tick_outside_playing_is_noop() {
        let mut state = open_state();
        assert!(!state.tick());

        state.apply(&start(10));
        state.apply(&end(MatchResult::Win, 1, 0));
        let before = state.clone();
        assert!(!state.tick());
        assert_eq!(state, before);
    }

    #[test]
    fn ticks_and_scores_commute() {
        let mut a = open_state();
        a.apply(&start(10));
        a.tick();
        a.apply(&score(1, 0));

        let mut b = open_state();
        b.apply(&start(10));
        b.apply(&score(1, 0));
        b.tick();

        assert_eq!(a, b);
    }

    #[test]
    fn phase_graph_only_reaches_finished_through_playing() {
        let messages = [
            ServerMessage::Waiting,
            ServerMessage::OnlineCount { count: 1 },
            score(1, 0),
            end(MatchResult::Win, 1, 0),
            ServerMessage::Unknown,
        ];
        let mut state = open_state();
        for msg in &messages {
            state.apply(msg);
            assert_ne!(state.phase(), Phase::Finished);
            assert_ne!(state.phase(), Phase::Playing);
        }
        state.apply(&start(5));
        for msg in &messages {
            let before = state.phase();
            state.apply(msg);
            let after = state.phase();
            assert!(
                before == after || (before == Phase::Playing && after == Phase::Finished),
                "illegal edge {before:?} -> {after:?} on {msg:?}"
            );
        }
        assert_eq!(state.phase(), Phase::Finished);
    }
}
