//! Events emitted by [`ClickDuelClient`](crate::ClickDuelClient).
//!
//! Every state change the transport loop makes is mirrored as a
//! [`GameEvent`] on the bounded event channel, in the order it was applied.

use crate::state::{MatchOutcome, Transition};

/// A change the embedding UI may want to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Synthetic: the transport loop started on an open connection.
    Connected,
    /// Presence indicator changed.
    OnlineCount { count: u32 },
    /// Queued for an opponent.
    Waiting,
    /// A new match started.
    MatchStarted { duration_secs: u32 },
    /// Live scores changed.
    ScoreUpdated { you: u32, opponent: u32 },
    /// The local countdown advanced.
    CountdownTick { remaining_secs: u32 },
    /// The server ended the match. Scores are final.
    MatchEnded(MatchOutcome),
    /// Synthetic: the connection is closed for good. Always the last event.
    ///
    /// Dropping the client without calling `shutdown` aborts the loop, which
    /// may end the stream without it.
    Disconnected {
        /// `None` when the server closed the connection cleanly.
        reason: Option<String>,
    },
}

impl GameEvent {
    /// The event mirroring a reducer transition, if it changed anything.
    pub fn from_transition(transition: Transition) -> Option<Self> {
        match transition {
            Transition::Ignored => None,
            Transition::PresenceChanged { count } => Some(Self::OnlineCount { count }),
            Transition::Waiting => Some(Self::Waiting),
            Transition::Started { duration_secs } => Some(Self::MatchStarted { duration_secs }),
            Transition::ScoresChanged { you, opponent } => {
                Some(Self::ScoreUpdated { you, opponent })
            }
            Transition::Ended(outcome) => Some(Self::MatchEnded(outcome)),
        }
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
    use crate::protocol::MatchResult;

    #[test]
    fn ignored_transition_has_no_event() {
        assert_eq!(GameEvent::from_transition(Transition::Ignored), None);
    }

    #[test]
    fn ended_transition_carries_outcome() {
        let outcome = MatchOutcome {
            result: MatchResult::Draw,
            your_score: 4,
            opponent_score: 4,
            reason: None,
        };
        assert_eq!(
            GameEvent::from_transition(Transition::Ended(outcome.clone())),
            Some(GameEvent::MatchEnded(outcome))
        );
    }
}
