//! Scoped local countdown.
//!
//! The countdown is the client's only cancellable resource. It is acquired
//! when a match starts and released on every path out of the running match
//! (server `end`, countdown exhausted, connection closed). Release is
//! idempotent.
//!
//! The countdown only produces tick *signals*; the decrement itself is
//! [`GameState::tick`](crate::state::GameState::tick), which re-checks the
//! phase, so a tick that races an `end` message is harmless.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Smallest accepted tick period. `tokio::time::interval` rejects zero.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// A running countdown: one tick per period, the first one a full period
/// after it was started.
#[derive(Debug)]
pub struct Countdown {
    interval: Interval,
}

impl Countdown {
    /// Start ticking every `period`. Periods below [`MIN_TICK_INTERVAL`] are
    /// clamped.
    pub fn start(period: Duration) -> Self {
        let period = period.max(MIN_TICK_INTERVAL);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // A stalled loop must not replay a burst of ticks afterwards.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next tick. Cancel-safe.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Holds at most one [`Countdown`].
///
/// While empty, [`tick`](CountdownSlot::tick) never completes, so the slot can
/// sit in a `tokio::select!` branch unconditionally.
#[derive(Debug, Default)]
pub struct CountdownSlot {
    active: Option<Countdown>,
}

impl CountdownSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown, replacing any running one.
    pub fn acquire(&mut self, period: Duration) {
        if self.active.replace(Countdown::start(period)).is_some() {
            debug!("countdown: replaced running countdown");
        } else {
            debug!("countdown: started");
        }
    }

    /// Stop the running countdown, if any. Returns whether one was running.
    pub fn release(&mut self) -> bool {
        let released = self.active.take().is_some();
        if released {
            debug!("countdown: stopped");
        }
        released
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Wait for the next tick of the running countdown. Pends forever while
    /// the slot is empty. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.active.as_mut() {
            Some(countdown) => countdown.tick().await,
            None => std::future::pending().await,
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

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_after_one_period() {
        let started = Instant::now();
        let mut countdown = Countdown::start(Duration::from_secs(1));
        countdown.tick().await;
        let first = started.elapsed();
        assert!(first >= Duration::from_secs(1) && first < Duration::from_millis(1100));
        countdown.tick().await;
        let second = started.elapsed();
        assert!(second >= Duration::from_secs(2) && second < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped() {
        let mut countdown = Countdown::start(Duration::ZERO);
        countdown.tick().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_slot_never_ticks() {
        let mut slot = CountdownSlot::new();
        let result = tokio::time::timeout(Duration::from_secs(60), slot.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn released_slot_stops_ticking() {
        let mut slot = CountdownSlot::new();
        slot.acquire(Duration::from_secs(1));
        assert!(slot.is_active());
        slot.tick().await;

        assert!(slot.release());
        assert!(!slot.is_active());
        let result = tokio::time::timeout(Duration::from_secs(5), slot.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent() {
        let mut slot = CountdownSlot::new();
        assert!(!slot.release());
        slot.acquire(Duration::from_secs(1));
        assert!(slot.release());
        assert!(!slot.release());
    }

    #[tokio::test(start_paused = true)]
    async fn reacquire_restarts_the_period() {
        let mut slot = CountdownSlot::new();
        slot.acquire(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(900)).await;

        let restarted = Instant::now();
        slot.acquire(Duration::from_secs(1));
        slot.tick().await;
        assert!(restarted.elapsed() >= Duration::from_secs(1));
    }
}
