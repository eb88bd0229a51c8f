//! Timers and computer actions as explicit, generation-stamped events.
//!
//! The engine never sleeps. After each state change the host asks for the
//! next [`ScheduledEvent`], waits `delay_ms`, and hands the event back. Each
//! event carries the [`Generation`] it was planned against, so an event that
//! outlived the state it was planned for is recognised and dropped.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ai::{AutoAction, ComputerPolicy};
use crate::auction::AuctionState;
use crate::constants::{AI_BID_DELAY_MS, AI_TURN_DELAY_MS, AUCTION_TICK_MS};
use crate::settings::Settings;
use crate::state::{GameState, PendingAction};

/// Identity of one settled session state; bumped on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// One second off the active bidder's countdown.
    AuctionCountdown,
    /// End a human player's finished turn.
    AutoEndTurn,
    /// Act for a computer player.
    ComputerAction(AutoAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub kind: TimerKind,
    pub generation: Generation,
    pub delay_ms: u64,
}

impl ScheduledEvent {
    #[must_use]
    pub fn is_stale(&self, current: Generation) -> bool {
        self.generation != current
    }
}

/// The one place that decides whether a computer player must act next.
#[must_use]
pub fn pending_automatic_action(
    state: &GameState,
    auction: Option<&AuctionState>,
    policy: &ComputerPolicy,
) -> Option<AutoAction> {
    if state.is_over() {
        return None;
    }
    if let Some(auction) = auction {
        let bidder = state.players.get(auction.current_bidder()?)?;
        return bidder
            .is_ai
            .then(|| policy.auction_action(state, auction));
    }
    if state.current().is_ai {
        policy.turn_action(state)
    } else {
        None
    }
}

/// Plan the next timed event for the session, if anything should happen on its own.
#[must_use]
pub fn plan_next(
    state: &GameState,
    auction: Option<&AuctionState>,
    policy: &ComputerPolicy,
    settings: &Settings,
    generation: Generation,
) -> Option<ScheduledEvent> {
    if state.is_over() {
        return None;
    }
    let event = |kind, delay_ms| ScheduledEvent {
        kind,
        generation,
        delay_ms,
    };
    if let Some(action) = pending_automatic_action(state, auction, policy) {
        let delay = if auction.is_some() {
            AI_BID_DELAY_MS
        } else {
            AI_TURN_DELAY_MS
        };
        return Some(event(TimerKind::ComputerAction(action), delay));
    }
    if auction.is_some() {
        return Some(event(TimerKind::AuctionCountdown, AUCTION_TICK_MS));
    }
    let finished = state.last_roll.is_some()
        && state.pending == PendingAction::None
        && !state.can_roll();
    (finished && settings.auto_end_turn_ms > 0)
        .then(|| event(TimerKind::AutoEndTurn, settings.auto_end_turn_ms))
}
