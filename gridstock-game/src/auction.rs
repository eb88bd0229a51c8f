//! Timed multi-bidder auctions for declined or repossessed tiles.
//!
//! An auction lives beside the [`GameState`] rather than inside it. Every step
//! function mutates the auction and reports whether it is still open; once it
//! reports [`AuctionStatus::Closed`] the caller drops it.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

use crate::constants::{AUCTION_SECONDS, BID_INCREMENT, MAX_PLAYERS, MIN_OPENING_BID};
use crate::economy::{PaymentOutcome, apply_payment};
use crate::state::{GameState, PendingAction, PropertyState};

/// Why a tile went to auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AuctionReason {
    /// The player who landed on it declined (or could not afford) the purchase.
    #[default]
    Declined,
    /// Repossessed from a bankrupt player.
    Bankruptcy,
}

impl fmt::Display for AuctionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declined => "player skip",
            Self::Bankruptcy => "bankruptcy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionState {
    pub tile_index: usize,
    /// Eligible bidders in seat order, fixed when the auction opens.
    pub participants: SmallVec<[usize; MAX_PLAYERS]>,
    /// Index into `participants`.
    pub active_bidder: usize,
    pub high_bid: i64,
    pub high_bidder: Option<usize>,
    pub passes: BTreeSet<usize>,
    /// Seconds left for the active bidder.
    pub timer: u32,
    #[serde(default)]
    pub reason: AuctionReason,
}

/// How a closed auction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionResult {
    Sold {
        tile_index: usize,
        winner: usize,
        price: i64,
    },
    /// Nobody bid; the tile stays with the bank.
    NoBids { tile_index: usize },
    /// The winner could no longer cover their bid; the tile stays with the bank.
    WinnerShort {
        tile_index: usize,
        winner: usize,
        price: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStatus {
    Open,
    Closed(AuctionResult),
}

/// Open an auction for `tile_index`, or return `None` when nobody can bid.
///
/// Any pending buy decision is cleared either way; the tile stays unowned if
/// the auction never starts.
pub fn start_auction(
    state: &mut GameState,
    tile_index: usize,
    reason: AuctionReason,
) -> Option<AuctionState> {
    state.pending = PendingAction::None;
    let participants: SmallVec<[usize; MAX_PLAYERS]> = state
        .players
        .iter()
        .filter(|p| !p.bankrupt && p.cash > 0)
        .map(|p| p.id)
        .collect();
    let label = state.tile_label(tile_index).to_owned();
    if participants.is_empty() {
        state.push_log(format!("No eligible bidders for {label}; it stays with the bank"));
        log::info!("auction for tile {tile_index} skipped: no eligible bidders");
        return None;
    }
    state.push_log(format!("Auction started for {label} ({reason})"));
    log::info!(
        "auction opened for tile {tile_index} with {} bidders",
        participants.len()
    );
    Some(AuctionState {
        tile_index,
        participants,
        active_bidder: 0,
        high_bid: 0,
        high_bidder: None,
        passes: BTreeSet::new(),
        timer: AUCTION_SECONDS,
        reason,
    })
}

impl AuctionState {
    /// Smallest acceptable bid right now.
    #[must_use]
    pub fn next_bid(&self) -> i64 {
        MIN_OPENING_BID.max(self.high_bid + BID_INCREMENT)
    }

    /// Player id whose turn it is to bid, or `None` if the floor points past the participants.
    #[must_use]
    pub fn current_bidder(&self) -> Option<usize> {
        self.participants.get(self.active_bidder).copied()
    }

    fn still_in(&self, state: &GameState, id: usize) -> bool {
        !self.passes.contains(&id)
            && state
                .players
                .get(id)
                .is_some_and(|p| !p.bankrupt && p.cash > 0)
    }

    /// Participants who have neither passed nor dropped out.
    #[must_use]
    pub fn active_bidders(&self, state: &GameState) -> Vec<usize> {
        self.participants
            .iter()
            .copied()
            .filter(|&id| self.still_in(state, id))
            .collect()
    }

    fn advance_bidder(&mut self, state: &GameState) {
        let count = self.participants.len();
        if count == 0 {
            return;
        }
        let mut next = (self.active_bidder + 1) % count;
        for _ in 0..count {
            if self.still_in(state, self.participants[next]) {
                break;
            }
            next = (next + 1) % count;
        }
        self.active_bidder = next;
        self.timer = AUCTION_SECONDS;
    }

    fn drop_current(&mut self, state: &GameState) {
        if let Some(bidder) = self.current_bidder() {
            self.passes.insert(bidder);
        }
        self.advance_bidder(state);
    }

    /// The active bidder raises by one increment, or is passed if they cannot afford it.
    pub fn bid(&mut self, state: &mut GameState) -> AuctionStatus {
        let Some(bidder) = self.current_bidder() else {
            return self.settle(state);
        };
        let amount = self.next_bid();
        let cash = state.players.get(bidder).map_or(0, |p| p.cash);
        if cash < amount {
            log::debug!("bidder {bidder} cannot cover {amount}; auto-pass");
            self.drop_current(state);
        } else {
            self.high_bid = amount;
            self.high_bidder = Some(bidder);
            self.advance_bidder(state);
        }
        self.settle(state)
    }

    /// The active bidder drops out.
    pub fn pass(&mut self, state: &mut GameState) -> AuctionStatus {
        self.drop_current(state);
        self.settle(state)
    }

    /// Run the active bidder's countdown; running out is a pass.
    pub fn tick(&mut self, state: &mut GameState, seconds: u32) -> AuctionStatus {
        self.timer = self.timer.saturating_sub(seconds);
        if self.timer == 0 {
            log::debug!("bidder {:?} timed out", self.current_bidder());
            self.drop_current(state);
        }
        self.settle(state)
    }

    /// Apply auto-passes and close the auction once at most one bidder is left.
    ///
    /// A lone bidder who never bid does not win; the tile stays with the bank.
    pub fn settle(&mut self, state: &mut GameState) -> AuctionStatus {
        for _ in 0..self.participants.len() {
            let Some(bidder) = self.current_bidder() else {
                break;
            };
            let must_pass = !self.still_in(state, bidder)
                || (self.high_bidder != Some(bidder)
                    && state.players[bidder].cash < self.next_bid());
            if !must_pass {
                break;
            }
            self.drop_current(state);
        }

        if self.active_bidders(state).len() <= 1 {
            AuctionStatus::Closed(self.finalize(state))
        } else {
            AuctionStatus::Open
        }
    }

    fn finalize(&self, state: &mut GameState) -> AuctionResult {
        let tile_index = self.tile_index;
        let label = state.tile_label(tile_index).to_owned();
        let Some(winner) = self.high_bidder else {
            state.push_log(format!("Auction for {label} ended without a bid"));
            return AuctionResult::NoBids { tile_index };
        };
        let price = self.high_bid;
        let name = state.player_name(winner).to_owned();
        let covered = state
            .players
            .get(winner)
            .is_some_and(|p| !p.bankrupt && p.cash >= price);
        if !covered || state.properties.contains_key(&tile_index) {
            state.push_log(format!(
                "{name} could not cover the winning bid for {label}"
            ));
            return AuctionResult::WinnerShort {
                tile_index,
                winner,
                price,
            };
        }
        if apply_payment(state, winner, price, None) != PaymentOutcome::Paid {
            return AuctionResult::WinnerShort {
                tile_index,
                winner,
                price,
            };
        }
        state
            .properties
            .insert(tile_index, PropertyState::owned_by(winner));
        state.push_log(format!("{name} wins {label} for ${price}"));
        log::info!("tile {tile_index} sold at auction to player {winner} for {price}");
        AuctionResult::Sold {
            tile_index,
            winner,
            price,
        }
    }
}

/// Open the next repossessed tile, if any. Does nothing while `current` is an open auction.
pub fn start_next_queued_auction(
    state: &mut GameState,
    current: Option<&AuctionState>,
) -> Option<AuctionState> {
    if current.is_some() {
        return None;
    }
    while let Some(tile_index) = state.bank_auction_queue.pop_front() {
        if state.properties.contains_key(&tile_index) {
            continue;
        }
        if let Some(auction) = start_auction(state, tile_index, AuctionReason::Bankruptcy) {
            return Some(auction);
        }
    }
    None
}
