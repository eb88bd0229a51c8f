//! Decision rules for computer-controlled seats.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auction::AuctionState;
use crate::constants::{
    AI_BAIL_RESERVE, AI_BID_CASH_FRACTION, AI_BID_PRICE_MULTIPLE, AI_BUILD_RESERVE,
    AI_BUY_CASH_RATIO, AI_FALLBACK_DESIRE, BAIL_AMOUNT,
};
use crate::numbers::i64_to_f64;
use crate::state::{GameState, PendingAction};
use crate::turn::check_upgrade_rules;

/// A command the engine can issue on a computer player's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoAction {
    Bid,
    Pass,
    Buy,
    DeclineBuy,
    PayBail,
    UseJailCard,
    Upgrade(usize),
    Roll,
    EndTurn,
}

impl fmt::Display for AutoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => f.write_str("bid"),
            Self::Pass => f.write_str("pass"),
            Self::Buy => f.write_str("buy"),
            Self::DeclineBuy => f.write_str("decline"),
            Self::PayBail => f.write_str("pay bail"),
            Self::UseJailCard => f.write_str("use jail card"),
            Self::Upgrade(tile) => write!(f, "upgrade tile {tile}"),
            Self::Roll => f.write_str("roll"),
            Self::EndTurn => f.write_str("end turn"),
        }
    }
}

/// Thresholds that drive computer players.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputerPolicy {
    /// Buy outright only when cash exceeds `price * buy_cash_ratio`.
    pub buy_cash_ratio: f64,
    pub bid_cash_fraction: f64,
    pub bid_price_multiple: f64,
    /// Stand-in price for tiles without one.
    pub fallback_desire: i64,
    /// Cash kept back after paying bail.
    pub bail_reserve: i64,
    /// Cash kept back after building; `None` disables building.
    pub build_reserve: Option<i64>,
}

impl Default for ComputerPolicy {
    fn default() -> Self {
        Self {
            buy_cash_ratio: AI_BUY_CASH_RATIO,
            bid_cash_fraction: AI_BID_CASH_FRACTION,
            bid_price_multiple: AI_BID_PRICE_MULTIPLE,
            fallback_desire: AI_FALLBACK_DESIRE,
            bail_reserve: AI_BAIL_RESERVE,
            build_reserve: Some(AI_BUILD_RESERVE),
        }
    }
}

impl ComputerPolicy {
    #[must_use]
    pub fn wants_to_buy(&self, cash: i64, price: i64) -> bool {
        i64_to_f64(cash) > i64_to_f64(price) * self.buy_cash_ratio
    }

    /// Highest bid this policy will place for a tile listed at `price`.
    #[must_use]
    pub fn bid_ceiling(&self, cash: i64, price: Option<i64>) -> f64 {
        let desire = price.unwrap_or(self.fallback_desire);
        (i64_to_f64(cash) * self.bid_cash_fraction)
            .min(i64_to_f64(desire) * self.bid_price_multiple)
    }

    /// Bid or pass for whoever holds the auction floor.
    #[must_use]
    pub fn auction_action(&self, state: &GameState, auction: &AuctionState) -> AutoAction {
        let cash = auction
            .current_bidder()
            .and_then(|id| state.players.get(id))
            .map_or(0, |p| p.cash);
        let price = state.tiles.get(auction.tile_index).and_then(|t| t.price());
        if i64_to_f64(auction.next_bid()) <= self.bid_ceiling(cash, price) {
            AutoAction::Bid
        } else {
            AutoAction::Pass
        }
    }

    fn build_target(&self, state: &GameState) -> Option<usize> {
        let reserve = self.build_reserve?;
        let player = state.current_player;
        let cash = state.players[player].cash;
        state
            .owned_by(player)
            .into_iter()
            .find(|&idx| {
                check_upgrade_rules(state, player, idx).is_ok_and(|cost| cash - cost >= reserve)
            })
    }

    /// Next turn command for the current player.
    #[must_use]
    pub fn turn_action(&self, state: &GameState) -> Option<AutoAction> {
        if state.is_over() {
            return None;
        }
        let player = state.current();
        if let PendingAction::Buy { tile_index } = state.pending {
            let price = state.tiles.get(tile_index).and_then(|t| t.price()).unwrap_or(0);
            return Some(if self.wants_to_buy(player.cash, price) {
                AutoAction::Buy
            } else {
                AutoAction::DeclineBuy
            });
        }
        if player.in_jail && state.last_roll.is_none() {
            if player.get_out_of_jail > 0 {
                return Some(AutoAction::UseJailCard);
            }
            if player.cash - BAIL_AMOUNT >= self.bail_reserve {
                return Some(AutoAction::PayBail);
            }
            return Some(AutoAction::Roll);
        }
        if state.last_roll.is_none()
            && let Some(tile) = self.build_target(state)
        {
            return Some(AutoAction::Upgrade(tile));
        }
        if state.can_roll() {
            Some(AutoAction::Roll)
        } else {
            Some(AutoAction::EndTurn)
        }
    }
}
