//! Player-to-player property and cash trades.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::economy::apply_payment;
use crate::state::GameState;

/// Which side of the trade pays the cash leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CashDirection {
    ProposerPays,
    #[default]
    TargetPays,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOffer {
    pub proposer: usize,
    pub target: usize,
    /// Tile the proposer hands over.
    #[serde(default)]
    pub give: Option<usize>,
    /// Tile the proposer asks for.
    #[serde(default)]
    pub receive: Option<usize>,
    #[serde(default)]
    pub cash: i64,
    #[serde(default)]
    pub direction: CashDirection,
}

impl TradeOffer {
    fn payer_and_payee(&self) -> (usize, usize) {
        match self.direction {
            CashDirection::ProposerPays => (self.proposer, self.target),
            CashDirection::TargetPays => (self.target, self.proposer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("a trade must move at least one property")]
    NothingOffered,
    #[error("players cannot trade with themselves")]
    SelfTrade,
    #[error("player {player} cannot trade")]
    IneligiblePlayer { player: usize },
    #[error("tile {tile} cannot be traded")]
    UnknownTile { tile: usize },
    #[error("player {player} does not own tile {tile}")]
    NotOwned { player: usize, tile: usize },
    #[error("cash amount {amount} is negative")]
    NegativeCash { amount: i64 },
    #[error("player {player} cannot cover the cash portion of the trade (needs ${amount})")]
    InsufficientCash { player: usize, amount: i64 },
}

fn check_owner(state: &GameState, tile: usize, player: usize) -> Result<(), TradeError> {
    if !state.tiles.get(tile).is_some_and(|t| t.is_ownable()) {
        return Err(TradeError::UnknownTile { tile });
    }
    match state.properties.get(&tile) {
        Some(prop) if prop.owner_id == player => Ok(()),
        _ => Err(TradeError::NotOwned { player, tile }),
    }
}

/// Check an offer against the current state without changing anything.
///
/// # Errors
///
/// Returns the first reason the trade cannot go ahead.
pub fn validate_trade(state: &GameState, offer: &TradeOffer) -> Result<(), TradeError> {
    if offer.give.is_none() && offer.receive.is_none() {
        return Err(TradeError::NothingOffered);
    }
    if offer.proposer == offer.target {
        return Err(TradeError::SelfTrade);
    }
    for player in [offer.proposer, offer.target] {
        if state.players.get(player).is_none_or(|p| p.bankrupt) {
            return Err(TradeError::IneligiblePlayer { player });
        }
    }
    if let Some(tile) = offer.give {
        check_owner(state, tile, offer.proposer)?;
    }
    if let Some(tile) = offer.receive {
        check_owner(state, tile, offer.target)?;
    }
    if offer.cash < 0 {
        return Err(TradeError::NegativeCash { amount: offer.cash });
    }
    let (payer, _) = offer.payer_and_payee();
    if state.players[payer].cash < offer.cash {
        return Err(TradeError::InsufficientCash {
            player: payer,
            amount: offer.cash,
        });
    }
    Ok(())
}

/// Validate and commit a trade. Transferred properties lose their upgrades and
/// keep their mortgage status.
///
/// # Errors
///
/// Rejected trades leave `state` untouched.
pub fn execute_trade(state: &mut GameState, offer: &TradeOffer) -> Result<(), TradeError> {
    if let Err(err) = validate_trade(state, offer) {
        log::info!("trade rejected: {err}");
        return Err(err);
    }
    for (tile, new_owner) in [(offer.give, offer.target), (offer.receive, offer.proposer)] {
        if let Some(prop) = tile.and_then(|tile| state.properties.get_mut(&tile)) {
            prop.owner_id = new_owner;
            prop.upgrades = 0;
        }
    }
    let (payer, payee) = offer.payer_and_payee();
    apply_payment(state, payer, offer.cash, Some(payee));

    let describe = |tile: Option<usize>| tile.map(|idx| state.tile_label(idx).to_owned());
    let mut msg = format!(
        "{} trades {}",
        state.player_name(offer.proposer),
        describe(offer.give).unwrap_or_else(|| "cash".into())
    );
    if let Some(label) = describe(offer.receive) {
        msg.push_str(&format!(" for {label}"));
    }
    msg.push_str(&format!(" with {}", state.player_name(offer.target)));
    state.push_log(msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardCatalog;
    use crate::state::{PropertyState, init_players};

    fn state() -> GameState {
        let mut state = GameState::new(BoardCatalog::sp500(), init_players(3, &[]), 17);
        state.properties.insert(
            1,
            PropertyState {
                upgrades: 2,
                ..PropertyState::owned_by(0)
            },
        );
        state.properties.insert(
            6,
            PropertyState {
                mortgaged: true,
                ..PropertyState::owned_by(1)
            },
        );
        state
    }

    fn offer() -> TradeOffer {
        TradeOffer {
            proposer: 0,
            target: 1,
            give: Some(1),
            receive: Some(6),
            cash: 100,
            direction: CashDirection::ProposerPays,
        }
    }

    #[test]
    fn swap_resets_upgrades_and_moves_cash() {
        let mut state = state();
        execute_trade(&mut state, &offer()).unwrap();
        assert_eq!(state.properties[&1].owner_id, 1);
        assert_eq!(state.properties[&1].upgrades, 0);
        assert_eq!(state.properties[&6].owner_id, 0);
        assert!(state.properties[&6].mortgaged);
        assert_eq!(state.players[0].cash, 1_400);
        assert_eq!(state.players[1].cash, 1_600);
        assert!(state.log.last().is_some_and(|l| l.contains("NEE for PLD")));
    }

    #[test]
    fn rejected_trade_leaves_state_identical() {
        let mut state = state();
        let before = serde_json::to_string(&state).unwrap();
        let bad = TradeOffer {
            give: Some(6),
            ..offer()
        };
        assert_eq!(
            execute_trade(&mut state, &bad),
            Err(TradeError::NotOwned { player: 0, tile: 6 })
        );
        assert_eq!(serde_json::to_string(&state).unwrap(), before);
    }

    #[test]
    fn validation_catches_each_rule() {
        let mut state = state();
        let cases = [
            (
                TradeOffer {
                    give: None,
                    receive: None,
                    ..offer()
                },
                TradeError::NothingOffered,
            ),
            (
                TradeOffer {
                    target: 0,
                    ..offer()
                },
                TradeError::SelfTrade,
            ),
            (
                TradeOffer {
                    receive: Some(2),
                    ..offer()
                },
                TradeError::UnknownTile { tile: 2 },
            ),
            (
                TradeOffer {
                    cash: 5_000,
                    ..offer()
                },
                TradeError::InsufficientCash {
                    player: 0,
                    amount: 5_000,
                },
            ),
            (
                TradeOffer {
                    cash: -1,
                    ..offer()
                },
                TradeError::NegativeCash { amount: -1 },
            ),
        ];
        for (bad, expected) in cases {
            assert_eq!(validate_trade(&state, &bad), Err(expected));
        }
        state.players[1].bankrupt = true;
        assert_eq!(
            validate_trade(&state, &offer()),
            Err(TradeError::IneligiblePlayer { player: 1 })
        );
    }

    #[test]
    fn target_can_pay_cash_leg() {
        let mut state = state();
        let one_way = TradeOffer {
            receive: None,
            direction: CashDirection::TargetPays,
            ..offer()
        };
        execute_trade(&mut state, &one_way).unwrap();
        assert_eq!(state.players[0].cash, 1_600);
        assert_eq!(state.players[1].cash, 1_400);
        assert_eq!(state.properties[&1].owner_id, 1);
    }
}
