//! Forced liquidation and bankruptcy.
use crate::board::Tile;
use crate::constants::LIQUIDATION_DIVISOR;
use crate::state::GameState;

/// Cash a player could hold after selling every upgrade and mortgaging everything left.
#[must_use]
pub fn liquidation_value(state: &GameState, player: usize) -> i64 {
    let Some(p) = state.players.get(player) else {
        return 0;
    };
    let assets: i64 = state
        .properties
        .iter()
        .filter(|(_, prop)| prop.owner_id == player)
        .map(|(idx, prop)| {
            let Some(tile) = state.tiles.get(*idx) else {
                return 0;
            };
            let upgrades = tile.as_company().map_or(0, |c| {
                i64::from(prop.upgrades) * (c.upgrade_cost / LIQUIDATION_DIVISOR)
            });
            let mortgage = if prop.mortgaged {
                0
            } else {
                tile.price().unwrap_or(0) / LIQUIDATION_DIVISOR
            };
            upgrades + mortgage
        })
        .sum();
    p.cash + assets
}

/// The upgraded property with the most expensive upgrades, first in board order on ties.
fn costliest_upgrade(state: &GameState, player: usize) -> Option<(usize, i64)> {
    state
        .properties
        .iter()
        .filter(|(_, prop)| prop.owner_id == player && prop.upgrades > 0)
        .filter_map(|(idx, _)| match state.tiles.get(*idx) {
            Some(Tile::Company(c)) => Some((*idx, c.upgrade_cost)),
            _ => None,
        })
        .fold(None, |best, (idx, cost)| match best {
            Some((_, best_cost)) if best_cost >= cost => best,
            _ => Some((idx, cost)),
        })
}

fn first_mortgageable(state: &GameState, player: usize) -> Option<(usize, i64)> {
    state
        .properties
        .iter()
        .find(|(_, prop)| prop.owner_id == player && !prop.mortgaged && prop.upgrades == 0)
        .map(|(idx, _)| (*idx, state.tiles.get(*idx).and_then(Tile::price).unwrap_or(0)))
}

/// Raise cash for `player` until they hold at least `target`, or nothing is left to sell.
///
/// Upgrades go first, one level at a time, always from the tile with the
/// highest upgrade cost. Unimproved properties are then mortgaged in board
/// order. Returns the amount raised.
pub fn liquidate(state: &mut GameState, player: usize, target: i64) -> i64 {
    let Some(start) = state.players.get(player).map(|p| p.cash) else {
        return 0;
    };
    while state.players[player].cash < target {
        if let Some((idx, cost)) = costliest_upgrade(state, player) {
            let refund = cost / LIQUIDATION_DIVISOR;
            if let Some(prop) = state.properties.get_mut(&idx) {
                prop.upgrades -= 1;
            }
            state.players[player].cash += refund;
            let msg = format!(
                "{} sells an upgrade on {} for ${refund}",
                state.player_name(player),
                state.tile_label(idx)
            );
            state.push_log(msg);
        } else if let Some((idx, price)) = first_mortgageable(state, player) {
            let credit = price / LIQUIDATION_DIVISOR;
            if let Some(prop) = state.properties.get_mut(&idx) {
                prop.mortgaged = true;
            }
            state.players[player].cash += credit;
            let msg = format!(
                "{} mortgages {} for ${credit}",
                state.player_name(player),
                state.tile_label(idx)
            );
            state.push_log(msg);
        } else {
            break;
        }
    }
    let raised = state.players[player].cash - start;
    if raised > 0 {
        log::debug!("liquidation raised {raised} for player {player}");
    }
    raised
}

/// Take `player` out of the game and queue their holdings for auction.
pub fn declare_bankrupt(state: &mut GameState, player: usize) {
    let Some(p) = state.players.get_mut(player) else {
        return;
    };
    if p.bankrupt {
        return;
    }
    p.bankrupt = true;
    p.cash = 0;
    p.in_jail = false;

    for idx in state.owned_by(player) {
        state.properties.remove(&idx);
        if !state.bank_auction_queue.contains(&idx) {
            state.bank_auction_queue.push_back(idx);
        }
    }
    let msg = format!("{} is bankrupt", state.player_name(player));
    state.push_log(msg);
    log::info!("player {player} went bankrupt");

    if state.current_player == player {
        state.advance_turn();
    }
    if let Some(winner) = state.winner() {
        let msg = format!("{} wins the game", state.player_name(winner));
        state.push_log(msg);
        log::info!("game over: player {winner} wins");
    }
}
