//! Event-card draws and effects.
use crate::board::{Card, CardEffect, DeckKind, nearest_fund};
use crate::constants::MAX_UPGRADES;
use crate::economy::{apply_payment, calc_rent, credit};
use crate::numbers::usize_to_i64;
use crate::state::GameState;
use crate::turn::{check_upgrade_rules, move_by, move_to, pay_rent, resolve_landing, send_to_jail};

/// Draw the top card of `deck` for `player` and resolve it.
///
/// An empty draw pile is refilled by shuffling the discard pile. The drawn
/// card goes onto the discard pile before its effect runs.
pub fn draw_card(state: &mut GameState, player: usize, deck: DeckKind, roll_total: i64) {
    let needs_reshuffle = state.deck_mut(deck).0.is_empty();
    if needs_reshuffle {
        let discard = std::mem::take(state.deck_mut(deck).1);
        let fresh = state.shuffled(discard);
        *state.deck_mut(deck).0 = fresh;
        log::debug!("reshuffled the {deck} deck");
    }
    let (pile, discard) = state.deck_mut(deck);
    if pile.is_empty() {
        log::warn!("{deck} deck has no cards to draw");
        return;
    }
    let card = pile.remove(0);
    discard.push(card.clone());
    resolve_card(state, player, &card, roll_total);
}

/// Apply a card's effect for `player`.
pub fn resolve_card(state: &mut GameState, player: usize, card: &Card, roll_total: i64) {
    let name = state.player_name(player).to_owned();
    state.push_log(format!("{name} drew: {}", card.text));
    match card.effect {
        CardEffect::Collect { amount } => credit(state, player, amount),
        CardEffect::Pay { amount } => {
            apply_payment(state, player, amount, None);
        }
        CardEffect::CollectFromAll { amount } => {
            let others: Vec<usize> = state
                .active_players()
                .map(|p| p.id)
                .filter(|&id| id != player)
                .collect();
            for other in others {
                apply_payment(state, other, amount, Some(player));
            }
            state.push_log(format!("{name} collects ${amount} from each player"));
        }
        CardEffect::PayPerProperty { amount } => {
            let owned = state.owned_by(player).len();
            let total = amount * usize_to_i64(owned);
            state.push_log(format!(
                "{name} pays ${total} in upkeep across {owned} properties"
            ));
            apply_payment(state, player, total, None);
        }
        CardEffect::Move { offset } => {
            move_by(state, player, offset);
            resolve_landing(state, player, roll_total);
        }
        CardEffect::Goto { position } => {
            move_to(state, player, position, false);
            resolve_landing(state, player, roll_total);
        }
        CardEffect::MoveToNearest { kind, pay_double } => {
            let target = nearest_fund(&state.tiles, state.players[player].position, kind);
            move_to(state, player, target, true);
            match state.properties.get(&target).copied() {
                Some(prop) if pay_double && prop.owner_id != player => {
                    let rent = calc_rent(state, target, roll_total) * 2;
                    pay_rent(state, player, prop.owner_id, target, rent);
                }
                _ => resolve_landing(state, player, roll_total),
            }
        }
        CardEffect::UpgradeFree => {
            let eligible = state
                .owned_by(player)
                .into_iter()
                .find(|&idx| check_upgrade_rules(state, player, idx).is_ok());
            if let Some(idx) = eligible
                && let Some(prop) = state.properties.get_mut(&idx)
            {
                prop.upgrades = (prop.upgrades + 1).min(MAX_UPGRADES);
                let label = state.tile_label(idx).to_owned();
                state.push_log(format!("{name} upgrades {label} for free"));
            }
        }
        CardEffect::MortgageRelief => {
            let mortgaged = state
                .properties
                .iter_mut()
                .find(|(_, prop)| prop.owner_id == player && prop.mortgaged);
            if let Some((_, prop)) = mortgaged {
                prop.mortgaged = false;
                state.push_log(format!("{name} clears a mortgage for free"));
            }
        }
        CardEffect::Jail => send_to_jail(state, player),
        CardEffect::Getout => {
            state.players[player].get_out_of_jail += 1;
        }
    }
}
