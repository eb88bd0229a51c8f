//! The turn state machine: dice, movement, landings, purchases and property management.
//!
//! Every command validates first and returns a [`RuleViolation`] without
//! touching the state when it is not allowed. Commands act on behalf of the
//! current player.
use crate::auction::{AuctionReason, AuctionState, start_auction};
use crate::bankruptcy::liquidate;
use crate::board::{Tile, jail_index, sector_indices};
use crate::cards::draw_card;
use crate::constants::{
    BAIL_AMOUNT, DIE_FACES, DOUBLES_TO_JAIL, GO_BONUS, JAIL_ATTEMPTS, LIQUIDATION_DIVISOR,
    MAX_UPGRADES, UNMORTGAGE_DENOMINATOR, UNMORTGAGE_NUMERATOR,
};
use crate::economy::{apply_payment, calc_rent, credit, owns_all_in_sector};
use crate::error::RuleViolation;
use crate::numbers::{usize_to_i64, wrap_position};
use crate::state::{GameState, PendingAction, PropertyState};

fn ensure_running(state: &GameState) -> Result<(), RuleViolation> {
    if state.is_over() {
        Err(RuleViolation::GameOver)
    } else {
        Ok(())
    }
}

fn check_roll(state: &GameState) -> Result<(), RuleViolation> {
    ensure_running(state)?;
    if matches!(state.pending, PendingAction::Buy { .. }) {
        return Err(RuleViolation::DecisionPending);
    }
    if !state.can_roll() {
        return Err(RuleViolation::AlreadyRolled {
            player: state.current_player,
        });
    }
    Ok(())
}

/// Roll the dice for the current player and play out the result.
///
/// # Errors
///
/// Rejected when the game is over, a buy decision is pending, or the player has
/// already used their roll.
pub fn roll(state: &mut GameState) -> Result<(u8, u8), RuleViolation> {
    check_roll(state)?;
    let dice = state.roll_dice();
    play_roll(state, dice);
    Ok(dice)
}

/// Like [`roll`] with caller-chosen dice.
///
/// # Errors
///
/// As [`roll`], plus [`RuleViolation::InvalidDice`] for faces outside 1-6.
pub fn roll_with(state: &mut GameState, d1: u8, d2: u8) -> Result<(u8, u8), RuleViolation> {
    let face = 1..=DIE_FACES;
    if !face.contains(&d1) || !face.contains(&d2) {
        return Err(RuleViolation::InvalidDice(d1, d2));
    }
    check_roll(state)?;
    play_roll(state, (d1, d2));
    Ok((d1, d2))
}

fn play_roll(state: &mut GameState, (d1, d2): (u8, u8)) {
    let actor = state.current_player;
    let name = state.player_name(actor).to_owned();
    let total = i64::from(d1) + i64::from(d2);
    let doubles = d1 == d2;
    state.last_roll = Some((d1, d2));

    if state.players[actor].in_jail {
        if doubles {
            let player = &mut state.players[actor];
            player.in_jail = false;
            player.jail_turns = JAIL_ATTEMPTS;
            state.push_log(format!("{name} leaves jail (doubles)"));
        } else {
            let player = &mut state.players[actor];
            player.jail_turns = player.jail_turns.saturating_sub(1);
            let left = player.jail_turns;
            state.push_log(format!("{name} waits in jail ({left} left)"));
            if left > 0 {
                state.advance_turn();
                return;
            }
            state.players[actor].in_jail = false;
            state.players[actor].jail_turns = JAIL_ATTEMPTS;
            state.push_log(format!(
                "{name} pays ${BAIL_AMOUNT} after final jail attempt"
            ));
            apply_payment(state, actor, BAIL_AMOUNT, None);
            if state.players[actor].bankrupt {
                return;
            }
        }
        state.consecutive_doubles = 0;
        state.push_log(format!("{name} rolled {d1} + {d2} = {total}"));
        move_by(state, actor, total);
        resolve_landing(state, actor, total);
        return;
    }

    if doubles {
        state.consecutive_doubles += 1;
        if state.consecutive_doubles >= DOUBLES_TO_JAIL {
            state.push_log(format!(
                "{name} rolled doubles three times and is sent to jail"
            ));
            send_to_jail(state, actor);
            return;
        }
    } else {
        state.consecutive_doubles = 0;
    }
    state.push_log(format!("{name} rolled {d1} + {d2} = {total}"));
    move_by(state, actor, total);
    resolve_landing(state, actor, total);
}

/// Move `player` by a relative offset, paying the GO bonus once per lap completed.
pub fn move_by(state: &mut GameState, player: usize, offset: i64) {
    let len = state.tiles.len();
    let raw = usize_to_i64(state.players[player].position) + offset;
    state.players[player].position = wrap_position(raw, len);
    if offset > 0 {
        let laps = raw / usize_to_i64(len.max(1));
        if laps > 0 {
            credit(state, player, GO_BONUS * laps);
            let msg = format!("{} passes GO and collects ${GO_BONUS}", state.player_name(player));
            state.push_log(msg);
        }
    }
}

/// Jump `player` to an absolute tile. The GO bonus is only paid when
/// `award_go` is set and the jump wraps past the start.
pub fn move_to(state: &mut GameState, player: usize, position: usize, award_go: bool) {
    let from = state.players[player].position;
    state.players[player].position = position % state.tiles.len().max(1);
    if award_go && position < from {
        credit(state, player, GO_BONUS);
        let msg = format!("{} passes GO and collects ${GO_BONUS}", state.player_name(player));
        state.push_log(msg);
    }
}

pub fn send_to_jail(state: &mut GameState, player: usize) {
    let jail = jail_index(&state.tiles);
    let p = &mut state.players[player];
    p.position = jail;
    p.in_jail = true;
    p.jail_turns = JAIL_ATTEMPTS;
    if state.current_player == player {
        state.consecutive_doubles = 0;
    }
    let msg = format!("{} sent to Jail", state.player_name(player));
    state.push_log(msg);
}

/// Charge `rent` from `payer` to `owner` and record it.
pub fn pay_rent(state: &mut GameState, payer: usize, owner: usize, tile_index: usize, rent: i64) {
    if rent <= 0
        || payer == owner
        || state.players.get(owner).is_none_or(|p| p.bankrupt)
    {
        return;
    }
    let msg = format!(
        "{} pays ${rent} to {} for {}",
        state.player_name(payer),
        state.player_name(owner),
        state.tile_label(tile_index)
    );
    apply_payment(state, payer, rent, Some(owner));
    state.push_log(msg);
}

/// Apply whatever the tile under `player` does.
pub fn resolve_landing(state: &mut GameState, player: usize, roll_total: i64) {
    if state.players[player].bankrupt {
        return;
    }
    let tile_index = state.players[player].position;
    let Some(tile) = state.tiles.get(tile_index).cloned() else {
        return;
    };
    let name = state.player_name(player).to_owned();
    match tile {
        Tile::Go { .. } => {
            state.push_log(format!("{name} landed on GO and collects ${GO_BONUS}"));
            credit(state, player, GO_BONUS);
        }
        Tile::Company(_) | Tile::Etf(_) | Tile::Index(_) => {
            match state.properties.get(&tile_index).copied() {
                None => state.pending = PendingAction::Buy { tile_index },
                Some(prop) if prop.owner_id != player && !prop.mortgaged => {
                    let rent = calc_rent(state, tile_index, roll_total);
                    pay_rent(state, player, prop.owner_id, tile_index, rent);
                }
                Some(_) => {}
            }
        }
        Tile::Event { deck } => draw_card(state, player, deck, roll_total),
        Tile::Tax(tax) => {
            let charge = tax.charge_for(state.players[player].cash);
            state.push_log(format!("{name} pays ${charge} in {}", tax.label));
            apply_payment(state, player, charge, None);
        }
        Tile::GoToJail { .. } => send_to_jail(state, player),
        Tile::Jail { .. } | Tile::Free { .. } => {}
    }
}

fn pending_tile(state: &GameState) -> Result<usize, RuleViolation> {
    ensure_running(state)?;
    match state.pending {
        PendingAction::Buy { tile_index } => Ok(tile_index),
        PendingAction::None => Err(RuleViolation::NoPendingPurchase),
    }
}

/// Buy the tile the current player is standing on at its listed price.
///
/// Computer players short on cash liquidate first. A buyer who still cannot
/// pay sends the tile to auction instead, which is returned.
///
/// # Errors
///
/// Rejected when no purchase is pending.
pub fn buy(state: &mut GameState) -> Result<Option<AuctionState>, RuleViolation> {
    let tile_index = pending_tile(state)?;
    let Some(price) = state.tiles.get(tile_index).and_then(Tile::price) else {
        state.pending = PendingAction::None;
        return Ok(None);
    };
    let buyer = state.current_player;
    let name = state.player_name(buyer).to_owned();
    let label = state.tile_label(tile_index).to_owned();

    if state.players[buyer].cash < price && state.players[buyer].is_ai {
        liquidate(state, buyer, price);
    }
    if state.players[buyer].cash < price {
        state.push_log(format!("{name} cannot afford {label} — starting auction"));
        return Ok(start_auction(state, tile_index, AuctionReason::Declined));
    }
    state.pending = PendingAction::None;
    state
        .properties
        .insert(tile_index, PropertyState::owned_by(buyer));
    apply_payment(state, buyer, price, None);
    state.push_log(format!("{name} bought {label} for ${price}"));
    Ok(None)
}

/// Pass on the pending purchase and put the tile up for auction.
///
/// # Errors
///
/// Rejected when no purchase is pending.
pub fn decline_buy(state: &mut GameState) -> Result<Option<AuctionState>, RuleViolation> {
    let tile_index = pending_tile(state)?;
    Ok(start_auction(state, tile_index, AuctionReason::Declined))
}

fn jailed_current(state: &GameState) -> Result<usize, RuleViolation> {
    ensure_running(state)?;
    let player = state.current_player;
    if !state.players[player].in_jail {
        return Err(RuleViolation::NotInJail { player });
    }
    Ok(player)
}

/// Pay the bail and leave jail before rolling.
///
/// # Errors
///
/// Rejected when the current player is not jailed or cannot pay.
pub fn pay_bail(state: &mut GameState) -> Result<(), RuleViolation> {
    let player = jailed_current(state)?;
    if state.players[player].cash < BAIL_AMOUNT {
        return Err(RuleViolation::InsufficientFunds {
            player,
            amount: BAIL_AMOUNT,
        });
    }
    apply_payment(state, player, BAIL_AMOUNT, None);
    let p = &mut state.players[player];
    p.in_jail = false;
    p.jail_turns = JAIL_ATTEMPTS;
    let msg = format!(
        "{} pays ${BAIL_AMOUNT} bail to exit jail",
        state.player_name(player)
    );
    state.push_log(msg);
    Ok(())
}

/// Spend a held release card.
///
/// # Errors
///
/// Rejected when the current player is not jailed or holds no card.
pub fn use_jail_card(state: &mut GameState) -> Result<(), RuleViolation> {
    let player = jailed_current(state)?;
    let p = &mut state.players[player];
    if p.get_out_of_jail == 0 {
        return Err(RuleViolation::NoJailCard { player });
    }
    p.get_out_of_jail -= 1;
    p.in_jail = false;
    p.jail_turns = JAIL_ATTEMPTS;
    let msg = format!("{} uses a Get Out of Jail card", state.player_name(player));
    state.push_log(msg);
    Ok(())
}

/// Look up a tile the current player owns.
fn owned_by_current(state: &GameState, tile: usize) -> Result<PropertyState, RuleViolation> {
    ensure_running(state)?;
    let player = state.current_player;
    let tile_ref = state
        .tiles
        .get(tile)
        .ok_or(RuleViolation::UnknownTile { tile })?;
    if !tile_ref.is_ownable() {
        return Err(RuleViolation::NotOwnable { tile });
    }
    state
        .properties
        .get(&tile)
        .copied()
        .filter(|prop| prop.owner_id == player)
        .ok_or(RuleViolation::NotOwner { tile, player })
}

/// Why `player` may not add a level to `tile`, ignoring the cost.
///
/// # Errors
///
/// Returns the first upgrade rule the tile breaks.
pub fn check_upgrade_rules(
    state: &GameState,
    player: usize,
    tile: usize,
) -> Result<i64, RuleViolation> {
    let company = state
        .tiles
        .get(tile)
        .ok_or(RuleViolation::UnknownTile { tile })?
        .as_company()
        .ok_or(RuleViolation::NotCompany { tile })?;
    let prop = state
        .properties
        .get(&tile)
        .filter(|prop| prop.owner_id == player)
        .ok_or(RuleViolation::NotOwner { tile, player })?;
    if prop.mortgaged {
        return Err(RuleViolation::Mortgaged { tile });
    }
    if !owns_all_in_sector(state, player, &company.sector) {
        return Err(RuleViolation::NoMonopoly {
            player,
            sector: company.sector.clone(),
        });
    }
    if prop.upgrades >= MAX_UPGRADES {
        return Err(RuleViolation::MaxUpgrades { tile });
    }
    let lowest = sector_indices(&state.tiles, &company.sector)
        .iter()
        .filter_map(|idx| state.properties.get(idx))
        .map(|p| p.upgrades)
        .min()
        .unwrap_or(0);
    if prop.upgrades > lowest {
        return Err(RuleViolation::UnevenBuild { tile });
    }
    Ok(company.upgrade_cost)
}

/// Add one upgrade level to a company in a fully owned sector.
///
/// # Errors
///
/// Rejected unless the player owns the whole sector, the tile is unmortgaged,
/// below the maximum, no higher than its sector's lowest level, and affordable.
pub fn upgrade(state: &mut GameState, tile: usize) -> Result<(), RuleViolation> {
    ensure_running(state)?;
    let player = state.current_player;
    let cost = check_upgrade_rules(state, player, tile)?;
    if state.players[player].cash < cost {
        return Err(RuleViolation::InsufficientFunds {
            player,
            amount: cost,
        });
    }
    apply_payment(state, player, cost, None);
    if let Some(prop) = state.properties.get_mut(&tile) {
        prop.upgrades += 1;
    }
    let msg = format!(
        "{} upgrades {} for ${cost}",
        state.player_name(player),
        state.tile_label(tile)
    );
    state.push_log(msg);
    Ok(())
}

/// Sell one upgrade level back to the bank at half its cost.
///
/// # Errors
///
/// Rejected unless the current player owns the company and it has an upgrade.
pub fn sell_upgrade(state: &mut GameState, tile: usize) -> Result<(), RuleViolation> {
    let prop = owned_by_current(state, tile)?;
    let cost = state
        .tiles
        .get(tile)
        .and_then(Tile::as_company)
        .map(|c| c.upgrade_cost)
        .ok_or(RuleViolation::NotCompany { tile })?;
    if prop.upgrades == 0 {
        return Err(RuleViolation::NoUpgrades { tile });
    }
    let player = state.current_player;
    let refund = cost / LIQUIDATION_DIVISOR;
    if let Some(prop) = state.properties.get_mut(&tile) {
        prop.upgrades -= 1;
    }
    credit(state, player, refund);
    let msg = format!(
        "{} sells an upgrade on {} for ${refund}",
        state.player_name(player),
        state.tile_label(tile)
    );
    state.push_log(msg);
    Ok(())
}

/// Mortgage an unimproved property for half its price.
///
/// # Errors
///
/// Rejected unless the current player owns the tile, it carries no upgrades,
/// and it is not already mortgaged.
pub fn mortgage(state: &mut GameState, tile: usize) -> Result<(), RuleViolation> {
    let prop = owned_by_current(state, tile)?;
    if prop.mortgaged {
        return Err(RuleViolation::Mortgaged { tile });
    }
    if prop.upgrades > 0 {
        return Err(RuleViolation::Improved { tile });
    }
    let player = state.current_player;
    let value = state.tiles.get(tile).and_then(Tile::price).unwrap_or(0) / LIQUIDATION_DIVISOR;
    if let Some(prop) = state.properties.get_mut(&tile) {
        prop.mortgaged = true;
    }
    credit(state, player, value);
    let msg = format!(
        "{} mortgages {} for ${value}",
        state.player_name(player),
        state.tile_label(tile)
    );
    state.push_log(msg);
    Ok(())
}

/// Cost to lift the mortgage on a tile listed at `price`.
#[must_use]
pub fn unmortgage_cost(price: i64) -> i64 {
    (price * UNMORTGAGE_NUMERATOR + UNMORTGAGE_DENOMINATOR - 1) / UNMORTGAGE_DENOMINATOR
}

/// Lift a mortgage.
///
/// # Errors
///
/// Rejected unless the current player owns the mortgaged tile and can pay the payoff.
pub fn unmortgage(state: &mut GameState, tile: usize) -> Result<(), RuleViolation> {
    let prop = owned_by_current(state, tile)?;
    if !prop.mortgaged {
        return Err(RuleViolation::NotMortgaged { tile });
    }
    let player = state.current_player;
    let payoff = unmortgage_cost(state.tiles.get(tile).and_then(Tile::price).unwrap_or(0));
    if state.players[player].cash < payoff {
        return Err(RuleViolation::InsufficientFunds {
            player,
            amount: payoff,
        });
    }
    apply_payment(state, player, payoff, None);
    if let Some(prop) = state.properties.get_mut(&tile) {
        prop.mortgaged = false;
    }
    let msg = format!(
        "{} unmortgages {} for ${payoff}",
        state.player_name(player),
        state.tile_label(tile)
    );
    state.push_log(msg);
    Ok(())
}

/// Finish the current player's turn.
///
/// # Errors
///
/// Rejected before the player has rolled or while a buy decision is pending.
pub fn end_turn(state: &mut GameState) -> Result<(), RuleViolation> {
    ensure_running(state)?;
    if matches!(state.pending, PendingAction::Buy { .. }) {
        return Err(RuleViolation::DecisionPending);
    }
    if state.last_roll.is_none() {
        return Err(RuleViolation::MustRoll {
            player: state.current_player,
        });
    }
    state.advance_turn();
    Ok(())
}
