//! Rent and payment rules.
//!
//! Everything here is a pure function of the game state, except
//! [`apply_payment`], which is the one funnel every cash debit flows through so
//! that liquidation and bankruptcy are always checked at the point of obligation.
use serde::{Deserialize, Serialize};

use crate::bankruptcy::{declare_bankrupt, liquidate};
use crate::board::{FundKind, Tile, sector_indices};
use crate::state::GameState;

/// How ETF rent tables are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EtfRentBasis {
    /// `rent_scale[n - 1]` where `n` is how many ETFs the owner holds.
    #[default]
    OwnedCount,
    /// Always the first step of the table.
    Flat,
}

/// Which dice total index-fund rent multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum IndexRentBasis {
    /// The roll that brought the payer onto the tile.
    #[default]
    DiceTotal,
    /// The expected total of two dice (7), independent of the roll.
    ExpectedTotal,
}

/// Interpretation of the fund rent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RentPolicy {
    pub etf: EtfRentBasis,
    pub index: IndexRentBasis,
}

const EXPECTED_DICE_TOTAL: i64 = 7;

/// Whether `player` owns every company in `sector`.
#[must_use]
pub fn owns_all_in_sector(state: &GameState, player: usize, sector: &str) -> bool {
    let indices = sector_indices(&state.tiles, sector);
    !indices.is_empty()
        && indices.iter().all(|idx| {
            state
                .properties
                .get(idx)
                .is_some_and(|prop| prop.owner_id == player)
        })
}

/// Number of funds of `kind` that `player` owns.
#[must_use]
pub fn count_owned(state: &GameState, player: usize, kind: FundKind) -> usize {
    state
        .properties
        .iter()
        .filter(|(idx, prop)| {
            prop.owner_id == player && state.tiles.get(**idx).is_some_and(|t| t.is_fund(kind))
        })
        .count()
}

/// Rent owed for landing on `tile_index` with a dice total of `roll_total`.
/// Unowned and mortgaged tiles charge nothing.
#[must_use]
pub fn calc_rent(state: &GameState, tile_index: usize, roll_total: i64) -> i64 {
    let Some(prop) = state.properties.get(&tile_index) else {
        return 0;
    };
    if prop.mortgaged {
        return 0;
    }
    let owner = prop.owner_id;
    match state.tiles.get(tile_index) {
        Some(Tile::Company(company)) => {
            let level = usize::from(prop.upgrades).min(company.rents.len() - 1);
            let rent = company.rents[level];
            // Monopoly bonus only applies before any improvement is built.
            if prop.upgrades == 0 && owns_all_in_sector(state, owner, &company.sector) {
                rent * 2
            } else {
                rent
            }
        }
        Some(Tile::Etf(etf)) => {
            let count = count_owned(state, owner, FundKind::Etf);
            if count == 0 || etf.rent_scale.is_empty() {
                return 0;
            }
            let step = match state.rent_policy.etf {
                EtfRentBasis::OwnedCount => (count - 1).min(etf.rent_scale.len() - 1),
                EtfRentBasis::Flat => 0,
            };
            etf.rent_scale[step]
        }
        Some(Tile::Index(index)) => {
            let count = count_owned(state, owner, FundKind::Index);
            let mult = if count >= 2 {
                index.rent_multiplier.both
            } else {
                index.rent_multiplier.one
            };
            let total = match state.rent_policy.index {
                IndexRentBasis::DiceTotal => roll_total,
                IndexRentBasis::ExpectedTotal => EXPECTED_DICE_TOTAL,
            };
            total * mult
        }
        _ => 0,
    }
}

/// Result of routing a debit through [`apply_payment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The full amount changed hands (possibly after liquidation).
    Paid,
    /// The payer could not cover the debt and is now bankrupt; `recovered` went to the payee.
    Bankrupt { recovered: i64 },
    /// The payer was already out of the game.
    Skipped,
}

/// Bank pays `player`.
pub fn credit(state: &mut GameState, player: usize, amount: i64) {
    if let Some(p) = state.players.get_mut(player)
        && !p.bankrupt
    {
        p.cash += amount;
    }
}

/// Debit `payer` by `amount`, crediting `payee` (or the bank when `None`).
///
/// A debit the payer cannot cover triggers liquidation before anything is
/// committed. If liquidation falls short the payer is declared bankrupt and
/// the payee receives whatever cash was left.
pub fn apply_payment(
    state: &mut GameState,
    payer: usize,
    amount: i64,
    payee: Option<usize>,
) -> PaymentOutcome {
    if state.players.get(payer).is_none_or(|p| p.bankrupt) {
        return PaymentOutcome::Skipped;
    }
    if amount <= 0 {
        return PaymentOutcome::Paid;
    }
    if state.players[payer].cash < amount {
        liquidate(state, payer, amount);
    }
    let cash = state.players[payer].cash;
    if cash >= amount {
        state.players[payer].cash -= amount;
        if let Some(payee) = payee.filter(|&id| id != payer) {
            credit(state, payee, amount);
        }
        return PaymentOutcome::Paid;
    }

    let recovered = cash.max(0);
    state.players[payer].cash = 0;
    if let Some(payee) = payee.filter(|&id| id != payer) {
        credit(state, payee, recovered);
    }
    log::info!(
        "player {payer} owes {amount} but can raise only {recovered}; declaring bankruptcy"
    );
    declare_bankrupt(state, payer);
    PaymentOutcome::Bankrupt { recovered }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardCatalog, CompanyTile, EtfTile, IndexTile, RentMultiplier};
    use crate::state::{PlayerState, PropertyState, init_players};

    fn company(ticker: &str, sector: &str) -> Tile {
        Tile::Company(CompanyTile {
            id: ticker.to_lowercase(),
            ticker: ticker.into(),
            name: ticker.into(),
            sector: sector.into(),
            color: "#000".into(),
            price: 100,
            upgrade_cost: 50,
            rents: [10, 20, 30, 40, 50, 60],
        })
    }

    fn mini_state() -> GameState {
        let mut state = GameState::new(BoardCatalog::sp500(), init_players(2, &[]), 5);
        state.tiles = vec![
            Tile::Go {
                label: "GO".into(),
            },
            company("AAA", "Tech"),
            company("BBB", "Tech"),
            Tile::Etf(EtfTile {
                id: "etf".into(),
                ticker: "ETF".into(),
                price: 150,
                rent_scale: vec![25, 50, 100, 200],
            }),
            Tile::Index(IndexTile {
                id: "idx".into(),
                ticker: "IDX".into(),
                price: 150,
                rent_multiplier: RentMultiplier { one: 4, both: 10 },
            }),
            Tile::Etf(EtfTile {
                id: "etf2".into(),
                ticker: "ET2".into(),
                price: 150,
                rent_scale: vec![25, 50, 100, 200],
            }),
            Tile::Index(IndexTile {
                id: "idx2".into(),
                ticker: "ID2".into(),
                price: 150,
                rent_multiplier: RentMultiplier { one: 4, both: 10 },
            }),
        ];
        for p in &mut state.players {
            p.cash = 500;
        }
        state
    }

    #[test]
    fn doubles_base_rent_when_owning_full_sector_with_no_upgrades() {
        let mut state = mini_state();
        state.properties.insert(1, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 1, 7), 10);
        state.properties.insert(2, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 1, 7), 20);
        state.properties.get_mut(&1).unwrap().upgrades = 2;
        assert_eq!(calc_rent(&state, 1, 7), 30);
    }

    #[test]
    fn returns_zero_if_mortgaged_or_unowned() {
        let mut state = mini_state();
        assert_eq!(calc_rent(&state, 1, 7), 0);
        state.properties.insert(
            1,
            PropertyState {
                owner_id: 0,
                upgrades: 0,
                mortgaged: true,
            },
        );
        assert_eq!(calc_rent(&state, 1, 7), 0);
    }

    #[test]
    fn scales_etf_rent_by_ownership_count() {
        let mut state = mini_state();
        state.properties.insert(3, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 3, 7), 25);
        state.properties.insert(5, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 3, 7), 50);
        state.rent_policy.etf = EtfRentBasis::Flat;
        assert_eq!(calc_rent(&state, 3, 7), 25);
    }

    #[test]
    fn uses_dice_multiplier_for_index_funds() {
        let mut state = mini_state();
        state.properties.insert(4, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 4, 6), 24);
        state.properties.insert(6, PropertyState::owned_by(0));
        assert_eq!(calc_rent(&state, 4, 6), 60);
        state.rent_policy.index = IndexRentBasis::ExpectedTotal;
        assert_eq!(calc_rent(&state, 4, 6), 70);
    }

    #[test]
    fn payment_moves_cash_between_players() {
        let mut state = mini_state();
        let outcome = apply_payment(&mut state, 0, 120, Some(1));
        assert_eq!(outcome, PaymentOutcome::Paid);
        assert_eq!(state.players[0].cash, 380);
        assert_eq!(state.players[1].cash, 620);
    }

    #[test]
    fn insolvent_payer_goes_bankrupt_and_queues_properties() {
        let mut state = mini_state();
        state.properties.insert(1, PropertyState::owned_by(0));
        let outcome = apply_payment(&mut state, 0, 1_000, None);
        assert_eq!(outcome, PaymentOutcome::Bankrupt { recovered: 550 });
        assert!(state.players[0].bankrupt);
        assert_eq!(state.players[0].cash, 0);
        assert!(state.properties.is_empty());
        assert!(state.bank_auction_queue.contains(&1));
        assert_eq!(state.winner(), Some(1));
    }

    #[test]
    fn payments_never_leave_solvent_players_negative() {
        let mut state = mini_state();
        state.players.push(PlayerState::new(2, false));
        for amount in [100, 250, 400, 75, 900, 30] {
            apply_payment(&mut state, 0, amount, Some(2));
            apply_payment(&mut state, 1, amount, None);
            assert!(
                state
                    .players
                    .iter()
                    .filter(|p| !p.bankrupt)
                    .all(|p| p.cash >= 0)
            );
        }
    }
}
