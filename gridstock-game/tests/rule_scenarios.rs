use std::collections::BTreeSet;

use gridstock_game::auction::{AuctionReason, start_auction};
use gridstock_game::bankruptcy::liquidation_value;
use gridstock_game::constants::{AUCTION_SECONDS, AUTOSAVE_SLOT, GO_BONUS, START_CASH};
use gridstock_game::economy::apply_payment;
use gridstock_game::state::init_players;
use gridstock_game::trade::execute_trade;
use gridstock_game::turn::{self, move_by};
use gridstock_game::{
    AuctionResult, AuctionStatus, BoardCatalog, CashDirection, GameSession, GameState,
    GameStorage, MemoryStorage, PaymentOutcome, PropertyState, RuleViolation, SaveSlot, Settings,
    Tile, TradeError, TradeOffer, TurnPhase,
};

const GE: usize = 19;
const AAPL: usize = 39;
const MSFT: usize = 37;
const NEE: usize = 1;
const DUK: usize = 3;

fn table(players: usize, seed: u64) -> GameState {
    GameState::new(BoardCatalog::sp500(), init_players(players, &[]), seed)
}

fn humans(count: usize) -> Settings {
    Settings {
        player_count: count,
        ai_slots: BTreeSet::new(),
        auto_end_turn_ms: 20_000,
    }
}

/// Seat a prepared state in a session through the autosave slot.
fn session_from(state: GameState) -> GameSession<MemoryStorage> {
    let storage = MemoryStorage::default();
    storage
        .save_game(&SaveSlot::now(AUTOSAVE_SLOT, state))
        .unwrap();
    storage.save_settings(&humans(3)).unwrap();
    GameSession::open(storage, 1).unwrap()
}

#[test]
fn declined_company_goes_to_the_last_bidder_standing() {
    let mut state = table(3, 40);
    state.players[0].position = 14;
    turn::roll_with(&mut state, 2, 3).unwrap();
    assert_eq!(
        state.phase(),
        TurnPhase::AwaitingBuyDecision { tile_index: GE }
    );

    let mut auction = turn::decline_buy(&mut state).unwrap().unwrap();
    assert_eq!(auction.participants.as_slice(), &[0, 1, 2]);
    assert_eq!(auction.reason, AuctionReason::Declined);

    assert_eq!(auction.bid(&mut state), AuctionStatus::Open);
    assert_eq!(auction.bid(&mut state), AuctionStatus::Open);
    assert_eq!(auction.pass(&mut state), AuctionStatus::Open);
    while auction.high_bid < 220 {
        assert_eq!(auction.bid(&mut state), AuctionStatus::Open);
    }
    assert_eq!(auction.high_bidder, Some(1));
    assert_eq!(auction.current_bidder(), Some(0));

    let result = auction.pass(&mut state);
    assert_eq!(
        result,
        AuctionStatus::Closed(AuctionResult::Sold {
            tile_index: GE,
            winner: 1,
            price: 220,
        })
    );
    assert_eq!(state.players[1].cash, START_CASH - 220);
    assert_eq!(state.players[0].cash, START_CASH);
    assert_eq!(state.properties[&GE], PropertyState::owned_by(1));
}

#[test]
fn liquidation_covers_a_debt_beyond_cash() {
    let mut state = table(2, 41);
    if let Tile::Company(company) = &mut state.tiles[AAPL] {
        company.price = 600;
    }
    state.properties.insert(AAPL, PropertyState::owned_by(0));
    assert_eq!(liquidation_value(&state, 0), 1_800);

    let outcome = apply_payment(&mut state, 0, 1_600, Some(1));
    assert_eq!(outcome, PaymentOutcome::Paid);
    assert!(!state.players[0].bankrupt);
    assert_eq!(state.players[0].cash, 200);
    assert!(state.properties[&AAPL].mortgaged);
    assert_eq!(state.players[1].cash, START_CASH + 1_600);
}

#[test]
fn unpayable_rent_between_the_last_two_ends_the_game() {
    let mut state = table(2, 42);
    state.properties.insert(MSFT, PropertyState::owned_by(1));
    state.properties.insert(
        AAPL,
        PropertyState {
            upgrades: 5,
            ..PropertyState::owned_by(1)
        },
    );
    state.properties.insert(
        NEE,
        PropertyState {
            mortgaged: true,
            ..PropertyState::owned_by(0)
        },
    );
    state.players[0].cash = 50;
    state.players[0].position = 37;

    turn::roll_with(&mut state, 1, 1).unwrap();

    let loser = &state.players[0];
    assert!(loser.bankrupt);
    assert_eq!(loser.cash, 0);
    assert_eq!(state.players[1].cash, START_CASH + 50);
    assert!(!state.properties.contains_key(&NEE));
    assert!(state.bank_auction_queue.contains(&NEE));
    assert_eq!(state.winner(), Some(1));
    assert_eq!(state.phase(), TurnPhase::GameOver { winner: 1 });
    assert!(state.log.iter().any(|line| line.contains("wins the game")));
    assert_eq!(turn::roll(&mut state), Err(RuleViolation::GameOver));
}

#[test]
fn bankrupt_holdings_are_auctioned_while_others_play_on() {
    let mut state = table(3, 43);
    state.properties.insert(MSFT, PropertyState::owned_by(1));
    state.properties.insert(
        AAPL,
        PropertyState {
            upgrades: 5,
            ..PropertyState::owned_by(1)
        },
    );
    state.properties.insert(
        NEE,
        PropertyState {
            mortgaged: true,
            ..PropertyState::owned_by(0)
        },
    );
    state.players[0].cash = 50;
    state.players[0].position = 37;
    let mut session = session_from(state);

    assert!(session.roll_with(1, 1).is_applied());
    assert!(session.state().players[0].bankrupt);
    assert!(session.state().bank_auction_queue.is_empty());
    assert_eq!(session.state().winner(), None);
    let auction = session.auction().expect("repossessed tile is auctioned");
    assert_eq!(auction.tile_index, NEE);
    assert_eq!(auction.reason, AuctionReason::Bankruptcy);
    assert_eq!(auction.participants.as_slice(), &[1, 2]);

    assert!(session.bid().is_applied());
    assert!(session.pass().is_applied());
    assert!(session.auction().is_none());
    assert_eq!(session.state().properties[&NEE].owner_id, 1);
    assert_eq!(session.state().current_player, 1);
}

#[test]
fn failed_trade_is_atomic_and_valid_trade_swaps() {
    let mut state = table(2, 44);
    state.properties.insert(
        NEE,
        PropertyState {
            upgrades: 1,
            ..PropertyState::owned_by(0)
        },
    );
    state.properties.insert(DUK, PropertyState::owned_by(1));
    let before = serde_json::to_vec(&state).unwrap();

    let bad = TradeOffer {
        proposer: 0,
        target: 1,
        give: Some(DUK),
        receive: Some(NEE),
        cash: 0,
        direction: CashDirection::ProposerPays,
    };
    assert_eq!(
        execute_trade(&mut state, &bad),
        Err(TradeError::NotOwned {
            player: 0,
            tile: DUK
        })
    );
    assert_eq!(serde_json::to_vec(&state).unwrap(), before);

    let good = TradeOffer {
        give: Some(NEE),
        receive: Some(DUK),
        cash: 25,
        ..bad
    };
    execute_trade(&mut state, &good).unwrap();
    assert_eq!(state.properties[&NEE], PropertyState::owned_by(1));
    assert_eq!(state.properties[&DUK], PropertyState::owned_by(0));
    assert_eq!(state.players[0].cash, START_CASH - 25);
    assert_eq!(state.players[1].cash, START_CASH + 25);
}

#[test]
fn go_bonus_is_paid_once_per_lap() {
    let mut state = table(2, 45);
    state.players[0].position = 1;
    for _ in 0..40 {
        move_by(&mut state, 0, 7);
    }
    assert_eq!(state.players[0].position, 1);
    assert_eq!(state.players[0].cash, START_CASH + 7 * GO_BONUS);

    move_by(&mut state, 0, 80);
    assert_eq!(state.players[0].cash, START_CASH + 9 * GO_BONUS);

    move_by(&mut state, 0, -3);
    assert_eq!(state.players[0].position, 38);
    assert_eq!(state.players[0].cash, START_CASH + 9 * GO_BONUS);
}

#[test]
fn landing_exactly_on_go_pays_twice() {
    let mut state = table(2, 46);
    state.players[0].position = 38;
    turn::roll_with(&mut state, 1, 1).unwrap();
    assert_eq!(state.players[0].position, 0);
    assert_eq!(state.players[0].cash, START_CASH + 2 * GO_BONUS);
}

#[test]
fn third_double_in_a_turn_goes_to_jail() {
    let mut session = GameSession::new(MemoryStorage::default(), humans(2), 47);
    assert!(session.roll_with(2, 2).is_applied());
    assert!(session.roll_with(1, 1).is_applied());
    assert!(session.buy().is_applied());
    assert!(session.roll_with(3, 3).is_applied());

    let state = session.state();
    let player = &state.players[0];
    assert!(player.in_jail);
    assert_eq!(player.position, 10);
    assert_eq!(state.consecutive_doubles, 0);
    assert_eq!(state.phase(), TurnPhase::TurnComplete);
    assert_eq!(
        session.roll(),
        gridstock_game::CommandOutcome::Rejected(RuleViolation::AlreadyRolled { player: 0 })
    );
}

#[test]
fn upgrades_need_the_sector_and_stay_even_and_bounded() {
    let mut state = table(2, 48);
    state.properties.insert(NEE, PropertyState::owned_by(0));
    assert!(matches!(
        turn::upgrade(&mut state, NEE),
        Err(RuleViolation::NoMonopoly { player: 0, .. })
    ));

    state.properties.insert(DUK, PropertyState::owned_by(0));
    turn::upgrade(&mut state, NEE).unwrap();
    assert_eq!(
        turn::upgrade(&mut state, NEE),
        Err(RuleViolation::UnevenBuild { tile: NEE })
    );
    for _ in 0..4 {
        turn::upgrade(&mut state, DUK).unwrap();
        turn::upgrade(&mut state, NEE).unwrap();
    }
    turn::upgrade(&mut state, DUK).unwrap();
    assert_eq!(state.properties[&NEE].upgrades, 5);
    assert_eq!(state.properties[&DUK].upgrades, 5);
    assert_eq!(
        turn::upgrade(&mut state, NEE),
        Err(RuleViolation::MaxUpgrades { tile: NEE })
    );
    assert_eq!(state.players[0].cash, START_CASH - 10 * 50);
}

#[test]
fn silent_auction_closes_within_its_time_bound() {
    let mut state = table(4, 49);
    let mut auction = start_auction(&mut state, GE, AuctionReason::Declined).unwrap();
    let bound = auction.participants.len() * usize::try_from(AUCTION_SECONDS).unwrap();
    let mut ticks = 0;
    let result = loop {
        ticks += 1;
        assert!(ticks <= bound, "auction ran past {bound} seconds");
        if let AuctionStatus::Closed(result) = auction.tick(&mut state, 1) {
            break result;
        }
    };
    assert_eq!(result, AuctionResult::NoBids { tile_index: GE });
    assert!(!state.properties.contains_key(&GE));
}
