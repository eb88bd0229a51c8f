use std::fs;
use std::path::PathBuf;

use gridstock_game::constants::{AUTOSAVE_SLOT, START_CASH};
use gridstock_game::state::init_players;
use gridstock_game::{
    BoardCatalog, GameSession, GameState, GameStorage, JsonFileStorage, PendingAction,
    PropertyState, Settings, Tile,
};
use serde_json::Value;

fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gridstock-{label}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn game_state_serializes_as_plain_camel_case_record() {
    let mut state = GameState::new(BoardCatalog::sp500(), init_players(2, &[1]), 9);
    state.properties.insert(5, PropertyState::owned_by(1));
    state.pending = PendingAction::Buy { tile_index: 6 };
    let value = serde_json::to_value(&state).unwrap();

    for key in [
        "tiles",
        "properties",
        "players",
        "currentPlayer",
        "consecutiveDoubles",
        "bankAuctionQueue",
        "marketDeck",
        "companyDeck",
        "discardMarket",
        "discardCompany",
        "lastRoll",
        "log",
        "pending",
        "rentPolicy",
        "seed",
        "rngCursor",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["players"][1]["isAI"], Value::Bool(true));
    assert_eq!(value["players"][0]["jailTurns"], 3);
    assert_eq!(value["properties"]["5"]["ownerId"], 1);
    assert_eq!(value["pending"]["type"], "buy");
    assert_eq!(value["pending"]["tileIndex"], 6);
    assert_eq!(value["tiles"][0]["kind"], "go");
    assert_eq!(value["tiles"][1]["kind"], "company");
    assert_eq!(value["tiles"][1]["upgradeCost"], 50);
}

#[test]
fn sparse_legacy_save_loads_with_defaults() {
    let legacy = r#"{
        "players": [
            {"name": "Ada", "cash": 900, "position": 44},
            {"name": "", "isAI": true},
            {"name": "Cy", "bankrupt": true}
        ],
        "currentPlayer": 2,
        "properties": {"11": {"ownerId": 0}, "12": {"ownerId": 2}},
        "bankAuctionQueue": [11, 13, 99]
    }"#;
    let state: GameState = serde_json::from_str(legacy).unwrap();
    let state = state.normalize(BoardCatalog::sp500());

    assert_eq!(state.players.len(), 3);
    assert_eq!(state.players[0].position, 4);
    assert_eq!(state.players[1].name, "Player 2");
    assert!(state.players[1].is_ai);
    assert_eq!(state.players[1].cash, 0);
    assert_eq!(state.current_player, 0, "bankrupt seat is skipped");
    assert_eq!(state.properties.len(), 1);
    assert_eq!(state.bank_auction_queue.iter().copied().collect::<Vec<_>>(), [13]);
    assert_eq!(state.market_deck.len(), 10);
    assert_eq!(state.company_deck.len(), 13);
    assert!(matches!(state.tiles[12], Tile::Index(_)));
}

#[test]
fn file_backed_session_resumes_where_it_left_off() {
    let dir = scratch_dir("resume");
    let settings = Settings {
        player_count: 3,
        ..Settings::default()
    }
    .normalized();
    {
        let mut session = GameSession::new(JsonFileStorage::new(&dir), settings.clone(), 21);
        assert!(session.apply_settings(settings.clone()).is_applied());
        assert!(session.roll_with(2, 4).is_applied());
        assert!(session.buy().is_applied());
        assert!(session.save("Before lunch").is_applied());
    }

    let storage = JsonFileStorage::new(&dir);
    assert_eq!(storage.load_settings().unwrap(), Some(settings));
    let names: Vec<String> = storage
        .list_saves()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n == AUTOSAVE_SLOT));

    let session = GameSession::open(storage, 0).unwrap();
    let state = session.state();
    assert_eq!(state.players.len(), 3);
    assert!(state.players[2].is_ai);
    assert_eq!(state.properties[&6], PropertyState::owned_by(0));
    assert_eq!(state.players[0].cash, START_CASH - 100);

    let raw: Value =
        serde_json::from_str(&fs::read_to_string(dir.join("saves.json")).unwrap()).unwrap();
    assert!(raw.as_array().is_some_and(|slots| slots
        .iter()
        .all(|slot| slot["updatedAt"].is_i64() && slot["state"].is_object())));
    let _ = fs::remove_dir_all(&dir);
}
