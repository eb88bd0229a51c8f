use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::board::{BoardCatalog, Card, DeckKind, Tile};
use crate::constants::{
    DEFAULT_PLAYER_COUNT, DIE_FACES, GAME_TITLE, JAIL_ATTEMPTS, LOG_CAPACITY, MAX_UPGRADES,
    START_CASH,
};
use crate::economy::RentPolicy;

/// Ownership record for a purchased tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyState {
    pub owner_id: usize,
    #[serde(default)]
    pub upgrades: u8,
    #[serde(default)]
    pub mortgaged: bool,
}

impl PropertyState {
    #[must_use]
    pub const fn owned_by(owner_id: usize) -> Self {
        Self {
            owner_id,
            upgrades: 0,
            mortgaged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub id: usize,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "isAI")]
    pub is_ai: bool,
    #[serde(default)]
    pub cash: i64,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub in_jail: bool,
    #[serde(default = "default_jail_turns")]
    pub jail_turns: u8,
    #[serde(default)]
    pub get_out_of_jail: u32,
    #[serde(default)]
    pub bankrupt: bool,
}

const fn default_jail_turns() -> u8 {
    JAIL_ATTEMPTS
}

impl PlayerState {
    #[must_use]
    pub fn new(id: usize, is_ai: bool) -> Self {
        Self {
            id,
            name: format!("Player {}", id + 1),
            is_ai,
            cash: START_CASH,
            position: 0,
            in_jail: false,
            jail_turns: JAIL_ATTEMPTS,
            get_out_of_jail: 0,
            bankrupt: false,
        }
    }
}

/// Build the starting roster; `ai_slots` lists seat indices driven by the computer.
#[must_use]
pub fn init_players(count: usize, ai_slots: &[usize]) -> Vec<PlayerState> {
    (0..count)
        .map(|id| PlayerState::new(id, ai_slots.contains(&id)))
        .collect()
}

/// Decision the active player owes before the turn can finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingAction {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    Buy { tile_index: usize },
}

/// Where the active player stands in the turn cycle. Derived from `GameState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    AwaitingRoll,
    InJail,
    AwaitingBuyDecision { tile_index: usize },
    TurnComplete,
    GameOver { winner: usize },
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingRoll => f.write_str("awaiting roll"),
            Self::InJail => f.write_str("in jail"),
            Self::AwaitingBuyDecision { tile_index } => {
                write!(f, "awaiting buy decision on tile {tile_index}")
            }
            Self::TurnComplete => f.write_str("turn complete"),
            Self::GameOver { winner } => write!(f, "game over (player {winner} wins)"),
        }
    }
}

/// The single source of truth for a running game.
///
/// Every field defaults so that saves written by older builds still load;
/// [`GameState::normalize`] then re-derives anything that went missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameState {
    pub tiles: Vec<Tile>,
    pub properties: BTreeMap<usize, PropertyState>,
    pub players: Vec<PlayerState>,
    pub current_player: usize,
    pub consecutive_doubles: u8,
    pub bank_auction_queue: VecDeque<usize>,
    pub market_deck: Vec<Card>,
    pub company_deck: Vec<Card>,
    pub discard_market: Vec<Card>,
    pub discard_company: Vec<Card>,
    pub last_roll: Option<(u8, u8)>,
    /// Oldest first, capped at [`LOG_CAPACITY`].
    pub log: Vec<String>,
    pub pending: PendingAction,
    pub rent_policy: RentPolicy,
    pub seed: u64,
    /// Position in the dice/shuffle stream, so a restored save keeps rolling the same dice.
    pub rng_cursor: u64,
    #[serde(skip)]
    rng: Option<ChaCha20Rng>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            tiles: Vec::new(),
            properties: BTreeMap::new(),
            players: Vec::new(),
            current_player: 0,
            consecutive_doubles: 0,
            bank_auction_queue: VecDeque::new(),
            market_deck: Vec::new(),
            company_deck: Vec::new(),
            discard_market: Vec::new(),
            discard_company: Vec::new(),
            last_roll: None,
            log: Vec::new(),
            pending: PendingAction::None,
            rent_policy: RentPolicy::default(),
            seed: 0,
            rng_cursor: 0,
            rng: None,
        }
    }
}

impl GameState {
    /// Start a fresh game on `catalog` with freshly shuffled decks.
    #[must_use]
    pub fn new(catalog: &BoardCatalog, players: Vec<PlayerState>, seed: u64) -> Self {
        let mut state = Self {
            tiles: catalog.tiles.clone(),
            players,
            seed,
            rng: Some(ChaCha20Rng::seed_from_u64(seed)),
            ..Self::default()
        };
        state.market_deck = state.shuffled(catalog.market_cards.clone());
        state.company_deck = state.shuffled(catalog.company_cards.clone());
        state.push_log(format!("Game start: {GAME_TITLE}"));
        state
    }

    /// Repair a state that came from storage so every invariant holds again.
    #[must_use]
    pub fn normalize(mut self, catalog: &BoardCatalog) -> Self {
        if self.tiles.is_empty() {
            self.tiles = catalog.tiles.clone();
        }
        if self.players.is_empty() {
            self.players = init_players(DEFAULT_PLAYER_COUNT, &[]);
        }
        for (idx, player) in self.players.iter_mut().enumerate() {
            player.id = idx;
            if player.name.trim().is_empty() {
                player.name = format!("Player {}", idx + 1);
            }
            player.position %= self.tiles.len();
            if !(1..=JAIL_ATTEMPTS).contains(&player.jail_turns) {
                player.jail_turns = JAIL_ATTEMPTS;
            }
        }
        self.rng = None;
        if self.market_deck.is_empty() && self.discard_market.is_empty() {
            self.market_deck = self.shuffled(catalog.market_cards.clone());
        }
        if self.company_deck.is_empty() && self.discard_company.is_empty() {
            self.company_deck = self.shuffled(catalog.company_cards.clone());
        }

        let tiles = &self.tiles;
        let players = &self.players;
        self.properties.retain(|idx, prop| {
            tiles.get(*idx).is_some_and(Tile::is_ownable)
                && players.get(prop.owner_id).is_some_and(|p| !p.bankrupt)
        });
        for prop in self.properties.values_mut() {
            prop.upgrades = prop.upgrades.min(MAX_UPGRADES);
        }
        let properties = &self.properties;
        self.bank_auction_queue.retain(|idx| {
            tiles.get(*idx).is_some_and(Tile::is_ownable) && !properties.contains_key(idx)
        });

        if let PendingAction::Buy { tile_index } = self.pending
            && (!tiles.get(tile_index).is_some_and(Tile::is_ownable)
                || self.properties.contains_key(&tile_index))
        {
            self.pending = PendingAction::None;
        }

        if self.current_player >= self.players.len() {
            self.current_player = 0;
        }
        if self.players[self.current_player].bankrupt && self.winner().is_none() {
            self.advance_turn();
        }
        self
    }

    /// Append a line to the user-visible log, dropping the oldest past capacity.
    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.log.push(msg.into());
        if self.log.len() > LOG_CAPACITY {
            let overflow = self.log.len() - LOG_CAPACITY;
            self.log.drain(..overflow);
        }
    }

    #[must_use]
    pub fn current(&self) -> &PlayerState {
        &self.players[self.current_player]
    }

    #[must_use]
    pub fn player_name(&self, id: usize) -> &str {
        self.players.get(id).map_or("?", |p| p.name.as_str())
    }

    #[must_use]
    pub fn tile_label(&self, idx: usize) -> &str {
        self.tiles.get(idx).map_or("?", Tile::label)
    }

    /// Players still in the game.
    pub fn active_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| !p.bankrupt)
    }

    /// The last solvent player, once every other player is bankrupt.
    #[must_use]
    pub fn winner(&self) -> Option<usize> {
        let mut alive = self.active_players();
        match (alive.next(), alive.next()) {
            (Some(only), None) if self.players.len() > 1 => Some(only.id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Whether the current player may roll (again) this turn.
    #[must_use]
    pub fn can_roll(&self) -> bool {
        matches!(self.pending, PendingAction::None)
            && (self.last_roll.is_none() || self.consecutive_doubles > 0)
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        if let Some(winner) = self.winner() {
            return TurnPhase::GameOver { winner };
        }
        if let PendingAction::Buy { tile_index } = self.pending {
            return TurnPhase::AwaitingBuyDecision { tile_index };
        }
        if self.current().in_jail && self.last_roll.is_none() {
            return TurnPhase::InJail;
        }
        if self.can_roll() {
            TurnPhase::AwaitingRoll
        } else {
            TurnPhase::TurnComplete
        }
    }

    #[must_use]
    pub fn roll_total(&self) -> i64 {
        self.last_roll
            .map_or(0, |(d1, d2)| i64::from(d1) + i64::from(d2))
    }

    /// Tile indices owned by `player`, in board order.
    #[must_use]
    pub fn owned_by(&self, player: usize) -> Vec<usize> {
        self.properties
            .iter()
            .filter(|(_, prop)| prop.owner_id == player)
            .map(|(idx, _)| *idx)
            .collect()
    }

    /// Hand the turn to the next solvent player and clear per-turn state.
    pub fn advance_turn(&mut self) {
        let count = self.players.len();
        if count == 0 {
            return;
        }
        let mut next = (self.current_player + 1) % count;
        for _ in 0..count {
            if !self.players[next].bankrupt {
                break;
            }
            next = (next + 1) % count;
        }
        self.current_player = next;
        self.last_roll = None;
        self.consecutive_doubles = 0;
        self.pending = PendingAction::None;
    }

    pub(crate) fn deck_mut(&mut self, deck: DeckKind) -> (&mut Vec<Card>, &mut Vec<Card>) {
        match deck {
            DeckKind::Market => (&mut self.market_deck, &mut self.discard_market),
            DeckKind::Company => (&mut self.company_deck, &mut self.discard_company),
        }
    }

    fn rng(&mut self) -> &mut ChaCha20Rng {
        let (seed, cursor) = (self.seed, self.rng_cursor);
        self.rng.get_or_insert_with(|| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            rng.set_word_pos(u128::from(cursor));
            rng
        })
    }

    fn sync_rng_cursor(&mut self) {
        if let Some(rng) = self.rng.as_ref() {
            self.rng_cursor = u64::try_from(rng.get_word_pos()).unwrap_or(u64::MAX);
        }
    }

    /// Two independent uniform die faces.
    pub fn roll_dice(&mut self) -> (u8, u8) {
        let rng = self.rng();
        let d1 = rng.gen_range(1..=DIE_FACES);
        let d2 = rng.gen_range(1..=DIE_FACES);
        self.sync_rng_cursor();
        (d1, d2)
    }

    #[must_use]
    pub fn shuffled(&mut self, mut cards: Vec<Card>) -> Vec<Card> {
        cards.shuffle(self.rng());
        self.sync_rng_cursor();
        cards
    }
}
