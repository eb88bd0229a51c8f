//! Board layout and event-card catalog.
//!
//! The catalog is read-only input to the engine. Games shuffle working copies
//! of the decks; the tiles themselves are never mutated.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::constants::DEFAULT_JAIL_INDEX;
use crate::numbers::{floor_f64_to_i64, i64_to_f64};

/// Which event deck a card or event tile refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeckKind {
    #[default]
    Market,
    Company,
}

impl DeckKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Company => "company",
        }
    }
}

impl fmt::Display for DeckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownable kinds that a `moveToNearest` card can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundKind {
    Etf,
    Index,
}

/// A single company stock tile, grouped into sectors for monopolies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTile {
    pub id: String,
    pub ticker: String,
    pub name: String,
    pub sector: String,
    #[serde(default)]
    pub color: String,
    pub price: i64,
    pub upgrade_cost: i64,
    /// Rent by upgrade level 0-5.
    pub rents: [i64; 6],
}

/// Exchange-traded fund; rent scales with how many ETFs the owner holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtfTile {
    pub id: String,
    pub ticker: String,
    pub price: i64,
    pub rent_scale: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentMultiplier {
    pub one: i64,
    pub both: i64,
}

/// Index fund; rent is a multiple of the dice total that brought the payer here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTile {
    pub id: String,
    pub ticker: String,
    pub price: i64,
    pub rent_multiplier: RentMultiplier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTile {
    pub label: String,
    #[serde(default)]
    pub flat: Option<i64>,
    /// Fraction of the payer's current cash.
    #[serde(default)]
    pub percent: Option<f64>,
}

impl TaxTile {
    /// Amount charged to a player holding `cash`, never negative.
    #[must_use]
    pub fn charge_for(&self, cash: i64) -> i64 {
        let percent_charge = self
            .percent
            .map_or(0, |pct| floor_f64_to_i64(i64_to_f64(cash.max(0)) * pct));
        (self.flat.unwrap_or(0) + percent_charge).max(0)
    }
}

/// One cell of the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Tile {
    Go {
        #[serde(default)]
        label: String,
    },
    Company(CompanyTile),
    Etf(EtfTile),
    Index(IndexTile),
    Event {
        deck: DeckKind,
    },
    Tax(TaxTile),
    Jail {
        #[serde(default)]
        label: String,
    },
    Free {
        #[serde(default)]
        label: String,
    },
    GoToJail {
        #[serde(default)]
        label: String,
    },
}

impl Tile {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Go { .. } => "go",
            Self::Company(_) => "company",
            Self::Etf(_) => "etf",
            Self::Index(_) => "index",
            Self::Event { .. } => "event",
            Self::Tax(_) => "tax",
            Self::Jail { .. } => "jail",
            Self::Free { .. } => "free",
            Self::GoToJail { .. } => "gotojail",
        }
    }

    #[must_use]
    pub const fn is_ownable(&self) -> bool {
        matches!(self, Self::Company(_) | Self::Etf(_) | Self::Index(_))
    }

    /// Listed purchase price for ownable tiles.
    #[must_use]
    pub const fn price(&self) -> Option<i64> {
        match self {
            Self::Company(c) => Some(c.price),
            Self::Etf(e) => Some(e.price),
            Self::Index(i) => Some(i.price),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_company(&self) -> Option<&CompanyTile> {
        match self {
            Self::Company(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_fund(&self, kind: FundKind) -> bool {
        matches!(
            (self, kind),
            (Self::Etf(_), FundKind::Etf) | (Self::Index(_), FundKind::Index)
        )
    }

    /// Short label used in log lines.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Company(c) => c.ticker.as_str(),
            Self::Etf(e) => e.ticker.as_str(),
            Self::Index(i) => i.ticker.as_str(),
            Self::Tax(t) => t.label.as_str(),
            Self::Go { label }
            | Self::Jail { label }
            | Self::Free { label }
            | Self::GoToJail { label }
                if !label.is_empty() =>
            {
                label.as_str()
            }
            other => other.kind_name(),
        }
    }
}

/// What a drawn card does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CardEffect {
    Collect {
        amount: i64,
    },
    Pay {
        amount: i64,
    },
    CollectFromAll {
        amount: i64,
    },
    PayPerProperty {
        amount: i64,
    },
    Move {
        offset: i64,
    },
    Goto {
        position: usize,
    },
    MoveToNearest {
        kind: FundKind,
        #[serde(default, rename = "payDouble")]
        pay_double: bool,
    },
    UpgradeFree,
    MortgageRelief,
    Jail,
    Getout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub deck: DeckKind,
    pub text: String,
    pub effect: CardEffect,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct BoardFile {
    tiles: Vec<Tile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CardFile {
    market: Vec<Card>,
    company: Vec<Card>,
}

/// Errors raised when a catalog does not describe a playable board.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog data is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("board has no tiles")]
    EmptyBoard,
    #[error("tile 0 must be the go tile (found {found})")]
    MissingGo { found: &'static str },
    #[error("etf tile {index} has an empty rent scale")]
    EmptyRentScale { index: usize },
    #[error("{deck} deck is empty")]
    EmptyDeck { deck: DeckKind },
    #[error("card {card} targets position {position} on a board of {len} tiles")]
    CardTargetOutOfRange {
        card: String,
        position: usize,
        len: usize,
    },
    #[error("card {card} in the {deck} deck is tagged for the other deck")]
    MisfiledCard { card: String, deck: DeckKind },
}

/// Tiles plus the two authored event decks.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardCatalog {
    pub tiles: Vec<Tile>,
    pub market_cards: Vec<Card>,
    pub company_cards: Vec<Card>,
}

impl BoardCatalog {
    /// Parse and validate a catalog from a board document and a card document.
    ///
    /// # Errors
    ///
    /// Returns an error if either document fails to parse or the result is not playable.
    pub fn from_json(board_json: &str, cards_json: &str) -> Result<Self, CatalogError> {
        let board: BoardFile = serde_json::from_str(board_json)?;
        let cards: CardFile = serde_json::from_str(cards_json)?;
        let catalog = Self {
            tiles: board.tiles,
            market_cards: cards.market,
            company_cards: cards.company,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that the board can host a game.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let first = self.tiles.first().ok_or(CatalogError::EmptyBoard)?;
        if !matches!(first, Tile::Go { .. }) {
            return Err(CatalogError::MissingGo {
                found: first.kind_name(),
            });
        }
        for (index, tile) in self.tiles.iter().enumerate() {
            if let Tile::Etf(etf) = tile
                && etf.rent_scale.is_empty()
            {
                return Err(CatalogError::EmptyRentScale { index });
            }
        }
        for (deck, cards) in [
            (DeckKind::Market, &self.market_cards),
            (DeckKind::Company, &self.company_cards),
        ] {
            if cards.is_empty() {
                return Err(CatalogError::EmptyDeck { deck });
            }
            for card in cards {
                if card.deck != deck {
                    return Err(CatalogError::MisfiledCard {
                        card: card.id.clone(),
                        deck,
                    });
                }
                if let CardEffect::Goto { position } = card.effect
                    && position >= self.tiles.len()
                {
                    return Err(CatalogError::CardTargetOutOfRange {
                        card: card.id.clone(),
                        position,
                        len: self.tiles.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The bundled S&P 500 edition board and decks.
    ///
    /// # Panics
    ///
    /// Panics if the bundled assets are malformed, which the test suite guards against.
    #[must_use]
    pub fn sp500() -> &'static Self {
        static CATALOG: OnceLock<BoardCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    fn load_from_static() -> Self {
        match Self::from_json(
            include_str!("../assets/sp500_board.json"),
            include_str!("../assets/cards.json"),
        ) {
            Ok(catalog) => catalog,
            Err(err) => panic!("bundled GridStock catalog is invalid: {err}"),
        }
    }

    #[must_use]
    pub fn deck(&self, kind: DeckKind) -> &[Card] {
        match kind {
            DeckKind::Market => &self.market_cards,
            DeckKind::Company => &self.company_cards,
        }
    }
}

/// Index of the first jail tile, or the classic corner (wrapped onto short boards) if there is none.
#[must_use]
pub fn jail_index(tiles: &[Tile]) -> usize {
    tiles
        .iter()
        .position(|tile| matches!(tile, Tile::Jail { .. }))
        .unwrap_or(DEFAULT_JAIL_INDEX % tiles.len().max(1))
}

/// Walk forward from `from` (exclusive, wrapping) to the next fund of `kind`.
/// Returns `from` when the board has no such tile.
#[must_use]
pub fn nearest_fund(tiles: &[Tile], from: usize, kind: FundKind) -> usize {
    let len = tiles.len();
    (1..len)
        .map(|step| (from + step) % len)
        .find(|&idx| tiles[idx].is_fund(kind))
        .unwrap_or(from)
}

/// Tile indices of every company in `sector`.
#[must_use]
pub fn sector_indices(tiles: &[Tile], sector: &str) -> Vec<usize> {
    tiles
        .iter()
        .enumerate()
        .filter(|(_, tile)| tile.as_company().is_some_and(|c| c.sector == sector))
        .map(|(idx, _)| idx)
        .collect()
}
