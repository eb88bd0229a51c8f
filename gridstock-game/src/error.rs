//! Reasons an engine command can be refused.
//!
//! The engine validates every command before touching state, so a returned
//! violation always means the game is exactly as it was before the call.
use thiserror::Error;

use crate::trade::TradeError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("the game is over")]
    GameOver,
    #[error("an auction is in progress")]
    AuctionInProgress,
    #[error("no auction is in progress")]
    NoAuction,
    #[error("a buy decision is pending")]
    DecisionPending,
    #[error("no purchase is pending")]
    NoPendingPurchase,
    #[error("player {player} has already rolled this turn")]
    AlreadyRolled { player: usize },
    #[error("player {player} must roll before ending the turn")]
    MustRoll { player: usize },
    #[error("dice faces must be between 1 and 6 (got {0} and {1})")]
    InvalidDice(u8, u8),
    #[error("player {player} is not in jail")]
    NotInJail { player: usize },
    #[error("player {player} holds no release cards")]
    NoJailCard { player: usize },
    #[error("player {player} cannot afford {amount}")]
    InsufficientFunds { player: usize, amount: i64 },
    #[error("tile {tile} does not exist")]
    UnknownTile { tile: usize },
    #[error("tile {tile} cannot be owned")]
    NotOwnable { tile: usize },
    #[error("tile {tile} is not a company")]
    NotCompany { tile: usize },
    #[error("tile {tile} is not owned by player {player}")]
    NotOwner { tile: usize, player: usize },
    #[error("tile {tile} is mortgaged")]
    Mortgaged { tile: usize },
    #[error("tile {tile} is not mortgaged")]
    NotMortgaged { tile: usize },
    #[error("tile {tile} has upgrades and cannot be mortgaged")]
    Improved { tile: usize },
    #[error("player {player} does not hold every {sector} tile")]
    NoMonopoly { player: usize, sector: String },
    #[error("tile {tile} is already at the maximum level")]
    MaxUpgrades { tile: usize },
    #[error("tile {tile} must be built evenly with its sector")]
    UnevenBuild { tile: usize },
    #[error("tile {tile} has no upgrades to sell")]
    NoUpgrades { tile: usize },
    #[error("player {player} does not exist")]
    UnknownPlayer { player: usize },
    #[error("player names cannot be blank")]
    BlankName,
    #[error("save names cannot be blank")]
    BlankSaveName,
    #[error("there is nothing to undo")]
    NothingToUndo,
    #[error("save slot {name} not found")]
    MissingSave { name: String },
    #[error("storage failed: {0}")]
    Storage(String),
    #[error("timer was scheduled against an older state")]
    StaleTimer,
    #[error(transparent)]
    Trade(#[from] TradeError),
}
