//! GridStock Game Engine
//!
//! Platform-agnostic core rules for GridStock, a turn-based stock-market board
//! game. The crate owns the board catalog, the turn state machine, auctions,
//! bankruptcy, trades and the save/undo session, without any rendering or
//! platform dependencies.

pub mod ai;
pub mod auction;
pub mod bankruptcy;
pub mod board;
pub mod cards;
pub mod constants;
pub mod economy;
pub mod error;
pub mod numbers;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod state;
pub mod storage;
pub mod trade;
pub mod turn;

// Re-export commonly used types
pub use ai::{AutoAction, ComputerPolicy};
pub use auction::{AuctionReason, AuctionResult, AuctionState, AuctionStatus};
pub use board::{BoardCatalog, Card, CardEffect, CatalogError, DeckKind, FundKind, Tile};
pub use economy::{EtfRentBasis, IndexRentBasis, PaymentOutcome, RentPolicy, calc_rent};
pub use error::RuleViolation;
pub use schedule::{Generation, ScheduledEvent, TimerKind};
pub use session::{CommandOutcome, GameSession};
pub use settings::Settings;
pub use state::{GameState, PendingAction, PlayerState, PropertyState, TurnPhase};
pub use storage::{JsonFileStorage, MemoryStorage, SaveSlot, SaveSummary, StorageError};
pub use trade::{CashDirection, TradeError, TradeOffer};

/// Trait for abstracting save/load operations.
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Summaries of every stored slot, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the stored slots cannot be read.
    fn list_saves(&self) -> Result<Vec<SaveSummary>, Self::Error>;

    /// Save a slot, replacing any slot with the same name
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be saved.
    fn save_game(&self, slot: &SaveSlot) -> Result<(), Self::Error>;

    /// Load a slot by name
    ///
    /// # Errors
    ///
    /// Returns an error if the stored slots cannot be read.
    fn load_game(&self, save_name: &str) -> Result<Option<SaveSlot>, Self::Error>;

    /// Delete saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;

    /// Load the stored new-game settings
    ///
    /// # Errors
    ///
    /// Returns an error if the settings exist but cannot be read.
    fn load_settings(&self) -> Result<Option<Settings>, Self::Error>;

    /// Store new-game settings
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    fn save_settings(&self, settings: &Settings) -> Result<(), Self::Error>;
}
