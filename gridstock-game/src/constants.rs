//! Centralized balance and tuning constants for GridStock game logic.
//!
//! These values define the economy of the core simulation. Keeping them
//! together ensures that gameplay can only be adjusted via code changes
//! reviewed in version control, rather than through external JSON assets.

// Players ------------------------------------------------------------------
pub const START_CASH: i64 = 1_500;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;
pub const DEFAULT_PLAYER_COUNT: usize = 4;
pub const DEFAULT_AI_SLOTS: [usize; 2] = [2, 3];

// Movement and jail ---------------------------------------------------------
pub const GO_BONUS: i64 = 200;
pub const BAIL_AMOUNT: i64 = 50;
pub const JAIL_ATTEMPTS: u8 = 3;
pub const DOUBLES_TO_JAIL: u8 = 3;
/// Fallback jail position for boards that do not define a jail tile.
pub const DEFAULT_JAIL_INDEX: usize = 10;
pub const DIE_FACES: u8 = 6;

// Property improvements -----------------------------------------------------
pub const MAX_UPGRADES: u8 = 5;
/// Mortgages and upgrade sales refund half of the listed amount.
pub const LIQUIDATION_DIVISOR: i64 = 2;
/// Lifting a mortgage costs 55% of the listed price, rounded up.
pub const UNMORTGAGE_NUMERATOR: i64 = 55;
pub const UNMORTGAGE_DENOMINATOR: i64 = 100;

// Auctions ------------------------------------------------------------------
pub const AUCTION_SECONDS: u32 = 12;
pub const BID_INCREMENT: i64 = 10;
pub const MIN_OPENING_BID: i64 = 10;

// Computer players ----------------------------------------------------------
pub const AI_BUY_CASH_RATIO: f64 = 1.2;
pub const AI_BID_CASH_FRACTION: f64 = 0.8;
pub const AI_BID_PRICE_MULTIPLE: f64 = 1.4;
/// Bid ceiling used for tiles without a listed price.
pub const AI_FALLBACK_DESIRE: i64 = 200;
/// Computer players keep at least this much cash after paying bail.
pub const AI_BAIL_RESERVE: i64 = 200;
/// Computer players only build when at least this much cash is left afterwards.
pub const AI_BUILD_RESERVE: i64 = 300;

// Scheduling ----------------------------------------------------------------
pub const AI_TURN_DELAY_MS: u64 = 600;
pub const AI_BID_DELAY_MS: u64 = 500;
pub const AUCTION_TICK_MS: u64 = 1_000;
pub const DEFAULT_AUTO_END_TURN_MS: u64 = 20_000;

// Session -------------------------------------------------------------------
pub const LOG_CAPACITY: usize = 40;
pub const AUTOSAVE_SLOT: &str = "Autosave";
pub const GAME_TITLE: &str = "S&P 500 Edition";
