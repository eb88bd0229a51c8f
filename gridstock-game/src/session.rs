//! A running table: one game, its open auction, a single undo level, and the
//! storage it autosaves into.
//!
//! Every user-facing command goes through [`GameSession`]. A command either
//! applies in full or is rejected with the state untouched; after an applied
//! command the session opens any queued bank auction, bumps its
//! [`Generation`] and writes the autosave slot.
use anyhow::Context;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::GameStorage;
use crate::ai::{AutoAction, ComputerPolicy};
use crate::auction::{AuctionResult, AuctionState, AuctionStatus, start_next_queued_auction};
use crate::board::BoardCatalog;
use crate::constants::AUTOSAVE_SLOT;
use crate::error::RuleViolation;
use crate::schedule::{self, Generation, ScheduledEvent, TimerKind};
use crate::settings::Settings;
use crate::state::{GameState, TurnPhase};
use crate::storage::{SaveSlot, SaveSummary};
use crate::trade::{TradeOffer, execute_trade};
use crate::turn;

/// What happened to a command.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Nothing changed.
    Rejected(RuleViolation),
}

impl CommandOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub const fn rejection(&self) -> Option<&RuleViolation> {
        match self {
            Self::Applied => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

impl From<Result<(), RuleViolation>> for CommandOutcome {
    fn from(result: Result<(), RuleViolation>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(reason) => Self::Rejected(reason),
        }
    }
}

fn derive_seed(seed: u64) -> u64 {
    ChaCha20Rng::seed_from_u64(seed).next_u64()
}

fn storage_failure(err: impl std::fmt::Display) -> RuleViolation {
    RuleViolation::Storage(err.to_string())
}

pub struct GameSession<S: GameStorage> {
    catalog: BoardCatalog,
    storage: S,
    settings: Settings,
    policy: ComputerPolicy,
    state: GameState,
    auction: Option<AuctionState>,
    undo: Option<GameState>,
    generation: Generation,
    next_seed: u64,
}

impl<S: GameStorage> GameSession<S> {
    /// Start a fresh game on the bundled S&P 500 board.
    pub fn new(storage: S, settings: Settings, seed: u64) -> Self {
        Self::with_catalog(BoardCatalog::sp500().clone(), storage, settings, seed)
    }

    pub fn with_catalog(catalog: BoardCatalog, storage: S, settings: Settings, seed: u64) -> Self {
        let settings = settings.normalized();
        let state = GameState::new(&catalog, settings.roster(), seed);
        Self {
            catalog,
            storage,
            settings,
            policy: ComputerPolicy::default(),
            state,
            auction: None,
            undo: None,
            generation: Generation::default(),
            next_seed: derive_seed(seed),
        }
    }

    /// Resume from storage: stored settings, and the autosave when there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be read.
    pub fn open(storage: S, seed: u64) -> anyhow::Result<Self> {
        let settings = storage
            .load_settings()
            .context("failed to read stored settings")?
            .unwrap_or_default();
        let autosave = storage
            .load_game(AUTOSAVE_SLOT)
            .context("failed to read the autosave slot")?;
        let mut session = Self::new(storage, settings, seed);
        if let Some(slot) = autosave {
            log::info!("resuming autosave from {}", slot.updated_at);
            session.restore(slot);
        }
        Ok(session)
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub const fn auction(&self) -> Option<&AuctionState> {
        self.auction.as_ref()
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn policy(&self) -> &ComputerPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ComputerPolicy) {
        self.policy = policy;
    }

    #[must_use]
    pub const fn catalog(&self) -> &BoardCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.state.phase()
    }

    // Turn commands -----------------------------------------------------------

    pub fn roll(&mut self) -> CommandOutcome {
        self.apply("roll", true, |s| {
            s.ensure_turn()?;
            turn::roll(&mut s.state).map(drop)
        })
    }

    pub fn roll_with(&mut self, d1: u8, d2: u8) -> CommandOutcome {
        self.apply("roll", true, |s| {
            s.ensure_turn()?;
            turn::roll_with(&mut s.state, d1, d2).map(drop)
        })
    }

    pub fn buy(&mut self) -> CommandOutcome {
        self.apply("buy", true, |s| {
            s.ensure_turn()?;
            let auction = turn::buy(&mut s.state)?;
            s.open_auction(auction);
            Ok(())
        })
    }

    pub fn decline_buy(&mut self) -> CommandOutcome {
        self.apply("decline", true, |s| {
            s.ensure_turn()?;
            let auction = turn::decline_buy(&mut s.state)?;
            s.open_auction(auction);
            Ok(())
        })
    }

    pub fn pay_bail(&mut self) -> CommandOutcome {
        self.apply("pay bail", true, |s| {
            s.ensure_turn()?;
            turn::pay_bail(&mut s.state)
        })
    }

    pub fn use_jail_card(&mut self) -> CommandOutcome {
        self.apply("use jail card", true, |s| {
            s.ensure_turn()?;
            turn::use_jail_card(&mut s.state)
        })
    }

    pub fn upgrade(&mut self, tile: usize) -> CommandOutcome {
        self.apply("upgrade", true, |s| {
            s.ensure_turn()?;
            turn::upgrade(&mut s.state, tile)
        })
    }

    pub fn sell_upgrade(&mut self, tile: usize) -> CommandOutcome {
        self.apply("sell upgrade", true, |s| {
            s.ensure_turn()?;
            turn::sell_upgrade(&mut s.state, tile)
        })
    }

    pub fn mortgage(&mut self, tile: usize) -> CommandOutcome {
        self.apply("mortgage", true, |s| {
            s.ensure_turn()?;
            turn::mortgage(&mut s.state, tile)
        })
    }

    pub fn unmortgage(&mut self, tile: usize) -> CommandOutcome {
        self.apply("unmortgage", true, |s| {
            s.ensure_turn()?;
            turn::unmortgage(&mut s.state, tile)
        })
    }

    pub fn propose_trade(&mut self, offer: &TradeOffer) -> CommandOutcome {
        self.apply("trade", true, |s| {
            s.ensure_turn()?;
            execute_trade(&mut s.state, offer)?;
            Ok(())
        })
    }

    pub fn end_turn(&mut self) -> CommandOutcome {
        self.apply("end turn", false, |s| {
            s.ensure_turn()?;
            turn::end_turn(&mut s.state)?;
            s.undo = None;
            Ok(())
        })
    }

    // Auction commands --------------------------------------------------------

    pub fn bid(&mut self) -> CommandOutcome {
        self.apply("bid", false, |s| s.step_auction(AuctionState::bid))
    }

    pub fn pass(&mut self) -> CommandOutcome {
        self.apply("pass", false, |s| s.step_auction(AuctionState::pass))
    }

    /// Run the active bidder's countdown by `seconds`.
    pub fn tick_auction(&mut self, seconds: u32) -> CommandOutcome {
        self.apply("auction tick", false, |s| {
            s.step_auction(|auction, state| auction.tick(state, seconds))
        })
    }

    // Session commands --------------------------------------------------------

    /// Step back to the state before the last undoable command of this turn.
    pub fn undo(&mut self) -> CommandOutcome {
        self.apply("undo", false, |s| {
            if s.auction.is_some() {
                return Err(RuleViolation::AuctionInProgress);
            }
            let previous = s.undo.take().ok_or(RuleViolation::NothingToUndo)?;
            s.state = previous;
            s.state.push_log("Undo");
            Ok(())
        })
    }

    pub fn rename_player(&mut self, player: usize, name: &str) -> CommandOutcome {
        self.apply("rename", false, |s| {
            let name = name.trim();
            if name.is_empty() {
                return Err(RuleViolation::BlankName);
            }
            let seat = s
                .state
                .players
                .get_mut(player)
                .ok_or(RuleViolation::UnknownPlayer { player })?;
            seat.name = name.to_owned();
            Ok(())
        })
    }

    /// Write the game to a named slot. Does not count as a state change.
    pub fn save(&mut self, name: &str) -> CommandOutcome {
        let name = name.trim();
        if name.is_empty() {
            return CommandOutcome::Rejected(RuleViolation::BlankSaveName);
        }
        let slot = SaveSlot::now(name, self.state.clone()).with_auction(self.auction.clone());
        match self.storage.save_game(&slot) {
            Ok(()) => {
                log::info!("saved slot {name}");
                CommandOutcome::Applied
            }
            Err(err) => CommandOutcome::Rejected(storage_failure(err)),
        }
    }

    pub fn load(&mut self, name: &str) -> CommandOutcome {
        self.apply("load", false, |s| {
            let slot = s
                .storage
                .load_game(name)
                .map_err(storage_failure)?
                .ok_or_else(|| RuleViolation::MissingSave {
                    name: name.to_owned(),
                })?;
            s.restore(slot);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns [`RuleViolation::Storage`] if the backend cannot be read.
    pub fn list_saves(&self) -> Result<Vec<SaveSummary>, RuleViolation> {
        self.storage.list_saves().map_err(storage_failure)
    }

    /// Persist new settings and restart under them.
    pub fn apply_settings(&mut self, settings: Settings) -> CommandOutcome {
        self.apply("apply settings", false, |s| {
            let settings = settings.normalized();
            s.storage
                .save_settings(&settings)
                .map_err(storage_failure)?;
            s.settings = settings;
            s.start_new_game();
            Ok(())
        })
    }

    /// Throw the current game away, autosave included, and deal a new one.
    pub fn reset_game(&mut self) -> CommandOutcome {
        self.apply("reset", false, |s| {
            s.storage
                .delete_save(AUTOSAVE_SLOT)
                .map_err(storage_failure)?;
            s.start_new_game();
            Ok(())
        })
    }

    // Scheduling --------------------------------------------------------------

    #[must_use]
    pub fn pending_automatic_action(&self) -> Option<AutoAction> {
        schedule::pending_automatic_action(&self.state, self.auction.as_ref(), &self.policy)
    }

    /// The event a host should arm next, if anything should happen unprompted.
    #[must_use]
    pub fn next_scheduled(&self) -> Option<ScheduledEvent> {
        schedule::plan_next(
            &self.state,
            self.auction.as_ref(),
            &self.policy,
            &self.settings,
            self.generation,
        )
    }

    /// Deliver an armed event. Events planned against an older state are refused.
    pub fn fire(&mut self, event: ScheduledEvent) -> CommandOutcome {
        if event.is_stale(self.generation) {
            log::debug!(
                "dropping {:?} planned at {}, now at {}",
                event.kind,
                event.generation,
                self.generation
            );
            return CommandOutcome::Rejected(RuleViolation::StaleTimer);
        }
        match event.kind {
            // One countdown tick is one second.
            TimerKind::AuctionCountdown => self.tick_auction(1),
            TimerKind::AutoEndTurn => self.end_turn(),
            TimerKind::ComputerAction(action) => self.perform(action),
        }
    }

    pub fn perform(&mut self, action: AutoAction) -> CommandOutcome {
        match action {
            AutoAction::Bid => self.bid(),
            AutoAction::Pass => self.pass(),
            AutoAction::Buy => self.buy(),
            AutoAction::DeclineBuy => self.decline_buy(),
            AutoAction::PayBail => self.pay_bail(),
            AutoAction::UseJailCard => self.use_jail_card(),
            AutoAction::Upgrade(tile) => self.upgrade(tile),
            AutoAction::Roll => self.roll(),
            AutoAction::EndTurn => self.end_turn(),
        }
    }

    /// Play computer actions back to back until a human must act, the game
    /// ends, or `limit` actions have run. Returns how many ran.
    pub fn run_automation(&mut self, limit: usize) -> usize {
        let mut performed = 0;
        while performed < limit {
            let Some(action) = self.pending_automatic_action() else {
                break;
            };
            if let CommandOutcome::Rejected(reason) = self.perform(action) {
                log::warn!("computer action '{action}' was refused: {reason}");
                break;
            }
            performed += 1;
        }
        performed
    }

    // Internals ---------------------------------------------------------------

    fn apply(
        &mut self,
        name: &str,
        undoable: bool,
        command: impl FnOnce(&mut Self) -> Result<(), RuleViolation>,
    ) -> CommandOutcome {
        // Taken before the command runs so a command that closes an auction clears it.
        let previous_undo = undoable.then(|| self.undo.replace(self.state.clone()));
        match command(self) {
            Ok(()) => {
                self.settle();
                CommandOutcome::Applied
            }
            Err(reason) => {
                if let Some(previous) = previous_undo {
                    self.undo = previous;
                }
                log::debug!("{name} rejected: {reason}");
                CommandOutcome::Rejected(reason)
            }
        }
    }

    fn ensure_turn(&self) -> Result<(), RuleViolation> {
        if self.state.is_over() {
            return Err(RuleViolation::GameOver);
        }
        if self.auction.is_some() {
            return Err(RuleViolation::AuctionInProgress);
        }
        Ok(())
    }

    fn step_auction(
        &mut self,
        step: impl FnOnce(&mut AuctionState, &mut GameState) -> AuctionStatus,
    ) -> Result<(), RuleViolation> {
        let mut auction = self.auction.take().ok_or(RuleViolation::NoAuction)?;
        let status = step(&mut auction, &mut self.state);
        self.track_auction(auction, status);
        Ok(())
    }

    fn open_auction(&mut self, auction: Option<AuctionState>) {
        if let Some(mut auction) = auction {
            let status = auction.settle(&mut self.state);
            self.track_auction(auction, status);
        }
    }

    fn track_auction(&mut self, auction: AuctionState, status: AuctionStatus) {
        match status {
            AuctionStatus::Open => self.auction = Some(auction),
            AuctionStatus::Closed(result) => self.close_auction(result),
        }
    }

    fn close_auction(&mut self, result: AuctionResult) {
        log::info!("auction closed: {result:?}");
        self.auction = None;
        self.undo = None;
    }

    fn start_new_game(&mut self) {
        let seed = self.next_seed;
        self.next_seed = derive_seed(seed);
        self.state = GameState::new(&self.catalog, self.settings.roster(), seed);
        self.auction = None;
        self.undo = None;
        log::info!(
            "new game with {} players (seed {seed})",
            self.state.players.len()
        );
    }

    fn restore(&mut self, slot: SaveSlot) {
        let state = slot.state.normalize(&self.catalog);
        let auction = slot.auction.filter(|a| {
            !a.participants.is_empty()
                && a.active_bidder < a.participants.len()
                && a.participants.iter().all(|&id| id < state.players.len())
                && !state.properties.contains_key(&a.tile_index)
        });
        self.state = state;
        self.auction = auction;
        self.undo = None;
    }

    /// Bookkeeping after every applied command.
    fn settle(&mut self) {
        while self.auction.is_none() && !self.state.is_over() {
            let Some(mut auction) = start_next_queued_auction(&mut self.state, None) else {
                break;
            };
            let status = auction.settle(&mut self.state);
            self.track_auction(auction, status);
        }
        if self
            .undo
            .as_ref()
            .is_some_and(|prev| prev.current_player != self.state.current_player)
        {
            self.undo = None;
        }
        self.generation = self.generation.next();
        self.autosave();
    }

    fn autosave(&self) {
        let slot =
            SaveSlot::now(AUTOSAVE_SLOT, self.state.clone()).with_auction(self.auction.clone());
        if let Err(err) = self.storage.save_game(&slot) {
            log::warn!("autosave failed: {err}");
        }
    }
}
