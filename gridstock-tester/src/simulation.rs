//! Headless all-computer games driven through the public session API.
use std::collections::BTreeSet;

use anyhow::{Context, Result};
use gridstock_game::constants::{LOG_CAPACITY, MAX_UPGRADES};
use gridstock_game::{CommandOutcome, GameSession, GameState, MemoryStorage, Settings};

use crate::strategy::Strategy;

/// Hard stop for a single game, in engine actions per allowed turn.
const ACTIONS_PER_TURN_CAP: usize = 200;
const CHECKPOINT_SLOT: &str = "Checkpoint";

pub type Expectation = fn(&SimulationSummary) -> Result<(), String>;

#[derive(Clone)]
pub struct SimulationPlan {
    pub players: usize,
    pub strategy: Strategy,
    pub max_turns: usize,
    /// Save, reopen and reload the game once this many turns have passed.
    pub checkpoint_turn: Option<usize>,
    /// Play the seed twice and compare the final states.
    pub replay: bool,
    pub expectations: Vec<Expectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(players: usize, strategy: Strategy, max_turns: usize) -> Self {
        Self {
            players,
            strategy,
            max_turns,
            checkpoint_turn: None,
            replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: String,
    pub players: usize,
    pub max_turns: usize,
    pub turns: usize,
    pub actions: usize,
    pub auctions: usize,
    pub game_over: bool,
    pub winner: Option<usize>,
    pub bankruptcies: usize,
    pub properties_owned: usize,
    pub final_cash: Vec<i64>,
    pub violations: Vec<String>,
    pub checkpoint_restored: Option<bool>,
    pub replay_matched: Option<bool>,
    pub final_state: Option<GameState>,
}

/// Every rule a settled state must satisfy.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<String> {
    let mut problems = Vec::new();
    for player in &state.players {
        if player.cash < 0 {
            problems.push(format!("{} has negative cash {}", player.name, player.cash));
        }
        if player.position >= state.tiles.len() {
            problems.push(format!("{} is off the board", player.name));
        }
        if player.bankrupt && !state.owned_by(player.id).is_empty() {
            problems.push(format!("bankrupt {} still owns property", player.name));
        }
    }
    for (idx, prop) in &state.properties {
        if !state.tiles.get(*idx).is_some_and(|t| t.is_ownable()) {
            problems.push(format!("tile {idx} is owned but not ownable"));
        }
        if prop.upgrades > MAX_UPGRADES {
            problems.push(format!("tile {idx} has {} upgrades", prop.upgrades));
        }
        if prop.mortgaged && prop.upgrades > 0 {
            problems.push(format!("tile {idx} is mortgaged with upgrades"));
        }
        if state.players.get(prop.owner_id).is_none_or(|p| p.bankrupt) {
            problems.push(format!("tile {idx} belongs to an inactive player"));
        }
    }
    if let Some((d1, d2)) = state.last_roll
        && !((1..=6).contains(&d1) && (1..=6).contains(&d2))
    {
        problems.push(format!("impossible dice {d1} + {d2}"));
    }
    if state.log.len() > LOG_CAPACITY {
        problems.push(format!("log grew to {} entries", state.log.len()));
    }
    problems
}

fn new_session(plan: &SimulationPlan, seed: u64) -> (GameSession<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::default();
    let settings = Settings {
        player_count: plan.players,
        ai_slots: (0..plan.players).collect::<BTreeSet<_>>(),
        auto_end_turn_ms: 0,
    };
    let mut session = GameSession::new(storage.clone(), settings, seed);
    session.set_policy(plan.strategy.policy());
    (session, storage)
}

/// Save to a slot, reopen storage in a fresh session and load the slot back.
fn checkpoint(
    session: &mut GameSession<MemoryStorage>,
    storage: &MemoryStorage,
    plan: &SimulationPlan,
    seed: u64,
) -> Result<bool> {
    if !session.save(CHECKPOINT_SLOT).is_applied() {
        anyhow::bail!("checkpoint save was refused");
    }
    let mut reopened = GameSession::open(storage.clone(), seed).context("reopening storage")?;
    reopened.set_policy(plan.strategy.policy());
    if let CommandOutcome::Rejected(reason) = reopened.load(CHECKPOINT_SLOT) {
        anyhow::bail!("checkpoint load was refused: {reason}");
    }
    let matches = serde_json::to_value(reopened.state())? == serde_json::to_value(session.state())?
        && reopened.auction() == session.auction();
    *session = reopened;
    Ok(matches)
}

fn play(plan: &SimulationPlan, seed: u64) -> SimulationSummary {
    let (mut session, storage) = new_session(plan, seed);
    let mut summary = SimulationSummary {
        seed,
        strategy: plan.strategy.label().to_owned(),
        players: plan.players,
        max_turns: plan.max_turns,
        ..SimulationSummary::default()
    };
    let action_cap = plan.max_turns.saturating_mul(ACTIONS_PER_TURN_CAP);

    while summary.turns < plan.max_turns && !session.state().is_over() {
        if summary.actions >= action_cap {
            summary
                .violations
                .push(format!("no progress after {action_cap} actions"));
            break;
        }
        let Some(action) = session.pending_automatic_action() else {
            summary
                .violations
                .push("no computer action available".to_owned());
            break;
        };
        let player_before = session.state().current_player;
        let auction_before = session.auction().is_some();
        if let CommandOutcome::Rejected(reason) = session.perform(action) {
            summary
                .violations
                .push(format!("'{action}' was refused: {reason}"));
            break;
        }
        summary.actions += 1;
        log::trace!("seed {seed} action {}: {action}", summary.actions);
        if !auction_before && session.auction().is_some() {
            summary.auctions += 1;
        }
        if session.state().current_player != player_before {
            summary.turns += 1;
            if plan.checkpoint_turn == Some(summary.turns) {
                match checkpoint(&mut session, &storage, plan, seed) {
                    Ok(matched) => summary.checkpoint_restored = Some(matched),
                    Err(err) => {
                        summary.checkpoint_restored = Some(false);
                        summary.violations.push(format!("{err:#}"));
                    }
                }
            }
        }
        let problems = check_invariants(session.state());
        if !problems.is_empty() {
            summary.violations.extend(problems);
            break;
        }
    }

    let state = session.state();
    summary.game_over = state.is_over();
    summary.winner = state.winner();
    summary.bankruptcies = state.players.iter().filter(|p| p.bankrupt).count();
    summary.properties_owned = state.properties.len();
    summary.final_cash = state.players.iter().map(|p| p.cash).collect();
    summary.final_state = Some(state.clone());
    summary
}

/// Play one seeded game under `plan`.
#[must_use]
pub fn run_plan(plan: &SimulationPlan, seed: u64) -> SimulationSummary {
    let mut summary = play(plan, seed);
    if plan.replay {
        let again = play(plan, seed);
        let encode = |s: &SimulationSummary| {
            s.final_state
                .as_ref()
                .and_then(|state| serde_json::to_string(state).ok())
        };
        summary.replay_matched = Some(encode(&summary).is_some() && encode(&summary) == encode(&again));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_game_stays_consistent() {
        let plan = SimulationPlan::new(3, Strategy::Balanced, 30);
        let summary = run_plan(&plan, 17);
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert!(summary.actions > 0);
        assert!(summary.game_over || summary.turns == 30);
        assert_eq!(summary.final_cash.len(), 3);
    }

    #[test]
    fn checkpoint_and_replay_are_verified() {
        let plan = SimulationPlan {
            checkpoint_turn: Some(5),
            replay: true,
            ..SimulationPlan::new(2, Strategy::Aggressive, 20)
        };
        let summary = run_plan(&plan, 4);
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert_eq!(summary.replay_matched, Some(true));
        if summary.turns >= 5 {
            assert_eq!(summary.checkpoint_restored, Some(true));
        }
    }

    #[test]
    fn invariant_checker_flags_bad_states() {
        let (session, _) = new_session(&SimulationPlan::new(2, Strategy::Balanced, 1), 1);
        let mut state = session.state().clone();
        assert!(check_invariants(&state).is_empty());
        state.players[0].cash = -5;
        state.last_roll = Some((0, 9));
        assert_eq!(check_invariants(&state).len(), 2);
    }
}
