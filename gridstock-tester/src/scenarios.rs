use gridstock_game::constants::{MAX_PLAYERS, MIN_PLAYERS};

use crate::simulation::{SimulationPlan, SimulationSummary};
use crate::strategy::Strategy;

pub struct Scenario {
    pub name: String,
    pub description: &'static str,
    pub plan: SimulationPlan,
}

/// Knobs from the command line that reshape every scenario.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioOverrides {
    pub players: Option<usize>,
    pub strategy: Option<Strategy>,
    pub max_turns: Option<usize>,
}

const CATALOG: [(&str, &str); 8] = [
    ("smoke", "Two computers play a short game without breaking any rule"),
    ("full-game", "Four computers play toward a winner"),
    ("six-players", "A full table of six computers"),
    ("cautious", "Conservative buyers that rarely bid or build"),
    ("aggressive", "Computers that buy, bid and build at every chance"),
    ("hoarder", "Computers that buy everything and never build"),
    ("save-restore", "Save mid-game, reopen storage and keep playing"),
    ("deterministic-replay", "The same seed always plays out the same game"),
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG.to_vec()
}

/// Expand `all` and drop duplicates, keeping the first occurrence.
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in requested {
        let batch: Vec<String> = if name == "all" {
            CATALOG.iter().map(|(key, _)| (*key).to_owned()).collect()
        } else {
            vec![name.clone()]
        };
        for entry in batch {
            if !names.contains(&entry) {
                names.push(entry);
            }
        }
    }
    names
}

fn no_violations(summary: &SimulationSummary) -> Result<(), String> {
    if summary.violations.is_empty() {
        Ok(())
    } else {
        Err(summary.violations.join("; "))
    }
}

fn made_progress(summary: &SimulationSummary) -> Result<(), String> {
    if summary.actions > 0 {
        Ok(())
    } else {
        Err("no actions were played".to_owned())
    }
}

fn finished_or_capped(summary: &SimulationSummary) -> Result<(), String> {
    if summary.game_over || summary.turns >= summary.max_turns {
        Ok(())
    } else {
        Err(format!(
            "stopped after {} of {} turns without a winner",
            summary.turns, summary.max_turns
        ))
    }
}

fn winner_is_solvent(summary: &SimulationSummary) -> Result<(), String> {
    match (summary.winner, summary.final_state.as_ref()) {
        (Some(winner), Some(state)) if state.players[winner].bankrupt => {
            Err(format!("winner {winner} is bankrupt"))
        }
        (Some(_), _) if summary.bankruptcies + 1 != summary.players => Err(format!(
            "winner declared with {} of {} players bankrupt",
            summary.bankruptcies, summary.players
        )),
        _ => Ok(()),
    }
}

fn someone_invested(summary: &SimulationSummary) -> Result<(), String> {
    if summary.properties_owned > 0 || summary.game_over {
        Ok(())
    } else {
        Err("nobody owns any property".to_owned())
    }
}

fn checkpoint_restored(summary: &SimulationSummary) -> Result<(), String> {
    match summary.checkpoint_restored {
        Some(true) => Ok(()),
        Some(false) => Err("reloaded game differs from the saved one".to_owned()),
        None if summary.game_over => Ok(()),
        None => Err("the game never reached its checkpoint".to_owned()),
    }
}

fn replay_matched(summary: &SimulationSummary) -> Result<(), String> {
    if summary.replay_matched == Some(true) {
        Ok(())
    } else {
        Err("replaying the seed produced a different game".to_owned())
    }
}

fn base_plan(players: usize, strategy: Strategy, max_turns: usize) -> SimulationPlan {
    SimulationPlan::new(players, strategy, max_turns)
        .expect(no_violations)
        .expect(made_progress)
        .expect(finished_or_capped)
        .expect(winner_is_solvent)
}

pub fn get_scenario(name: &str, overrides: ScenarioOverrides) -> Option<Scenario> {
    let description = CATALOG
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, description)| *description)?;
    let mut plan = match name {
        "smoke" => base_plan(2, Strategy::Balanced, 40),
        "full-game" => base_plan(4, Strategy::Balanced, 400),
        "six-players" => base_plan(6, Strategy::Balanced, 300),
        "cautious" => base_plan(4, Strategy::Cautious, 200),
        "aggressive" => base_plan(4, Strategy::Aggressive, 200).expect(someone_invested),
        "hoarder" => base_plan(4, Strategy::Hoarder, 200).expect(someone_invested),
        "save-restore" => SimulationPlan {
            checkpoint_turn: Some(8),
            ..base_plan(3, Strategy::Balanced, 60).expect(checkpoint_restored)
        },
        "deterministic-replay" => SimulationPlan {
            replay: true,
            ..base_plan(3, Strategy::Aggressive, 80).expect(replay_matched)
        },
        _ => return None,
    };
    if let Some(players) = overrides.players {
        plan.players = players.clamp(MIN_PLAYERS, MAX_PLAYERS);
    }
    if let Some(strategy) = overrides.strategy {
        plan.strategy = strategy;
    }
    if let Some(max_turns) = overrides.max_turns {
        plan.max_turns = max_turns;
        if let Some(at) = plan.checkpoint_turn {
            plan.checkpoint_turn = Some(at.min(max_turns.max(1)));
        }
    }
    Some(Scenario {
        name: name.to_owned(),
        description,
        plan,
    })
}
