use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::scenarios::Scenario;
use crate::simulation::{SimulationPlan, SimulationSummary, run_plan};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub strategy: String,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub games_finished: usize,
    pub average_turns: f64,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

pub struct ScenarioRunner {
    verbose: bool,
}

impl ScenarioRunner {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing scenario: {} ({}, {} players, seed {seed})",
                        scenario.name.bright_white(),
                        scenario.plan.strategy,
                        scenario.plan.players
                    );
                }
                self.run_single_scenario(scenario, seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut finished = 0;
        let mut total_turns = 0;
        let mut failures = Vec::new();
        let mut durations = Vec::new();

        for i in 0..iterations {
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let start = Instant::now();
            let summary = run_plan(&scenario.plan, iteration_seed);
            let duration = start.elapsed();
            total_turns += summary.turns;
            if summary.game_over {
                finished += 1;
            }

            if let Some(err) = evaluate_expectations(&scenario.plan, &summary) {
                failures.push(format!(
                    "Iteration {} (seed {}, turns {}, actions {}): {err} | {}",
                    i + 1,
                    summary.seed,
                    summary.turns,
                    summary.actions,
                    describe_outcome(&summary)
                ));
                if self.verbose {
                    println!("  ❌ Iteration {}/{iterations} failed: {}", i + 1, err.red());
                }
            } else {
                successes += 1;
                durations.push(duration);
                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{iterations} passed ({duration:?}) {}",
                        i + 1,
                        describe_outcome(&summary)
                    );
                }
            }
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };
        #[allow(clippy::cast_precision_loss)]
        let average_turns = if iterations == 0 {
            0.0
        } else {
            total_turns as f64 / iterations as f64
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            strategy: scenario.plan.strategy.label().to_owned(),
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            games_finished: finished,
            average_turns,
            failures,
            average_duration,
        }
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    plan.expectations
        .iter()
        .find_map(|expectation| expectation(summary).err())
}

fn describe_outcome(summary: &SimulationSummary) -> String {
    let cash = summary
        .final_cash
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/");
    match summary.winner {
        Some(winner) => format!(
            "winner P{} after {} turns, {} auctions, cash {cash}",
            winner + 1,
            summary.turns,
            summary.auctions
        ),
        None => format!(
            "no winner after {} turns, {} bankrupt, {} auctions, cash {cash}",
            summary.turns, summary.bankruptcies, summary.auctions
        ),
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{ScenarioOverrides, get_scenario};

    #[test]
    fn smoke_scenario_passes_for_a_seed() {
        let scenario = get_scenario("smoke", ScenarioOverrides::default()).unwrap();
        let results = ScenarioRunner::new(false).run_scenario(&scenario, &[1337], 2);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.passed, "{:?}", result.failures);
        assert_eq!(result.successful_iterations, 2);
        assert!(result.average_turns > 0.0);
    }

    #[test]
    fn results_serialize_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".into(),
            seed: 1,
            strategy: "Balanced".into(),
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            games_finished: 0,
            average_turns: 40.0,
            failures: Vec::new(),
            average_duration: Duration::from_millis(1_500),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 1_500);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.average_duration, Duration::from_millis(1_500));
    }
}
