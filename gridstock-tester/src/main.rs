mod reports;
mod runner;
mod scenarios;
mod simulation;
mod strategy;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use runner::{ScenarioResult, ScenarioRunner};
use scenarios::{ScenarioOverrides, expand_scenarios, get_scenario, list_scenarios};
use strategy::Strategy;
use util::{parse_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "gridstock-tester", version = "0.1.0")]
#[command(about = "Automated QA for the GridStock engine: seeded all-computer games checked against the rules")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Override the number of players in every scenario
    #[arg(long)]
    players: Option<usize>,

    /// Override the computer strategy in every scenario
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Override the turn cap in every scenario
    #[arg(long)]
    max_turns: Option<usize>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    const fn overrides(&self) -> ScenarioOverrides {
        ScenarioOverrides {
            players: self.players,
            strategy: self.strategy,
            max_turns: self.max_turns,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&split_csv(&args.scenarios));
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    let results = run_scenarios(&args, &scenarios, &seeds);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    let strategies: Vec<&str> = Strategy::ALL.iter().map(|s| s.label()).collect();
    writeln!(output_target.writer(), "Strategies: {}", strategies.join(", "))?;
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎲 GridStock Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn run_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> Vec<ScenarioResult> {
    let runner = ScenarioRunner::new(args.verbose);
    let mut results = Vec::new();
    for scenario_name in scenarios {
        let Some(scenario) = get_scenario(scenario_name, args.overrides()) else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
            continue;
        };
        if args.verbose {
            println!("{} {}", "▶".bright_blue(), scenario.description);
        }
        results.extend(runner.run_scenario(&scenario, seeds, args.iterations));
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let duration = start_time.elapsed();

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                reports::generate_json_report(output_target.writer(), results, duration)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# GridStock Simulation Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(output_target.writer(), results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(output_target.writer(), results, duration)?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            players: None,
            strategy: None,
            max_turns: None,
            report: "json".to_string(),
            output: None,
            verbose: false,
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gridstock-{}-{name}", std::process::id()))
    }

    fn sample_result() -> ScenarioResult {
        ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1337,
            strategy: "Balanced".to_string(),
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            games_finished: 0,
            average_turns: 40.0,
            failures: Vec::new(),
            average_duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_file("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("deterministic-replay"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let args = base_args();
        let results = run_scenarios(&args, &["nope".to_string()], &[1]);
        assert!(results.is_empty());
    }

    #[test]
    fn overrides_flow_into_scenarios() {
        let args = Args {
            players: Some(9),
            max_turns: Some(6),
            ..base_args()
        };
        let results = run_scenarios(&args, &["smoke".to_string()], &[3]);
        assert_eq!(results.len(), 1);
        assert!(results[0].average_turns <= 6.0);
    }

    #[test]
    fn write_reports_emits_empty_json_array() {
        let temp = temp_file("empty.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        assert_eq!(std::fs::read_to_string(temp).unwrap().trim(), "[]");
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("empty.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_console_includes_total_time() {
        let temp = temp_file("console.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result()], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("smoke"));
        assert!(content.contains("Total time"));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }
}
