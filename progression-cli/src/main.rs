mod facts_file;
mod reports;
mod simulate;
mod storage;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use progression_engine::{
    EngineConfig, ProgressionEngine, ProgressionStore, Role, collect_facts,
};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use facts_file::JsonFactSource;
use simulate::{SimulationRun, run_simulation};
use storage::FileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable colored output
    Console,
    /// Pretty-printed JSON
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "progression-cli", version = "0.1.0")]
#[command(about = "Evaluate achievements, levels, streaks and next steps for marketplace users")]
struct Args {
    /// Optional engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding per-user progression snapshots
    #[arg(long, global = true, default_value = ".progression")]
    store: PathBuf,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate a user's facts and commit the result
    Evaluate {
        #[arg(long)]
        user: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        /// JSON object of fact names to booleans or counts
        #[arg(long)]
        facts: PathBuf,
        /// Evaluation date (YYYY-MM-DD); defaults to now
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Dismiss the pending new-achievement events for a user
    Acknowledge {
        #[arg(long)]
        user: String,
    },
    /// List achievements, levels and next steps for a role
    Catalog {
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// Run seeded random fact trajectories and check progression properties
    Simulate {
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        /// Seeds to run (comma-separated)
        #[arg(long, default_value = "1337")]
        seeds: String,
        /// Evaluation days per seed
        #[arg(long, default_value_t = 60)]
        days: u32,
    },
    /// Delete everything stored for a user
    Forget {
        #[arg(long)]
        user: String,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse::<Role>().map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match &args.command {
        Command::Evaluate {
            user,
            role,
            facts,
            date,
        } => {
            let store = FileStore::open(&args.store)?;
            let engine = ProgressionEngine::with_config(store, config)?;
            run_evaluate(&args, &engine, user, *role, facts, *date, &mut output_target).await?;
        }
        Command::Acknowledge { user } => {
            let engine = ProgressionEngine::with_config(FileStore::open(&args.store)?, config)?;
            let acknowledged = engine
                .acknowledge_new_achievement(user)
                .with_context(|| format!("failed to acknowledge achievements for {user}"))?;
            writeln!(output_target, "Acknowledged {acknowledged} achievement(s) for {user}")?;
        }
        Command::Catalog { role } => {
            let engine = ProgressionEngine::with_config(FileStore::open(&args.store)?, config)?;
            match args.report {
                ReportFormat::Console => {
                    reports::write_catalog_console(&mut output_target, engine.catalog(), *role)?;
                }
                ReportFormat::Json => {
                    reports::write_catalog_json(&mut output_target, engine.catalog(), *role)?;
                }
            }
        }
        Command::Simulate { role, seeds, days } => {
            let runs = run_simulations(&config, *role, seeds, *days)?;
            write_simulation_report(&args, &runs, &mut output_target)?;
            output_target.flush_inner()?;
            if runs.iter().any(|run| !run.passed()) {
                std::process::exit(1);
            }
        }
        Command::Forget { user } => {
            let engine = ProgressionEngine::with_config(FileStore::open(&args.store)?, config)?;
            engine
                .forget_user(user)
                .with_context(|| format!("failed to delete progression for {user}"))?;
            writeln!(output_target, "Deleted progression for {user}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EngineConfig::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn evaluation_instant(date: Option<NaiveDate>) -> DateTime<Utc> {
    date.map_or_else(Utc::now, |date| date.and_time(NaiveTime::MIN).and_utc())
}

async fn run_evaluate<S: ProgressionStore>(
    args: &Args,
    engine: &ProgressionEngine<S>,
    user: &str,
    role: Role,
    facts_path: &Path,
    date: Option<NaiveDate>,
    output_target: &mut OutputTarget,
) -> Result<()> {
    let source = JsonFactSource::from_path(facts_path)?;
    let keys = engine.catalog().required_facts(role);
    let collection = collect_facts(&source, user, role, keys).await;

    let result = engine.evaluate(user, role, &collection.facts, evaluation_instant(date));
    match args.report {
        ReportFormat::Console => {
            reports::write_evaluation_console(output_target, &result, &collection.failures)?;
        }
        ReportFormat::Json => {
            reports::write_evaluation_json(output_target, &result, &collection.failures)?;
        }
    }
    Ok(())
}

fn run_simulations(
    config: &EngineConfig,
    role: Option<Role>,
    seeds: &str,
    days: u32,
) -> Result<Vec<SimulationRun>> {
    let roles: Vec<Role> = role.map_or_else(|| Role::ALL.to_vec(), |role| vec![role]);
    let seeds = parse_seeds(seeds)?;
    let start_time = Instant::now();

    let mut runs = Vec::with_capacity(seeds.len() * roles.len());
    for seed in seeds {
        for role in &roles {
            runs.push(run_simulation(config, seed, *role, days)?);
        }
    }
    log::info!("{} simulation run(s) in {:?}", runs.len(), start_time.elapsed());
    Ok(runs)
}

fn parse_seeds(raw: &str) -> Result<Vec<u64>> {
    let seeds = split_csv(raw)
        .into_iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed `{token}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    if seeds.is_empty() {
        bail!("at least one seed is required");
    }
    Ok(seeds)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn write_simulation_report(
    args: &Args,
    runs: &[SimulationRun],
    output_target: &mut OutputTarget,
) -> Result<()> {
    match args.report {
        ReportFormat::Console => {
            announce_banner(output_target)?;
            reports::write_simulation_console(output_target, runs)
        }
        ReportFormat::Json => reports::write_simulation_json(output_target, runs),
    }
}

fn announce_banner(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", "🎯 Progression Simulator".bright_cyan().bold())?;
    writeln!(out, "{}", "================================".cyan())?;
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

    #[test]
    fn split_csv_trims_and_drops_empty_tokens() {
        assert_eq!(split_csv(" 1, 2,,3 "), vec!["1", "2", "3"]);
    }

    #[test]
    fn parse_seeds_rejects_garbage() {
        assert_eq!(parse_seeds("7,42").unwrap(), vec![7, 42]);
        assert!(parse_seeds("7,x").is_err());
        assert!(parse_seeds(" , ").is_err());
    }

    #[test]
    fn role_parser_fails_loudly() {
        assert_eq!(parse_role("Investor"), Ok(Role::Investor));
        assert!(parse_role("landlord").unwrap_err().contains("landlord"));
    }

    #[test]
    fn explicit_date_maps_to_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(evaluation_instant(Some(date)).date_naive(), date);
    }

    #[test]
    fn output_target_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "progression-cli-output-{}",
            std::process::id()
        ));
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target, "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
    }
}
