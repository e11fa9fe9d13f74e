// Lineup optimizer entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout carries only the report)
// 2. Load config, apply command-line overrides
// 3. Load players, attach prices
// 4. Score the pool
// 5. Optimize and print the lineup (text or JSON)
// 6. Append the lineup to the history file

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use hockey_lineup::config::{self, OptimizerMethod};
use hockey_lineup::history::{self, HistoryEntry};
use hockey_lineup::lineup::constraints::LineupConstraints;
use hockey_lineup::lineup::greedy::{Lineup, LineupOptimizer};
use hockey_lineup::lineup::nonlinear::{NonlinearOptimizer, NonlinearResult};
use hockey_lineup::lineup::report::{self, RankingFormat};
use hockey_lineup::loader;
use hockey_lineup::scoring::engine::ScoringReport;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Player file (.json or .csv); overrides data_paths.players
    #[arg(long, value_name = "PATH")]
    players: Option<PathBuf>,

    /// Price list CSV; overrides data_paths.prices
    #[arg(long, value_name = "PATH")]
    prices: Option<PathBuf>,

    /// Optimizer to run; overrides optimizer.method
    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Pick a substitute for every starter (greedy only)
    #[arg(long)]
    substitutes: bool,

    /// Print the result as JSON instead of a text report
    #[arg(long)]
    json: bool,

    /// Print the scoring breakdown of one player and exit
    #[arg(long, value_name = "NAME")]
    breakdown: Option<String>,

    /// Also print the N best players by value
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Do not append this run's lineup to the history file
    #[arg(long)]
    no_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Greedy,
    Nonlinear,
}

impl From<MethodArg> for OptimizerMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Greedy => OptimizerMethod::Greedy,
            MethodArg::Nonlinear => OptimizerMethod::Nonlinear,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
enum RunOutput<'a> {
    Greedy {
        scoring: &'a ScoringReport,
        lineup: &'a Lineup,
    },
    Nonlinear {
        scoring: &'a ScoringReport,
        result: &'a NonlinearResult,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, budget {}/{}",
        config.league.name, config.league.budget.base_budget, config.league.budget.max_budget
    );

    let method = cli.method.map(OptimizerMethod::from).unwrap_or(config.strategy.method);
    let mut settings = config.optimizer_settings();
    settings.substitutes |= cli.substitutes;

    let mut constraints = config.constraints();
    if settings.substitutes {
        constraints.required_positions = LineupConstraints::starters_and_substitutes().required_positions;
    }

    // 3. Load players and prices
    let players_path = cli
        .players
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.data_paths.players));
    let mut records = loader::load_players(&players_path)
        .with_context(|| format!("failed to load players from {}", players_path.display()))?;

    let prices_path = cli
        .prices
        .clone()
        .or_else(|| config.data_paths.prices.as_ref().map(PathBuf::from));
    if let Some(path) = prices_path {
        if path.exists() {
            let prices = loader::load_prices(&path)
                .with_context(|| format!("failed to load prices from {}", path.display()))?;
            let matched = loader::apply_prices(&mut records, &prices);
            info!("Matched {} of {} price entries", matched, prices.len());
        } else if cli.prices.is_some() {
            anyhow::bail!("price file {} does not exist", path.display());
        } else {
            warn!("configured price file {} not found, using prices from player data", path.display());
        }
    }

    let engine = config.scoring_engine();

    // Inspection mode
    if let Some(name) = &cli.breakdown {
        let wanted = name.trim().to_lowercase();
        let record = records
            .iter()
            .find(|r| r.name.trim().to_lowercase() == wanted)
            .with_context(|| format!("no player named '{name}'"))?;
        print!("{}", report::render_breakdown(&engine.breakdown(record)));
        return Ok(());
    }

    // 4. Score
    let (scored, scoring) = engine.score_pool(records);
    info!("{}", report::render_scoring_report(&scoring));

    if let Some(n) = cli.top {
        let table = report::export_rankings(&scored, settings.rank_by, RankingFormat::Text, Some(n))
            .context("failed to render rankings")?;
        if !cli.json {
            println!("{table}");
        }
    }

    // 5. Optimize
    let lineup = match method {
        OptimizerMethod::Greedy => {
            let lineup = LineupOptimizer::new(settings).optimize(&scored, &constraints);
            if cli.json {
                print_json(&RunOutput::Greedy {
                    scoring: &scoring,
                    lineup: &lineup,
                })?;
            } else {
                print!("{}", report::render_lineup(&lineup, &constraints));
            }
            lineup
        }
        OptimizerMethod::Nonlinear => {
            if settings.substitutes {
                warn!("substitutes are only selected by the greedy optimizer");
            }
            let result = NonlinearOptimizer::new(config.strategy.nonlinear.clone())
                .optimize(&scored, &constraints);
            info!(
                iterations = result.iterations,
                converged = result.converged,
                "nonlinear optimization finished"
            );
            if cli.json {
                print_json(&RunOutput::Nonlinear {
                    scoring: &scoring,
                    result: &result,
                })?;
            } else {
                print!("{}", report::render_lineup(&result.lineup, &constraints));
            }
            result.lineup
        }
    };

    // 6. History
    if let Some(path) = config.data_paths.history.as_ref().filter(|_| !cli.no_history) {
        if lineup.starters.is_empty() {
            warn!("empty lineup, not recorded in history");
        } else {
            let path = PathBuf::from(path);
            match history::append_history(&path, HistoryEntry::from_lineup(&lineup, chrono::Local::now())) {
                Ok(entries) => info!("Lineup saved to {} ({} in history)", path.display(), entries.len()),
                Err(e) => warn!("could not save lineup history: {e}"),
            }
        }
    }

    Ok(())
}

fn print_json(output: &RunOutput<'_>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(output).context("failed to serialize result")?;
    println!("{text}");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hockey_lineup=info,lineup=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
