// Configuration loading and parsing (league.toml, strategy.toml).

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::lineup::constraints::LineupConstraints;
use crate::lineup::greedy::{OptimizerSettings, RankMetric};
use crate::lineup::nonlinear::NonlinearSettings;
use crate::player::position::Position;
use crate::scoring::blend::{SeasonTags, REGULAR_SEASON_GAME_TYPE};
use crate::scoring::engine::ScoringEngine;
use crate::scoring::rules::ScoringRules;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub strategy: StrategyConfig,
    pub data_paths: DataPaths,
}

impl Config {
    pub fn constraints(&self) -> LineupConstraints {
        LineupConstraints {
            base_budget: self.league.budget.base_budget,
            max_budget: self.league.budget.max_budget,
            penalty_per_unit: self.league.budget.penalty_per_unit,
            required_positions: self.league.roster.clone(),
        }
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        self.strategy.optimizer.clone()
    }

    pub fn scoring_engine(&self) -> ScoringEngine {
        ScoringEngine::new(self.league.scoring.clone(), self.league.season.clone())
            .with_correlation_bonus(self.strategy.correlation_bonus)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: RawLeague,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLeague {
    name: String,
    platform: String,
    budget: BudgetConfig,
    roster: HashMap<String, usize>,
    #[serde(default)]
    season: SeasonSection,
    /// Partial overrides of the default scoring tables.
    #[serde(default)]
    scoring: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
struct SeasonSection {
    /// An eight-digit season tag (`20252026`) or `"auto"`.
    #[serde(default = "default_season_current")]
    current: String,
    #[serde(default)]
    previous: Option<String>,
    #[serde(default = "default_season_league")]
    league: String,
    #[serde(default = "default_game_type")]
    game_type: i64,
}

impl Default for SeasonSection {
    fn default() -> Self {
        SeasonSection {
            current: default_season_current(),
            previous: None,
            league: default_season_league(),
            game_type: default_game_type(),
        }
    }
}

fn default_season_current() -> String {
    "auto".into()
}

fn default_season_league() -> String {
    "NHL".into()
}

fn default_game_type() -> i64 {
    REGULAR_SEASON_GAME_TYPE
}

#[derive(Debug, Clone)]
pub struct LeagueConfig {
    pub name: String,
    pub platform: String,
    pub budget: BudgetConfig,
    pub roster: BTreeMap<Position, usize>,
    pub season: SeasonTags,
    pub scoring: ScoringRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    pub base_budget: f64,
    pub max_budget: f64,
    pub penalty_per_unit: f64,
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire strategy.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    optimizer: OptimizerSection,
    #[serde(default)]
    nonlinear: NonlinearSettings,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct OptimizerSection {
    method: OptimizerMethod,
    rank_by: RankMetric,
    swap_iteration_cap: usize,
    exploration_slack: f64,
    #[serde(default)]
    substitutes: bool,
    #[serde(default = "default_true")]
    correlation_bonus: bool,
}

fn default_true() -> bool {
    true
}

/// Which optimizer builds the lineup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMethod {
    Greedy,
    Nonlinear,
}

/// The public strategy config assembled from the strategy.toml sections.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub method: OptimizerMethod,
    pub optimizer: OptimizerSettings,
    pub correlation_bonus: bool,
    pub nonlinear: NonlinearSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
    #[serde(default)]
    pub prices: Option<String>,
    /// Lineup history file; no history is kept when absent.
    #[serde(default)]
    pub history: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/strategy.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;
    let league = assemble_league(league_file.league)?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    let opt = strategy_file.optimizer;
    let strategy = StrategyConfig {
        method: opt.method,
        optimizer: OptimizerSettings {
            rank_by: opt.rank_by,
            swap_iteration_cap: opt.swap_iteration_cap,
            exploration_slack: opt.exploration_slack,
            substitutes: opt.substitutes,
        },
        correlation_bonus: opt.correlation_bonus,
        nonlinear: strategy_file.nonlinear,
    };

    let config = Config {
        league,
        strategy,
        data_paths: strategy_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the crate root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Directory that holds `defaults/` or `config/`: the working directory when
/// it has either, otherwise the crate directory the binary was built from.
fn resolve_base_dir(cwd: &Path, manifest_dir: &Path) -> PathBuf {
    let has_config = |dir: &Path| dir.join("defaults").is_dir() || dir.join("config").is_dir();
    if !has_config(cwd) && has_config(manifest_dir) {
        manifest_dir.to_path_buf()
    } else {
        cwd.to_path_buf()
    }
}

/// Convenience wrapper: loads config relative to the current working directory,
/// falling back to the crate directory (so `lineup` also runs from the
/// workspace root). Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    let base_dir = resolve_base_dir(&cwd, Path::new(env!("CARGO_MANIFEST_DIR")));
    ensure_config_files(&base_dir)?;
    load_config_from(&base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn assemble_league(raw: RawLeague) -> Result<LeagueConfig, ConfigError> {
    let mut roster = BTreeMap::new();
    for (key, count) in &raw.roster {
        let position = Position::from_config_key(key).ok_or_else(|| ConfigError::ValidationError {
            field: format!("league.roster.{key}"),
            message: "unknown position (expected G, D or F)".into(),
        })?;
        if roster.insert(position, *count).is_some() {
            return Err(ConfigError::ValidationError {
                field: format!("league.roster.{key}"),
                message: format!("position {position} is listed more than once"),
            });
        }
    }

    let season = resolve_season(raw.season, chrono::Local::now().date_naive())?;

    let scoring =
        ScoringRules::with_overrides(&raw.scoring).map_err(|e| ConfigError::ValidationError {
            field: "league.scoring".into(),
            message: e.to_string(),
        })?;

    Ok(LeagueConfig {
        name: raw.name,
        platform: raw.platform,
        budget: raw.budget,
        roster,
        season,
        scoring,
    })
}

/// `current = "auto"` picks the season in progress on `today`.
fn resolve_season(section: SeasonSection, today: chrono::NaiveDate) -> Result<SeasonTags, ConfigError> {
    let (current, previous) = if section.current.trim().eq_ignore_ascii_case("auto") {
        let auto = SeasonTags::for_date(today);
        (auto.current, section.previous.unwrap_or(auto.previous))
    } else {
        let previous = section.previous.ok_or_else(|| ConfigError::ValidationError {
            field: "league.season.previous".into(),
            message: "required when league.season.current is not \"auto\"".into(),
        })?;
        (section.current.trim().to_string(), previous)
    };
    Ok(SeasonTags {
        current,
        previous: previous.trim().to_string(),
        league: section.league.trim().to_string(),
        game_type: section.game_type,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    // League validations
    let budget = &config.league.budget;
    let positive_fields: &[(&str, f64)] = &[
        ("league.budget.base_budget", budget.base_budget),
        ("league.budget.max_budget", budget.max_budget),
    ];
    for (name, val) in positive_fields {
        if !val.is_finite() || *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be > 0, got {val}"),
            });
        }
    }

    if budget.max_budget < budget.base_budget {
        return Err(ConfigError::ValidationError {
            field: "league.budget.max_budget".into(),
            message: format!(
                "must be >= base_budget ({}), got {}",
                budget.base_budget, budget.max_budget
            ),
        });
    }

    if !budget.penalty_per_unit.is_finite() || budget.penalty_per_unit < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "league.budget.penalty_per_unit".into(),
            message: format!("must be >= 0, got {}", budget.penalty_per_unit),
        });
    }

    if config.league.roster.values().sum::<usize>() == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.roster".into(),
            message: "must require at least one player".into(),
        });
    }

    let season = &config.league.season;
    let tag_fields: &[(&str, &str)] = &[
        ("league.season.current", season.current.as_str()),
        ("league.season.previous", season.previous.as_str()),
        ("league.season.league", season.league.as_str()),
    ];
    for (name, val) in tag_fields {
        if val.is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    // Strategy validations
    let strategy = &config.strategy;
    let slack = strategy.optimizer.exploration_slack;
    if !slack.is_finite() || slack < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "optimizer.exploration_slack".into(),
            message: format!("must be >= 0, got {slack}"),
        });
    }

    let cap_fields: &[(&str, usize)] = &[
        ("optimizer.swap_iteration_cap", strategy.optimizer.swap_iteration_cap),
        ("nonlinear.max_iterations", strategy.nonlinear.max_iterations),
    ];
    for (name, val) in cap_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let nl = &strategy.nonlinear;
    let nl_fields: &[(&str, f64)] = &[
        ("nonlinear.step_size", nl.step_size),
        ("nonlinear.season_games", nl.season_games),
    ];
    for (name, val) in nl_fields {
        if !val.is_finite() || *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be > 0, got {val}"),
            });
        }
    }

    if config.data_paths.players.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.players".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
