// Scoring engine: blended statistics + position → fantasy points.
//
// Scoring is a linear function over the blended stats, evaluated against the
// position's table. `breakdown` is the single place the formulas live;
// `calculate_points` and friends read their numbers from it.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::player::position::Position;
use crate::player::record::{dedupe_by_name, PlayerRecord, StatBag};
use crate::scoring::blend::{SeasonBlender, SeasonTags};
use crate::scoring::rules::ScoringRules;
use crate::scoring::stats::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Assumed split of penalty minutes: share of minutes and minutes per call.
const MINOR_SHARE: f64 = 0.80;
const MAJOR_SHARE: f64 = 0.15;
const MISCONDUCT_SHARE: f64 = 0.05;
const MINOR_MINUTES: f64 = 2.0;
const MAJOR_MINUTES: f64 = 5.0;
const MISCONDUCT_MINUTES: f64 = 10.0;

/// Players per position the correlation bonus compares against.
const TOP_PERFORMERS: usize = 10;
const CORRELATION_CAP: f64 = 10.0;
const SKATER_EDGE: f64 = 1.10;
const GOALIE_EDGE: f64 = 1.05;

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// A scoring category in a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreCategory {
    EvenStrengthGoals,
    PowerPlayGoals,
    ShorthandedGoals,
    GameWinningGoals,
    HatTricks,
    EvenStrengthAssists,
    PowerPlayAssists,
    ShorthandedAssists,
    Shots,
    Hits,
    BlockedShots,
    PlusMinus,
    MinorPenalties,
    MajorPenalties,
    Misconducts,
    Wins,
    Losses,
    Shutouts,
    Saves,
    GoalsAgainst,
}

impl ScoreCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ScoreCategory::EvenStrengthGoals => "Even-strength goals",
            ScoreCategory::PowerPlayGoals => "Power-play goals",
            ScoreCategory::ShorthandedGoals => "Shorthanded goals",
            ScoreCategory::GameWinningGoals => "Game-winning goals",
            ScoreCategory::HatTricks => "Hat tricks (est.)",
            ScoreCategory::EvenStrengthAssists => "Even-strength assists",
            ScoreCategory::PowerPlayAssists => "Power-play assists",
            ScoreCategory::ShorthandedAssists => "Shorthanded assists",
            ScoreCategory::Shots => "Shots",
            ScoreCategory::Hits => "Hits",
            ScoreCategory::BlockedShots => "Blocked shots",
            ScoreCategory::PlusMinus => "Plus/minus",
            ScoreCategory::MinorPenalties => "2-min penalties (est.)",
            ScoreCategory::MajorPenalties => "5-min penalties (est.)",
            ScoreCategory::Misconducts => "Misconducts (est.)",
            ScoreCategory::Wins => "Wins",
            ScoreCategory::Losses => "Losses",
            ScoreCategory::Shutouts => "Shutouts",
            ScoreCategory::Saves => "Saves",
            ScoreCategory::GoalsAgainst => "Goals against",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownLine {
    pub category: ScoreCategory,
    pub count: f64,
    pub per_unit: f64,
    pub points: f64,
}

/// Per-category point contributions for one player.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub name: String,
    pub team: String,
    pub position: Position,
    /// False when no statistics view could be resolved.
    pub has_stats: bool,
    pub games_played: f64,
    pub lines: Vec<BreakdownLine>,
    /// Sum of all lines, possibly negative.
    pub raw_total: f64,
    /// `raw_total` floored at zero.
    pub total: f64,
}

impl ScoreBreakdown {
    fn push(&mut self, category: ScoreCategory, count: f64, per_unit: f64) {
        if count == 0.0 {
            return;
        }
        let points = count * per_unit;
        self.raw_total += points;
        self.lines.push(BreakdownLine {
            category,
            count,
            per_unit,
            points,
        });
    }

    pub fn line(&self, category: ScoreCategory) -> Option<&BreakdownLine> {
        self.lines.iter().find(|l| l.category == category)
    }
}

// ---------------------------------------------------------------------------
// Scored players
// ---------------------------------------------------------------------------

/// A player with its points and value attached. Computed once per run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPlayer {
    /// Index into the scored pool; unique per run.
    pub id: usize,
    pub name: String,
    pub team: String,
    pub position: Position,
    /// 0.0 when unpriced.
    pub price: f64,
    pub fantasy_points: f64,
    pub correlation_bonus: f64,
    pub total_points: f64,
    /// `total_points / price`, 0.0 when unpriced.
    pub value_per_cost: f64,
    pub games_played: f64,
    /// GameScore per game.
    pub game_score: f64,
    pub has_stats: bool,
    #[serde(skip)]
    pub record: PlayerRecord,
}

impl ScoredPlayer {
    /// A player whose points were projected elsewhere. No correlation bonus,
    /// no raw statistics.
    pub fn from_points(id: usize, name: &str, position: Position, price: f64, points: f64) -> Self {
        let price = if price.is_finite() && price > 0.0 { price } else { 0.0 };
        ScoredPlayer {
            id,
            name: name.to_string(),
            team: String::new(),
            position,
            price,
            fantasy_points: points,
            correlation_bonus: 0.0,
            total_points: points,
            value_per_cost: if price > 0.0 { points / price } else { 0.0 },
            games_played: 0.0,
            game_score: 0.0,
            has_stats: true,
            record: PlayerRecord::new(name, "", position.code()).with_price(price),
        }
    }

    pub fn is_priced(&self) -> bool {
        self.price > 0.0
    }

    pub fn fantasy_points_per_game(&self) -> f64 {
        self.fantasy_points / self.games_played.max(1.0)
    }
}

/// Counters explaining why players did or did not score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoringReport {
    pub scored: usize,
    pub skipped_no_price: usize,
    pub skipped_no_stats: usize,
    pub duplicates_removed: usize,
    pub total_fantasy_points: f64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    rules: ScoringRules,
    blender: SeasonBlender,
    apply_correlation_bonus: bool,
}

impl ScoringEngine {
    pub fn new(rules: ScoringRules, tags: SeasonTags) -> Self {
        ScoringEngine {
            rules,
            blender: SeasonBlender::new(tags),
            apply_correlation_bonus: true,
        }
    }

    pub fn with_correlation_bonus(mut self, enabled: bool) -> Self {
        self.apply_correlation_bonus = enabled;
        self
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// The statistics view points are computed from.
    pub fn blended_stats(&self, record: &PlayerRecord) -> Option<StatBag> {
        self.blender.blended_stats(record)
    }

    /// Fantasy points, never negative. Zero when the record has no stats.
    pub fn calculate_points(&self, record: &PlayerRecord) -> f64 {
        self.breakdown(record).total
    }

    /// Fantasy points per unit of price; 0.0 when unpriced or pointless.
    pub fn calculate_player_value(&self, record: &PlayerRecord) -> f64 {
        let Some(price) = record.valid_price() else {
            return 0.0;
        };
        let points = self.calculate_points(record);
        if points <= 0.0 {
            return 0.0;
        }
        points / price
    }

    pub fn fantasy_points_per_game(&self, record: &PlayerRecord) -> f64 {
        let breakdown = self.breakdown(record);
        breakdown.total / breakdown.games_played.max(1.0)
    }

    /// GameScore per game. Skaters: goals×0.75 + assists×0.7 + shots×0.05 +
    /// blocked×0.05. Goalies: wins×0.5 + saves×0.01 − goalsAgainst×0.2.
    pub fn game_score(&self, record: &PlayerRecord) -> f64 {
        self.blended_stats(record)
            .map(|stats| game_score_from_stats(&stats, record.normalized_position()))
            .unwrap_or(0.0)
    }

    /// Per-category contributions for one player.
    pub fn breakdown(&self, record: &PlayerRecord) -> ScoreBreakdown {
        let position = record.normalized_position();
        match self.blended_stats(record) {
            Some(stats) => self.breakdown_from_stats(record, position, &stats),
            None => ScoreBreakdown {
                name: record.name.clone(),
                team: record.team.clone(),
                position,
                has_stats: false,
                games_played: 0.0,
                lines: Vec::new(),
                raw_total: 0.0,
                total: 0.0,
            },
        }
    }

    fn breakdown_from_stats(
        &self,
        record: &PlayerRecord,
        position: Position,
        stats: &StatBag,
    ) -> ScoreBreakdown {
        let mut out = ScoreBreakdown {
            name: record.name.clone(),
            team: record.team.clone(),
            position,
            has_stats: true,
            games_played: get_stat(stats, GAMES_PLAYED),
            lines: Vec::new(),
            raw_total: 0.0,
            total: 0.0,
        };
        let table = self.rules.table(position);

        if position == Position::Goalie {
            let goalie = &self.rules.goalie;
            out.push(ScoreCategory::Wins, get_stat(stats, WINS), goalie.win);
            out.push(ScoreCategory::Losses, get_stat(stats, LOSSES), goalie.loss);
            out.push(ScoreCategory::Shutouts, get_stat(stats, SHUTOUTS), goalie.shutout);
            let goals_against = get_stat(stats, GOALS_AGAINST);
            let mut saves = get_stat(stats, SAVES);
            if saves == 0.0 {
                saves = (get_stat(stats, SHOTS_AGAINST) - goals_against).max(0.0);
            }
            out.push(ScoreCategory::Saves, saves, goalie.save);
            out.push(ScoreCategory::GoalsAgainst, goals_against, goalie.goal_against);
        }

        // Goals split by strength.
        let goals = get_stat(stats, GOALS);
        let pp_goals = get_stat(stats, POWER_PLAY_GOALS);
        let sh_goals = get_stat(stats, SHORTHANDED_GOALS);
        let even_goals = (goals - pp_goals - sh_goals).max(0.0);
        out.push(ScoreCategory::EvenStrengthGoals, even_goals, table.goal_even);
        out.push(ScoreCategory::PowerPlayGoals, pp_goals, table.goal_power_play);
        out.push(ScoreCategory::ShorthandedGoals, sh_goals, table.goal_shorthanded);

        // Assists: special-teams points minus goals stand in for assists.
        let assists = get_stat(stats, ASSISTS);
        let pp_assists = (get_stat(stats, POWER_PLAY_POINTS) - pp_goals).max(0.0);
        let sh_assists = (get_stat(stats, SHORTHANDED_POINTS) - sh_goals).max(0.0);
        let even_assists = (assists - pp_assists - sh_assists).max(0.0);
        out.push(ScoreCategory::EvenStrengthAssists, even_assists, table.assist_even);
        out.push(ScoreCategory::PowerPlayAssists, pp_assists, table.assist_power_play);
        out.push(ScoreCategory::ShorthandedAssists, sh_assists, table.assist_shorthanded);

        if position != Position::Goalie {
            let common = &self.rules.common;
            out.push(
                ScoreCategory::GameWinningGoals,
                get_stat(stats, GAME_WINNING_GOALS),
                table.game_winning_goal,
            );
            out.push(ScoreCategory::HatTricks, table.estimated_hat_tricks(goals), table.hat_trick);
            out.push(ScoreCategory::Shots, get_stat(stats, SHOTS), common.shot);
            out.push(ScoreCategory::Hits, get_stat(stats, HITS), common.hit);
            out.push(ScoreCategory::BlockedShots, get_stat(stats, BLOCKED_SHOTS), table.blocked_shot);
            out.push(ScoreCategory::PlusMinus, get_stat(stats, PLUS_MINUS), common.plus_minus);

            let pim = get_stat(stats, PENALTY_MINUTES).max(0.0);
            let split = PenaltySplit::estimate(pim);
            out.push(ScoreCategory::MinorPenalties, split.minors, common.penalty_two_minutes);
            out.push(ScoreCategory::MajorPenalties, split.majors, common.penalty_five_minutes);
            out.push(ScoreCategory::Misconducts, split.misconducts, common.misconduct);
        }

        out.total = out.raw_total.max(0.0);
        out
    }

    // -- Correlation bonus --

    /// Bonus (0-10) for rate stats beating the top-10 average of the
    /// player's position. `top` holds the comparison players' stats.
    pub fn correlation_bonus(&self, stats: &StatBag, position: Position, top: &[&StatBag]) -> f64 {
        if top.is_empty() {
            return 0.0;
        }
        let bonus = if position == Position::Goalie {
            let save_pct = get_stat(stats, SAVE_PCT) * 100.0;
            let top_save_pct: Vec<f64> = top
                .iter()
                .map(|s| get_stat(s, SAVE_PCT) * 100.0)
                .filter(|v| *v > 0.0)
                .collect();
            let gaa = get_stat(stats, GOALS_AGAINST_AVG);
            let top_gaa: Vec<f64> = top
                .iter()
                .map(|s| get_stat(s, GOALS_AGAINST_AVG))
                .filter(|v| *v > 0.0)
                .collect();
            higher_is_better(save_pct, &top_save_pct, GOALIE_EDGE)
                + lower_is_better(gaa, &top_gaa, 2.0 - GOALIE_EDGE)
        } else {
            let shooting = get_stat(stats, SHOOTING_PCT) * 100.0;
            let top_shooting: Vec<f64> = top
                .iter()
                .map(|s| get_stat(s, SHOOTING_PCT) * 100.0)
                .filter(|v| *v > 0.0)
                .collect();
            let ppg = points_per_game(stats);
            let top_ppg: Vec<f64> = top
                .iter()
                .filter(|s| get_stat(s, GAMES_PLAYED) > 0.0)
                .map(|s| points_per_game(s))
                .collect();
            higher_is_better(shooting, &top_shooting, SKATER_EDGE)
                + higher_is_better(ppg, &top_ppg, SKATER_EDGE)
        };
        bonus.min(CORRELATION_CAP)
    }

    // -- Pool scoring --

    /// Score every record. Output order and `id` follow input order.
    pub fn score_all(&self, records: &[PlayerRecord]) -> Vec<ScoredPlayer> {
        let blended: Vec<Option<StatBag>> =
            records.iter().map(|r| self.blended_stats(r)).collect();

        let mut players: Vec<ScoredPlayer> = records
            .iter()
            .zip(&blended)
            .enumerate()
            .map(|(id, (record, stats))| {
                let position = record.normalized_position();
                let (fantasy_points, games_played, game_score) = match stats {
                    Some(s) => (
                        self.breakdown_from_stats(record, position, s).total,
                        get_stat(s, GAMES_PLAYED),
                        game_score_from_stats(s, position),
                    ),
                    None => (0.0, 0.0, 0.0),
                };
                ScoredPlayer {
                    id,
                    name: record.name.clone(),
                    team: record.team.clone(),
                    position,
                    price: record.valid_price().unwrap_or(0.0),
                    fantasy_points,
                    correlation_bonus: 0.0,
                    total_points: fantasy_points,
                    value_per_cost: 0.0,
                    games_played,
                    game_score,
                    has_stats: stats.is_some(),
                    record: record.clone(),
                }
            })
            .collect();

        if self.apply_correlation_bonus {
            let top = top_performers_by_position(&players);
            for player in players.iter_mut().filter(|p| p.has_stats) {
                let Some(stats) = blended[player.id].as_ref() else {
                    continue;
                };
                let comparison: Vec<&StatBag> = top
                    .get(&player.position)
                    .map(|ids| ids.iter().filter_map(|&i| blended[i].as_ref()).collect())
                    .unwrap_or_default();
                player.correlation_bonus = self.correlation_bonus(stats, player.position, &comparison);
                player.total_points = player.fantasy_points + player.correlation_bonus;
            }
        }

        for player in &mut players {
            if player.is_priced() {
                player.value_per_cost = player.total_points / player.price;
            }
        }
        players
    }

    /// De-duplicate, score, and count. Use this for a full pipeline run.
    pub fn score_pool(&self, records: Vec<PlayerRecord>) -> (Vec<ScoredPlayer>, ScoringReport) {
        let outcome = dedupe_by_name(records);
        let players = self.score_all(&outcome.players);

        let mut report = ScoringReport {
            duplicates_removed: outcome.duplicates_removed,
            ..Default::default()
        };
        for player in &players {
            if !player.is_priced() {
                report.skipped_no_price += 1;
                continue;
            }
            if !player.has_stats {
                report.skipped_no_stats += 1;
                continue;
            }
            report.scored += 1;
            report.total_fantasy_points += player.fantasy_points;
        }
        info!(
            scored = report.scored,
            no_price = report.skipped_no_price,
            no_stats = report.skipped_no_stats,
            duplicates = report.duplicates_removed,
            "scored player pool"
        );
        (players, report)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Estimated penalty counts from total penalty minutes. The split is a
/// statistical assumption, not data.
struct PenaltySplit {
    minors: f64,
    majors: f64,
    misconducts: f64,
}

impl PenaltySplit {
    fn estimate(pim: f64) -> Self {
        PenaltySplit {
            minors: (pim * MINOR_SHARE / MINOR_MINUTES).floor(),
            majors: (pim * MAJOR_SHARE / MAJOR_MINUTES).floor(),
            misconducts: (pim * MISCONDUCT_SHARE / MISCONDUCT_MINUTES).floor(),
        }
    }
}

pub fn game_score_from_stats(stats: &StatBag, position: Position) -> f64 {
    let games = get_stat(stats, GAMES_PLAYED).max(1.0);
    let score = if position == Position::Goalie {
        get_stat(stats, WINS) * 0.5 + get_stat(stats, SAVES) * 0.01 - get_stat(stats, GOALS_AGAINST) * 0.2
    } else {
        get_stat(stats, GOALS) * 0.75
            + get_stat(stats, ASSISTS) * 0.7
            + get_stat(stats, SHOTS) * 0.05
            + get_stat(stats, BLOCKED_SHOTS) * 0.05
    };
    score / games
}

fn points_per_game(stats: &StatBag) -> f64 {
    let points = if has_stat(stats, POINTS) {
        get_stat(stats, POINTS)
    } else {
        get_stat(stats, GOALS) + get_stat(stats, ASSISTS)
    };
    points / get_stat(stats, GAMES_PLAYED).max(1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn higher_is_better(value: f64, top: &[f64], edge: f64) -> f64 {
    match mean(top) {
        Some(avg) if value > 0.0 && value >= avg * edge => 2.0,
        Some(avg) if value > 0.0 && value >= avg => 1.0,
        _ => 0.0,
    }
}

fn lower_is_better(value: f64, top: &[f64], edge: f64) -> f64 {
    match mean(top) {
        Some(avg) if value > 0.0 && value <= avg * edge => 2.0,
        Some(avg) if value > 0.0 && value <= avg => 1.0,
        _ => 0.0,
    }
}

/// Ids of the top-10 players per position by fantasy points.
fn top_performers_by_position(players: &[ScoredPlayer]) -> BTreeMap<Position, Vec<usize>> {
    let mut by_position: BTreeMap<Position, Vec<&ScoredPlayer>> = BTreeMap::new();
    for player in players.iter().filter(|p| p.has_stats) {
        by_position.entry(player.position).or_default().push(player);
    }
    by_position
        .into_iter()
        .map(|(position, mut group)| {
            group.sort_by(|a, b| {
                b.fantasy_points
                    .partial_cmp(&a.fantasy_points)
                    .unwrap_or(Ordering::Equal)
            });
            let ids: Vec<usize> = group.iter().take(TOP_PERFORMERS).map(|p| p.id).collect();
            debug!(%position, count = ids.len(), "correlation comparison group");
            (position, ids)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
