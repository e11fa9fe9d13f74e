// Integration tests for the lineup optimizer.
//
// These tests drive the public API end to end: loading fixture files,
// attaching prices, scoring the pool, and building lineups with both
// optimizers.

use std::collections::HashSet;
use std::path::Path;

use serde_json::json;

use hockey_lineup::lineup::constraints::LineupConstraints;
use hockey_lineup::lineup::greedy::{
    LineupOptimizer, LineupRole, LineupWarning, OptimizerSettings, RankMetric,
};
use hockey_lineup::lineup::nonlinear::{NonlinearOptimizer, NonlinearSettings, ProjectionModel};
use hockey_lineup::lineup::report::{self, RankingFormat};
use hockey_lineup::loader;
use hockey_lineup::player::position::{Position, ALL_POSITIONS};
use hockey_lineup::player::record::{PlayerRecord, StatBag};
use hockey_lineup::scoring::blend::SeasonTags;
use hockey_lineup::scoring::engine::{ScoredPlayer, ScoringEngine};
use hockey_lineup::scoring::rules::ScoringRules;

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the crate root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn bag(value: serde_json::Value) -> StatBag {
    value.as_object().cloned().unwrap()
}

/// Default rules and season tags fixed to the fixture data (2025-26).
fn engine() -> ScoringEngine {
    ScoringEngine::new(ScoringRules::default(), SeasonTags::default())
}

/// Fixture players with the fixture price list applied.
fn fixture_records() -> Vec<PlayerRecord> {
    let mut records = loader::load_players(&Path::new(FIXTURES).join("players.json")).unwrap();
    let prices = loader::load_prices(&Path::new(FIXTURES).join("prices.csv")).unwrap();
    loader::apply_prices(&mut records, &prices);
    records
}

fn fixture_pool() -> Vec<ScoredPlayer> {
    engine().score_pool(fixture_records()).0
}

fn assert_exclusive(ids: &[usize]) {
    let unique: HashSet<usize> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "player appears twice: {ids:?}");
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn json_fixture_loads_every_shape() {
    let records = loader::load_players(&Path::new(FIXTURES).join("players.json")).unwrap();
    assert_eq!(records.len(), 19);

    let hellebuyck = records.iter().find(|r| r.name == "Connor Hellebuyck").unwrap();
    assert_eq!(hellebuyck.team, "WPG");
    assert_eq!(hellebuyck.normalized_position(), Position::Goalie);
    assert!(hellebuyck.featured_current().is_some());

    let makar = records.iter().find(|r| r.name == "Cale Makar").unwrap();
    assert_eq!(makar.season_totals.len(), 3);
    assert!(makar.price.is_none());
}

#[test]
fn price_list_fills_missing_prices() {
    let mut records = loader::load_players(&Path::new(FIXTURES).join("players.json")).unwrap();
    let prices = loader::load_prices(&Path::new(FIXTURES).join("prices.csv")).unwrap();
    assert_eq!(prices.len(), 3);

    let matched = loader::apply_prices(&mut records, &prices);
    assert_eq!(matched, 2);

    let price_of = |name: &str| records.iter().find(|r| r.name == name).unwrap().price;
    assert_eq!(price_of("Connor McDavid"), Some(24.5));
    assert_eq!(price_of("Cale Makar"), Some(22.9));
}

#[test]
fn csv_fixture_loads_flat_rows() {
    let records = loader::load_players(&Path::new(FIXTURES).join("players.csv")).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1].name, "Miro Heiskanen");
    assert_eq!(records[1].normalized_position(), Position::Defender);
    assert_eq!(records[1].price, Some(14.2));

    // The nameless row is dropped during de-duplication, not loading.
    let (scored, report) = engine().score_pool(records);
    assert_eq!(scored.len(), 3);
    assert_eq!(report.duplicates_removed, 0);
    let aho = scored.iter().find(|p| p.name == "Sebastian Aho").unwrap();
    assert!(aho.has_stats);
    assert!(aho.fantasy_points > 0.0);
}

// ===========================================================================
// Scoring
// ===========================================================================

#[test]
fn pool_counters_explain_skipped_players() {
    let (scored, report) = engine().score_pool(fixture_records());
    assert_eq!(scored.len(), 18);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.skipped_no_stats, 1);
    assert_eq!(report.skipped_no_price, 1);
    assert_eq!(report.scored, 16);

    let fox = scored.iter().find(|p| p.name == "Adam Fox").unwrap();
    assert!(approx_eq(fox.price, 13.0));

    let veteran = scored.iter().find(|p| p.name == "Injured Veteran").unwrap();
    assert!(!veteran.has_stats);
    assert_eq!(veteran.fantasy_points, 0.0);
    assert_eq!(veteran.value_per_cost, 0.0);

    let prospect = scored.iter().find(|p| p.name == "Unsigned Prospect").unwrap();
    assert!(prospect.fantasy_points > 0.0);
    assert_eq!(prospect.value_per_cost, 0.0);
}

#[test]
fn every_scored_player_is_non_negative() {
    for player in fixture_pool() {
        assert!(player.fantasy_points >= 0.0, "{} scored negative", player.name);
        assert!(player.correlation_bonus >= 0.0 && player.correlation_bonus <= 10.0);
    }
}

#[test]
fn forward_season_line_scores_1114() {
    let record: PlayerRecord = serde_json::from_value(json!({
        "name": "Scenario Forward",
        "position": "C",
        "price": 10.0,
        "stats": {
            "goals": 20, "assists": 30, "shots": 200, "hits": 50, "blockedShots": 10,
            "plusMinus": 5, "pim": 40, "gamesPlayed": 82
        }
    }))
    .unwrap();
    let engine = engine();
    assert!(approx_eq(engine.calculate_points(&record), 1114.0));
    assert!(approx_eq(engine.calculate_player_value(&record), 111.4));

    let breakdown = engine.breakdown(&record);
    assert!(approx_eq(breakdown.total, 1114.0));
    let text = report::render_breakdown(&breakdown);
    assert!(text.contains("TOTAL: 1114.0"));
}

#[test]
fn empty_stats_score_zero() {
    let record = PlayerRecord::new("Nobody", "", "D").with_stats(StatBag::new());
    assert_eq!(engine().calculate_points(&record), 0.0);
    let text = report::render_breakdown(&engine().breakdown(&record));
    assert!(text.contains("no statistics available"));
}

#[test]
fn zero_current_games_ignores_previous_season() {
    let current = bag(json!({ "gamesPlayed": 0, "goals": 0, "assists": 0 }));
    let record = PlayerRecord::new("Late Starter", "SEA", "F")
        .with_stats(current.clone())
        .with_previous_season(bag(json!({ "gamesPlayed": 82, "goals": 40, "assists": 50 })));
    let blended = engine().blended_stats(&record).unwrap();
    assert_eq!(blended, current);
    assert_eq!(engine().calculate_points(&record), 0.0);
}

#[test]
fn blending_keeps_current_games_played() {
    let records = fixture_records();
    let kucherov = records.iter().find(|r| r.name == "Nikita Kucherov").unwrap();
    let blended = engine().blended_stats(kucherov).unwrap();
    assert_eq!(blended.get("gamesPlayed").and_then(|v| v.as_f64()), Some(18.0));

    let makar = records.iter().find(|r| r.name == "Cale Makar").unwrap();
    let blended = engine().blended_stats(makar).unwrap();
    assert_eq!(blended.get("gamesPlayed").and_then(|v| v.as_f64()), Some(21.0));
}

// ===========================================================================
// Greedy optimizer
// ===========================================================================

#[test]
fn greedy_builds_complete_exclusive_lineup() {
    let players = fixture_pool();
    let constraints = LineupConstraints::default();
    let lineup = LineupOptimizer::new(OptimizerSettings::default()).optimize(&players, &constraints);

    assert!(lineup.is_complete(&constraints), "warnings: {:?}", lineup.warnings);
    assert_eq!(lineup.starters.len(), 12);
    assert_exclusive(&lineup.player_ids());
    assert!(lineup.total_cost <= constraints.max_budget * 1.15 + 1e-9);
    assert!(approx_eq(
        lineup.effective_points,
        constraints.effective_points(lineup.raw_points, lineup.total_cost)
    ));

    for entry in &lineup.starters {
        assert!(entry.player.is_priced());
        assert!(entry.player.has_stats);
    }

    let captain = lineup.captain_entry().unwrap();
    let best = lineup
        .starters
        .iter()
        .map(|e| e.player.total_points)
        .fold(f64::MIN, f64::max);
    assert!(approx_eq(captain.player.total_points, best));
    assert_eq!(
        lineup.starters.iter().filter(|e| e.role == LineupRole::Captain).count(),
        1
    );
}

#[test]
fn greedy_by_total_points_is_also_complete() {
    let players = fixture_pool();
    let constraints = LineupConstraints::default();
    let settings = OptimizerSettings {
        rank_by: RankMetric::TotalPoints,
        ..Default::default()
    };
    let lineup = LineupOptimizer::new(settings).optimize(&players, &constraints);
    assert!(lineup.is_complete(&constraints));
    assert_exclusive(&lineup.player_ids());
}

#[test]
fn substitutes_stay_exclusive_and_cheaper() {
    let players = fixture_pool();
    let constraints = LineupConstraints::starters_and_substitutes();
    let settings = OptimizerSettings {
        substitutes: true,
        ..Default::default()
    };
    let lineup = LineupOptimizer::new(settings).optimize(&players, &constraints);

    assert_eq!(lineup.starters.len(), 6);
    assert!(!lineup.substitutes.is_empty());
    assert_exclusive(&lineup.player_ids());

    let starter_cost: f64 = lineup.starters.iter().map(|e| e.player.price).sum();
    assert!(approx_eq(lineup.total_cost, starter_cost));

    for sub in &lineup.substitutes {
        let LineupRole::Substitute { replaces } = sub.role else {
            panic!("unexpected role {:?}", sub.role);
        };
        let starter = lineup.starters.iter().find(|e| e.player.id == replaces).unwrap();
        assert_eq!(sub.player.position, starter.player.position);
        assert!(sub.player.price < starter.player.price);
    }
}

#[test]
fn exact_quota_position_takes_every_candidate() {
    let mut players = vec![
        ScoredPlayer::from_points(0, "Expensive Goalie A", Position::Goalie, 90.0, 300.0),
        ScoredPlayer::from_points(1, "Expensive Goalie B", Position::Goalie, 95.0, 280.0),
    ];
    for i in 0..5 {
        players.push(ScoredPlayer::from_points(2 + i, &format!("D{i}"), Position::Defender, 1.0, 50.0));
    }
    for i in 0..7 {
        players.push(ScoredPlayer::from_points(7 + i, &format!("F{i}"), Position::Forward, 1.0, 60.0));
    }

    let constraints = LineupConstraints::default();
    let lineup = LineupOptimizer::new(OptimizerSettings::default()).optimize(&players, &constraints);

    assert_eq!(lineup.count(Position::Goalie), 2);
    assert!(lineup.has_warning(|w| matches!(
        w,
        LineupWarning::NoAlternatives {
            position: Position::Goalie,
            candidates: 2,
            required: 2
        }
    )));
    assert_exclusive(&lineup.player_ids());
}

#[test]
fn empty_pool_returns_warnings_not_errors() {
    let constraints = LineupConstraints::default();
    let lineup = LineupOptimizer::new(OptimizerSettings::default()).optimize(&[], &constraints);
    assert!(lineup.starters.is_empty());
    assert!(!lineup.warnings.is_empty());
}

// ===========================================================================
// Nonlinear optimizer
// ===========================================================================

#[test]
fn nonlinear_fills_every_position() {
    let players = fixture_pool();
    let constraints = LineupConstraints::default();
    let result = NonlinearOptimizer::new(NonlinearSettings::default()).optimize(&players, &constraints);

    assert!(matches!(result.model, ProjectionModel::Regression { .. }));
    assert!(result.iterations > 0);
    for position in ALL_POSITIONS {
        assert_eq!(result.lineup.count(position), constraints.required(position));
    }
    assert_exclusive(&result.lineup.player_ids());
    for entry in &result.lineup.starters {
        assert!(entry.player.is_priced());
    }
}

// ===========================================================================
// Budget penalty
// ===========================================================================

#[test]
fn fifteen_over_base_costs_fifteen_percent() {
    let constraints = LineupConstraints::default();
    assert!(approx_eq(constraints.budget_penalty(115.0), 0.15));
    assert!(approx_eq(constraints.effective_points(1000.0, 115.0), 850.0));
    assert!(approx_eq(constraints.effective_points(1000.0, 60.0), 1000.0));
}

// ===========================================================================
// Reports
// ===========================================================================

#[test]
fn lineup_report_lists_every_section() {
    let players = fixture_pool();
    let constraints = LineupConstraints::default();
    let lineup = LineupOptimizer::new(OptimizerSettings::default()).optimize(&players, &constraints);
    let text = report::render_lineup(&lineup, &constraints);

    assert!(text.contains("GOALKEEPERS (2/2):"));
    assert!(text.contains("DEFENDERS (4/4):"));
    assert!(text.contains("FORWARDS (6/6):"));
    assert!(text.contains("(C)"));
}

#[test]
fn rankings_export_as_csv() {
    let players = fixture_pool();
    let csv = report::export_rankings(&players, RankMetric::ValuePerCost, RankingFormat::Csv, Some(5))
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Rank,Name,Position,Team,Price,Points,Value per Cost");
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("1,"));
    assert!(!csv.contains("Unsigned Prospect"));
}

#[test]
fn lineup_serializes_to_json() {
    let players = fixture_pool();
    let constraints = LineupConstraints::default();
    let lineup = LineupOptimizer::new(OptimizerSettings::default()).optimize(&players, &constraints);
    let value = serde_json::to_value(&lineup).unwrap();
    let starters = value["starters"].as_array().unwrap();
    assert_eq!(starters.len(), 12);
    assert!(starters.iter().any(|s| s["role"] == "captain"));
    assert!(starters[0]["player"].get("record").is_none());
}
