// Plain-text rendering of lineups, scoring breakdowns, and rankings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::lineup::constraints::LineupConstraints;
use crate::lineup::greedy::{Lineup, LineupEntry, LineupRole, RankMetric};
use crate::player::position::ALL_POSITIONS;
use crate::scoring::engine::{ScoreBreakdown, ScoredPlayer, ScoringReport};

const RULE_WIDTH: usize = 70;

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

// ---------------------------------------------------------------------------
// Lineup
// ---------------------------------------------------------------------------

fn entry_line(entry: &LineupEntry) -> String {
    let p = &entry.player;
    let marker = if entry.role == LineupRole::Captain { " (C)" } else { "" };
    let name = format!("{}{}", p.name, marker);
    format!(
        "  {:<30} {:<4} | {:>6.2} | FP: {:>7.1} | Value: {:>6.2}",
        name, p.team, p.price, p.total_points, p.value_per_cost
    )
}

/// Budget summary, points, and players grouped G/D/F.
pub fn render_lineup(lineup: &Lineup, constraints: &LineupConstraints) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "OPTIMAL FANTASY LINEUP");
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out);

    let used_pct = if constraints.max_budget > 0.0 {
        lineup.total_cost / constraints.max_budget * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "Total cost:       {:.2} / {:.2} ({:.1}% of cap)",
        lineup.total_cost, constraints.max_budget, used_pct
    );
    let _ = writeln!(
        out,
        "Over base budget: {:.2}",
        (lineup.total_cost - constraints.base_budget).max(0.0)
    );
    let _ = writeln!(out, "Raw points:       {:.1}", lineup.raw_points);
    if lineup.penalty > 0.0 {
        let _ = writeln!(
            out,
            "Budget penalty:   {:.1}% (-{:.1} points)",
            lineup.penalty * 100.0,
            lineup.raw_points * lineup.penalty
        );
    }
    let _ = writeln!(out, "Effective points: {:.1}", lineup.effective_points);

    for position in ALL_POSITIONS {
        let mut entries: Vec<&LineupEntry> = lineup
            .starters
            .iter()
            .filter(|e| e.player.position == position)
            .collect();
        if entries.is_empty() && constraints.required(position) == 0 {
            continue;
        }
        entries.sort_by(|a, b| {
            b.player
                .total_points
                .partial_cmp(&a.player.total_points)
                .unwrap_or(Ordering::Equal)
        });
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} ({}/{}):",
            position.section_title(),
            entries.len(),
            constraints.required(position)
        );
        let _ = writeln!(out, "{}", rule('-'));
        for entry in entries {
            let _ = writeln!(out, "{}", entry_line(entry));
        }
    }

    if !lineup.substitutes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "SUBSTITUTES:");
        let _ = writeln!(out, "{}", rule('-'));
        for sub in &lineup.substitutes {
            let replaces = match sub.role {
                LineupRole::Substitute { replaces } => lineup
                    .starters
                    .iter()
                    .find(|e| e.player.id == replaces)
                    .map(|e| e.player.name.as_str())
                    .unwrap_or("?"),
                _ => "?",
            };
            let _ = writeln!(out, "{}  -> for {}", entry_line(sub), replaces);
        }
    }

    if !lineup.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "WARNINGS:");
        for warning in &lineup.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    let _ = writeln!(out, "{}", rule('='));
    out
}

// ---------------------------------------------------------------------------
// Breakdown and counters
// ---------------------------------------------------------------------------

pub fn render_breakdown(breakdown: &ScoreBreakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scoring breakdown: {} ({}, {})",
        breakdown.name, breakdown.team, breakdown.position
    );
    if !breakdown.has_stats {
        let _ = writeln!(out, "  no statistics available");
        return out;
    }
    let _ = writeln!(out, "  Games played: {:.0}", breakdown.games_played);
    for line in &breakdown.lines {
        let _ = writeln!(
            out,
            "  {:<24} {:>8.1} x {:>5.1} = {:>8.1}",
            line.category.label(),
            line.count,
            line.per_unit,
            line.points
        );
    }
    if breakdown.raw_total < 0.0 {
        let _ = writeln!(out, "  Raw total {:.1} floored at 0", breakdown.raw_total);
    }
    let _ = writeln!(out, "  TOTAL: {:.1}", breakdown.total);
    out
}

pub fn render_scoring_report(report: &ScoringReport) -> String {
    format!(
        "Scored {} players ({:.0} fantasy points); skipped {} without price, {} without stats; removed {} duplicates",
        report.scored,
        report.total_fantasy_points,
        report.skipped_no_price,
        report.skipped_no_stats,
        report.duplicates_removed
    )
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingFormat {
    Text,
    Csv,
    Markdown,
}

#[derive(Debug, Serialize)]
struct RankingRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Position")]
    position: &'static str,
    #[serde(rename = "Team")]
    team: &'a str,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Points")]
    points: String,
    #[serde(rename = "Value per Cost")]
    value_per_cost: String,
}

/// Priced players ranked best-first by `metric`, at most `limit` rows.
pub fn export_rankings(
    players: &[ScoredPlayer],
    metric: RankMetric,
    format: RankingFormat,
    limit: Option<usize>,
) -> Result<String, csv::Error> {
    let mut ranked: Vec<&ScoredPlayer> = players.iter().filter(|p| p.is_priced()).collect();
    ranked.sort_by(|a, b| {
        metric
            .of(b)
            .partial_cmp(&metric.of(a))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit.unwrap_or(usize::MAX));

    let mut out = String::new();
    match format {
        RankingFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for (i, p) in ranked.iter().enumerate() {
                writer.serialize(RankingRow {
                    rank: i + 1,
                    name: &p.name,
                    position: p.position.code(),
                    team: &p.team,
                    price: format!("{:.2}", p.price),
                    points: format!("{:.2}", p.total_points),
                    value_per_cost: format!("{:.3}", p.value_per_cost),
                })?;
            }
            let bytes = writer.into_inner().map_err(|e| e.into_error())?;
            out = String::from_utf8_lossy(&bytes).into_owned();
        }
        RankingFormat::Markdown => {
            let _ = writeln!(out, "| Rank | Name | Pos | Team | Price | Points | Value |");
            let _ = writeln!(out, "|------|------|-----|------|-------|--------|-------|");
            for (i, p) in ranked.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {:.2} | {:.1} | {:.3} |",
                    i + 1,
                    p.name,
                    p.position,
                    p.team,
                    p.price,
                    p.total_points,
                    p.value_per_cost
                );
            }
        }
        RankingFormat::Text => {
            for (i, p) in ranked.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{:>4}. {:<30} {:<2} {:<4} {:>6.2} {:>8.1} {:>7.3}",
                    i + 1,
                    p.name,
                    p.position,
                    p.team,
                    p.price,
                    p.total_points,
                    p.value_per_cost
                );
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineup::greedy::{LineupOptimizer, LineupWarning, OptimizerSettings};
    use crate::player::position::Position;
    use crate::player::record::PlayerRecord;
    use crate::scoring::engine::ScoringEngine;
    use serde_json::json;

    fn players() -> Vec<ScoredPlayer> {
        vec![
            ScoredPlayer::from_points(0, "Alpha", Position::Goalie, 10.0, 400.0),
            ScoredPlayer::from_points(1, "Bravo", Position::Defender, 8.0, 300.0),
            ScoredPlayer::from_points(2, "Charlie", Position::Forward, 5.0, 350.0),
            ScoredPlayer::from_points(3, "Delta", Position::Forward, 0.0, 999.0),
        ]
    }

    #[test]
    fn lineup_report_sections_and_captain() {
        let mut constraints = LineupConstraints::default().with_budget(20.0, 40.0);
        constraints.required_positions = [(Position::Goalie, 1), (Position::Defender, 1), (Position::Forward, 1)]
            .into_iter()
            .collect();
        let lineup = LineupOptimizer::default().optimize(&players(), &constraints);
        let text = render_lineup(&lineup, &constraints);
        assert!(text.contains("GOALKEEPERS (1/1):"));
        assert!(text.contains("DEFENDERS (1/1):"));
        assert!(text.contains("FORWARDS (1/1):"));
        assert!(text.contains("Alpha (C)"));
        // 23 spent against a base of 20.
        assert!(text.contains("Budget penalty:   3.0%"));
        assert!(!text.contains("Delta"));
    }

    #[test]
    fn lineup_report_lists_substitutes_and_warnings() {
        let mut pool = players();
        pool.push(ScoredPlayer::from_points(4, "Echo", Position::Forward, 2.0, 100.0));
        let mut constraints = LineupConstraints::starters_and_substitutes();
        constraints.required_positions.insert(Position::Forward, 1);
        let lineup = LineupOptimizer::new(OptimizerSettings {
            substitutes: true,
            ..Default::default()
        })
        .optimize(&pool, &constraints);
        let text = render_lineup(&lineup, &constraints);
        assert!(text.contains("SUBSTITUTES:"));
        assert!(text.contains("-> for Charlie"));
        assert!(text.contains("WARNINGS:"));
        assert!(lineup
            .warnings
            .iter()
            .any(|w| matches!(w, LineupWarning::UnderfilledPosition { position: Position::Defender, .. })));
    }

    #[test]
    fn breakdown_lists_categories() {
        let record = PlayerRecord::new("Skater", "TST", "C")
            .with_stats(json!({ "goals": 20, "shots": 100, "gamesPlayed": 82 }).as_object().cloned().unwrap());
        let text = render_breakdown(&ScoringEngine::default().breakdown(&record));
        assert!(text.contains("Scoring breakdown: Skater (TST, F)"));
        assert!(text.contains("Even-strength goals"));
        assert!(text.contains("TOTAL: 440.0"));
    }

    #[test]
    fn breakdown_without_stats() {
        let text = render_breakdown(&ScoringEngine::default().breakdown(&PlayerRecord::new("X", "Y", "G")));
        assert!(text.contains("no statistics available"));
    }

    #[test]
    fn csv_rankings_skip_unpriced_and_rank_by_value() {
        let csv = export_rankings(&players(), RankMetric::ValuePerCost, RankingFormat::Csv, None).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Rank,Name,Position,Team,Price,Points,Value per Cost");
        assert!(lines[1].starts_with("1,Charlie,F,"));
        assert_eq!(lines.len(), 4);
        assert!(!csv.contains("Delta"));
    }

    #[test]
    fn text_and_markdown_rankings_respect_limit() {
        let text = export_rankings(&players(), RankMetric::TotalPoints, RankingFormat::Text, Some(2)).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("Alpha"));
        let md = export_rankings(&players(), RankMetric::TotalPoints, RankingFormat::Markdown, Some(1)).unwrap();
        assert_eq!(md.lines().count(), 3);
    }

    #[test]
    fn scoring_report_line() {
        let report = ScoringReport {
            scored: 3,
            skipped_no_price: 1,
            skipped_no_stats: 2,
            duplicates_removed: 4,
            total_fantasy_points: 1234.4,
        };
        let text = render_scoring_report(&report);
        assert!(text.starts_with("Scored 3 players (1234 fantasy points)"));
        assert!(text.contains("removed 4 duplicates"));
    }
}
