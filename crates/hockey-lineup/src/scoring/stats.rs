// Alias-based statistic lookup.
//
// The same statistic reaches us under different keys depending on the feed
// (`goals` from the NHL API, `g` from CSV exports, `sog` vs `shots`, ...).
// Every formula downstream asks for a stat through one of the alias lists
// below, so the canonical name (always the first alias) is all they need to
// know about.

use serde_json::Value;

use crate::player::record::StatBag;

/// Ordered alias list; the first entry is the canonical key.
pub type Aliases = &'static [&'static str];

pub const GAMES_PLAYED: Aliases = &["gamesPlayed", "games", "gp", "games_played"];
pub const GOALS: Aliases = &["goals", "g"];
pub const ASSISTS: Aliases = &["assists", "a"];
pub const POINTS: Aliases = &["points", "pts"];
pub const SHOTS: Aliases = &["shots", "sog", "s"];
pub const HITS: Aliases = &["hits", "h"];
pub const BLOCKED_SHOTS: Aliases = &["blockedShots", "blocked", "bs"];
pub const POWER_PLAY_GOALS: Aliases = &["powerPlayGoals", "ppg"];
pub const POWER_PLAY_POINTS: Aliases = &["powerPlayPoints", "ppp"];
pub const SHORTHANDED_GOALS: Aliases = &["shorthandedGoals", "shg"];
pub const SHORTHANDED_POINTS: Aliases = &["shorthandedPoints", "shp"];
pub const GAME_WINNING_GOALS: Aliases = &["gameWinningGoals", "gwg"];
pub const PLUS_MINUS: Aliases = &["plusMinus", "plus_minus_rating", "plusminus"];
pub const PENALTY_MINUTES: Aliases = &["pim", "penaltyMinutes"];
pub const WINS: Aliases = &["wins", "w"];
pub const LOSSES: Aliases = &["losses", "l"];
pub const SHUTOUTS: Aliases = &["shutouts", "so"];
pub const SAVES: Aliases = &["saves", "sv", "savesTotal"];
pub const SHOTS_AGAINST: Aliases = &["shotsAgainst", "sa"];
pub const GOALS_AGAINST: Aliases = &["goalsAgainst", "ga"];
pub const SAVE_PCT: Aliases = &["savePctg", "savePercentage", "svPct"];
pub const GOALS_AGAINST_AVG: Aliases = &["goalsAgainstAverage", "gaa"];
pub const SHOOTING_PCT: Aliases = &["shootingPctg", "shootingPercentage", "sPct"];

/// Counting stats that season blending and rookie amplification operate on.
pub const TRACKED_STATS: &[Aliases] = &[
    GOALS,
    ASSISTS,
    POINTS,
    SHOTS,
    HITS,
    BLOCKED_SHOTS,
    POWER_PLAY_GOALS,
    POWER_PLAY_POINTS,
    SHORTHANDED_GOALS,
    SHORTHANDED_POINTS,
    GAME_WINNING_GOALS,
    PLUS_MINUS,
    PENALTY_MINUTES,
    WINS,
    LOSSES,
    SHUTOUTS,
    GOALS_AGAINST,
    SAVES,
];

/// Every alias list the scoring formulas read. Keys outside these lists are
/// identity or metadata fields (`playerId`, `sweaterNumber`, ...).
pub const KNOWN_STATS: &[Aliases] = &[
    GAMES_PLAYED,
    GOALS,
    ASSISTS,
    POINTS,
    SHOTS,
    HITS,
    BLOCKED_SHOTS,
    POWER_PLAY_GOALS,
    POWER_PLAY_POINTS,
    SHORTHANDED_GOALS,
    SHORTHANDED_POINTS,
    GAME_WINNING_GOALS,
    PLUS_MINUS,
    PENALTY_MINUTES,
    WINS,
    LOSSES,
    SHUTOUTS,
    SAVES,
    SHOTS_AGAINST,
    GOALS_AGAINST,
    SAVE_PCT,
    GOALS_AGAINST_AVG,
    SHOOTING_PCT,
];

/// Whether `key` is an alias of any known statistic.
pub fn is_stat_key(key: &str) -> bool {
    KNOWN_STATS.iter().any(|aliases| aliases.contains(&key))
}

/// Interpret a JSON value as a finite number.
///
/// Numbers pass through; strings are parsed after trimming (a decimal comma
/// is accepted, as Czech price lists use one). Everything else, including
/// NaN and infinities, is `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<f64>()
                .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
                .ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Resolve a statistic through its alias list.
///
/// Aliases are tried in order; the first one holding a numeric value wins.
/// Null or non-numeric values are skipped. Returns 0.0 when nothing usable
/// is present. Never fails.
pub fn get_stat(bag: &StatBag, aliases: &[&str]) -> f64 {
    aliases
        .iter()
        .filter_map(|key| bag.get(*key))
        .find_map(coerce_number)
        .unwrap_or(0.0)
}

/// Whether any alias of the stat is present with a numeric value.
pub fn has_stat(bag: &StatBag, aliases: &[&str]) -> bool {
    aliases
        .iter()
        .filter_map(|key| bag.get(*key))
        .any(|v| coerce_number(v).is_some())
}

/// Canonical key of an alias list.
pub fn canonical(aliases: Aliases) -> &'static str {
    aliases[0]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> StatBag {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn first_alias_wins() {
        let stats = bag(json!({ "goals": 12, "g": 99 }));
        assert_eq!(get_stat(&stats, GOALS), 12.0);
    }

    #[test]
    fn later_alias_used_when_canonical_missing() {
        let stats = bag(json!({ "sog": 140 }));
        assert_eq!(get_stat(&stats, SHOTS), 140.0);
    }

    #[test]
    fn missing_stat_is_zero() {
        let stats = bag(json!({}));
        assert_eq!(get_stat(&stats, HITS), 0.0);
        assert!(!has_stat(&stats, HITS));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let stats = bag(json!({ "pim": " 24 ", "savePctg": "0,915" }));
        assert_eq!(get_stat(&stats, PENALTY_MINUTES), 24.0);
        assert!((get_stat(&stats, SAVE_PCT) - 0.915).abs() < 1e-12);
    }

    #[test]
    fn non_numeric_value_yields_zero() {
        let stats = bag(json!({ "goals": "lots" }));
        assert_eq!(get_stat(&stats, GOALS), 0.0);
        let stats = bag(json!({ "goals": { "total": 3 } }));
        assert_eq!(get_stat(&stats, GOALS), 0.0);
    }

    #[test]
    fn null_and_garbage_fall_through_to_next_alias() {
        let stats = bag(json!({ "goals": null, "g": 4 }));
        assert_eq!(get_stat(&stats, GOALS), 4.0);
        let stats = bag(json!({ "goals": "n/a", "g": "5" }));
        assert_eq!(get_stat(&stats, GOALS), 5.0);
    }

    #[test]
    fn booleans_are_not_numbers() {
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!(-3)), Some(-3.0));
    }

    #[test]
    fn identity_fields_are_not_stats() {
        assert!(is_stat_key("goals"));
        assert!(is_stat_key("sa"));
        assert!(is_stat_key("savePctg"));
        assert!(!is_stat_key("playerId"));
        assert!(!is_stat_key("sweaterNumber"));
    }

    #[test]
    fn canonical_is_first_alias() {
        for aliases in TRACKED_STATS {
            assert_eq!(canonical(aliases), aliases[0]);
        }
        assert_eq!(canonical(BLOCKED_SHOTS), "blockedShots");
    }
}
