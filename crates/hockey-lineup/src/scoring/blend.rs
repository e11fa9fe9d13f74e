// Season blending: one "current-effective" statistics view per player.
//
// Early in a season the current sample is tiny, so per-game rates are mixed
// with the previous season's rates. The current-season share follows a
// logistic curve over games played and the blended rate is projected back
// onto the current season's games, never onto the sum of both seasons.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::player::record::{PlayerRecord, StatBag};
use crate::scoring::stats::{
    canonical, coerce_number, get_stat, has_stat, Aliases, GAMES_PLAYED, GOALS_AGAINST, SAVES,
    SHOTS_AGAINST, TRACKED_STATS,
};

// ---------------------------------------------------------------------------
// Curve constants
// ---------------------------------------------------------------------------

/// Upper asymptote of the current-season weight.
const WEIGHT_CEILING: f64 = 0.92;
/// Steepness of the logistic transition.
const WEIGHT_STEEPNESS: f64 = 0.08;
/// Games played at the inflection point.
const WEIGHT_MIDPOINT: f64 = 35.0;
const WEIGHT_FLOOR: f64 = 0.15;
const SEASON_LENGTH: f64 = 82.0;

const AMPLIFICATION_BASE: f64 = 1.05;
const AMPLIFICATION_SPREAD: f64 = 0.30;
const AMPLIFICATION_DECAY_GAMES: f64 = 20.0;
const AMPLIFICATION_NO_GAMES: f64 = 1.40;

/// Regular-season game type in NHL season records.
pub const REGULAR_SEASON_GAME_TYPE: i64 = 2;

// ---------------------------------------------------------------------------
// Season tags
// ---------------------------------------------------------------------------

/// Identifies which season-tagged records count as current and previous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonTags {
    pub current: String,
    pub previous: String,
    pub league: String,
    pub game_type: i64,
}

impl SeasonTags {
    /// Tags for the season in progress on `date`. Seasons start in October,
    /// so anything before July belongs to the season that began last year.
    pub fn for_date(date: NaiveDate) -> Self {
        let start_year = if date.month() < 7 {
            date.year() - 1
        } else {
            date.year()
        };
        SeasonTags {
            current: format!("{}{}", start_year, start_year + 1),
            previous: format!("{}{}", start_year - 1, start_year),
            league: "NHL".into(),
            game_type: REGULAR_SEASON_GAME_TYPE,
        }
    }
}

impl Default for SeasonTags {
    fn default() -> Self {
        SeasonTags {
            current: "20252026".into(),
            previous: "20242025".into(),
            league: "NHL".into(),
            game_type: REGULAR_SEASON_GAME_TYPE,
        }
    }
}

// ---------------------------------------------------------------------------
// Weighting curves
// ---------------------------------------------------------------------------

/// Share of the blend given to each season.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonWeights {
    pub current: f64,
    pub previous: f64,
}

/// Current-season weight as a function of current games played.
///
/// `w = 0.92 / (1 + e^(-0.08 * (min(g, 82) - 35)))`, clamped to
/// `[0.15, 1.0]`. Zero (or negative) games short-circuits to the floor.
pub fn season_weights(current_games: f64) -> SeasonWeights {
    let current = if current_games <= 0.0 {
        WEIGHT_FLOOR
    } else {
        let g = current_games.min(SEASON_LENGTH);
        let w = WEIGHT_CEILING / (1.0 + (-WEIGHT_STEEPNESS * (g - WEIGHT_MIDPOINT)).exp());
        w.clamp(WEIGHT_FLOOR, 1.0)
    };
    SeasonWeights {
        current,
        previous: 1.0 - current,
    }
}

/// Small-sample multiplier for players without a usable previous season.
///
/// `1.05 + 0.30 * e^(-games / 20)` for games > 0, 1.40 otherwise.
pub fn rookie_amplification(games: f64) -> f64 {
    if games <= 0.0 {
        AMPLIFICATION_NO_GAMES
    } else {
        AMPLIFICATION_BASE + AMPLIFICATION_SPREAD * (-games / AMPLIFICATION_DECAY_GAMES).exp()
    }
}

/// Scale every tracked counting stat by the rookie amplification factor.
///
/// This is a standalone transform; the default scoring path does not apply
/// it. Every alias key present with a numeric value is scaled, other keys
/// (games played, rate stats) are copied unchanged.
pub fn amplify_rookie(stats: &StatBag) -> StatBag {
    let factor = rookie_amplification(get_stat(stats, GAMES_PLAYED));
    let mut amplified = stats.clone();
    for aliases in TRACKED_STATS {
        for key in aliases.iter() {
            if let Some(v) = amplified.get(*key).and_then(coerce_number) {
                amplified.insert((*key).to_string(), json!(v * factor));
            }
        }
    }
    amplified
}

/// A counting stat as blending reads it. Goalie lines that report shots
/// against but no saves get saves derived from the difference.
fn counting_stat(bag: &StatBag, aliases: Aliases) -> f64 {
    if aliases == SAVES && !has_stat(bag, SAVES) {
        return (get_stat(bag, SHOTS_AGAINST) - get_stat(bag, GOALS_AGAINST)).max(0.0);
    }
    get_stat(bag, aliases)
}

/// Blend current and previous season per-game rates.
///
/// Returns the current view verbatim when there is no previous season or no
/// current games. Otherwise every tracked stat is replaced by
/// `(w_cur * cur/g_cur + w_prev * prev/g_prev) * g_cur`, written under its
/// canonical key, and `gamesPlayed` is set to the current games.
pub fn blend_seasons(current: &StatBag, previous: Option<&StatBag>) -> StatBag {
    let current_games = get_stat(current, GAMES_PLAYED);
    let previous = match previous {
        Some(p) if !p.is_empty() && current_games > 0.0 => p,
        _ => return current.clone(),
    };

    let weights = season_weights(current_games);
    let previous_games = get_stat(previous, GAMES_PLAYED);

    let mut blended = current.clone();
    for aliases in TRACKED_STATS {
        let current_per_game = counting_stat(current, aliases) / current_games;
        let previous_per_game = if previous_games > 0.0 {
            counting_stat(previous, aliases) / previous_games
        } else {
            0.0
        };
        let per_game = current_per_game * weights.current + previous_per_game * weights.previous;
        blended.insert(canonical(aliases).to_string(), json!(per_game * current_games));
    }
    blended.insert(canonical(GAMES_PLAYED).to_string(), json!(current_games));
    blended
}

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

/// Where the current-season view of a record came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CurrentSource {
    Featured,
    SeasonTotals,
    CurrentSeason,
    Stats,
    FlatFields,
}

/// The current and previous season views found on a record.
#[derive(Debug, Clone)]
pub struct SeasonSources {
    pub current: Option<(CurrentSource, StatBag)>,
    pub previous: Option<StatBag>,
}

fn tag_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn is_regular_league_season(entry: &StatBag, tags: &SeasonTags) -> bool {
    let league = entry
        .get("leagueAbbrev")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let game_type = entry.get("gameTypeId").and_then(coerce_number);
    league == tags.league && game_type == Some(tags.game_type as f64)
}

/// Locate the current and previous season views on a record.
///
/// Current season, first non-empty wins:
/// 1. `featuredStats.regularSeason.subSeason`
/// 2. `seasonTotals` entries tagged with the current season (league and
///    regular-season game type must match; several entries merge with the
///    first value per key kept)
/// 3. `current_season` bag
/// 4. generic `stats` bag
/// 5. numeric top-level fields
///
/// Previous season: the last `seasonTotals` entry tagged with the previous
/// season, else the `previous_season` bag.
pub fn resolve_sources(record: &PlayerRecord, tags: &SeasonTags) -> SeasonSources {
    let mut totals_current = StatBag::new();
    let mut totals_previous: Option<StatBag> = None;
    for entry in &record.season_totals {
        if !is_regular_league_season(entry, tags) {
            continue;
        }
        let season = tag_string(entry.get("season"));
        if season == tags.current {
            for (key, value) in entry {
                if !value.is_null() && !totals_current.contains_key(key) {
                    totals_current.insert(key.clone(), value.clone());
                }
            }
        } else if season == tags.previous {
            totals_previous = Some(entry.clone());
        }
    }

    let flat = record.flat_numeric_stats();
    let candidates: [(CurrentSource, Option<&StatBag>); 5] = [
        (CurrentSource::Featured, record.featured_current()),
        (CurrentSource::SeasonTotals, Some(&totals_current)),
        (CurrentSource::CurrentSeason, record.current_season.as_ref()),
        (CurrentSource::Stats, record.stats.as_ref()),
        (CurrentSource::FlatFields, Some(&flat)),
    ];
    let current = candidates
        .into_iter()
        .find_map(|(source, bag)| bag.filter(|b| !b.is_empty()).map(|b| (source, b.clone())));

    let previous = totals_previous
        .or_else(|| record.previous_season.clone())
        .filter(|b| !b.is_empty());

    SeasonSources { current, previous }
}

// ---------------------------------------------------------------------------
// Blender
// ---------------------------------------------------------------------------

/// Produces the blended statistics view the scoring engine works from.
#[derive(Debug, Clone, Default)]
pub struct SeasonBlender {
    pub tags: SeasonTags,
}

impl SeasonBlender {
    pub fn new(tags: SeasonTags) -> Self {
        SeasonBlender { tags }
    }

    /// Blended statistics for a record, or `None` when the record carries no
    /// statistics at all.
    pub fn blended_stats(&self, record: &PlayerRecord) -> Option<StatBag> {
        let sources = resolve_sources(record, &self.tags);
        let (source, current) = sources.current?;
        let current_games = get_stat(&current, GAMES_PLAYED);
        if let Some(previous) = sources.previous.as_ref() {
            if current_games > 0.0 {
                let weights = season_weights(current_games);
                debug!(
                    player = %record.name,
                    ?source,
                    current_games,
                    previous_games = get_stat(previous, GAMES_PLAYED),
                    weight_current = weights.current,
                    "blending seasons"
                );
            }
        }
        Some(blend_seasons(&current, sources.previous.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
