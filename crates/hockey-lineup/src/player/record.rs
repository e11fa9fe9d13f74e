// Raw player records as they arrive from the API, CSV, or scraped price lists.
//
// A record carries statistics in whichever shape its source produced: an
// NHL API landing page (`featuredStats`, `seasonTotals`), a pre-split
// current/previous pair, a generic `stats` bag, or plain top-level columns.
// Resolving those shapes into one statistics view is the season blender's
// job; this module only holds and lightly cleans the data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::player::position::Position;
use crate::scoring::stats::{coerce_number, is_stat_key};

/// A flat key → JSON value mapping of raw statistics.
pub type StatBag = Map<String, Value>;

/// One player as supplied by the ingestion layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "teamAbbrev")]
    pub team: String,
    /// Position exactly as the source spelled it.
    #[serde(default, alias = "pos", alias = "positionCode")]
    pub position: String,
    /// `None` (or a non-positive value) means the player is unpriced.
    #[serde(default, alias = "cena", deserialize_with = "lenient_price")]
    pub price: Option<f64>,
    #[serde(
        default,
        rename = "featuredStats",
        deserialize_with = "lenient_bag",
        skip_serializing_if = "Option::is_none"
    )]
    pub featured_stats: Option<StatBag>,
    #[serde(
        default,
        rename = "seasonTotals",
        deserialize_with = "lenient_bags",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub season_totals: Vec<StatBag>,
    #[serde(
        default,
        alias = "current_season_stats",
        deserialize_with = "lenient_bag",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_season: Option<StatBag>,
    #[serde(default, deserialize_with = "lenient_bag", skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatBag>,
    #[serde(
        default,
        alias = "previous_season_stats",
        deserialize_with = "lenient_bag",
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_season: Option<StatBag>,
    /// Every other top-level field (CSV columns land here).
    #[serde(flatten)]
    pub extra: StatBag,
}

impl PlayerRecord {
    pub fn new(name: &str, team: &str, position: &str) -> Self {
        PlayerRecord {
            name: name.to_string(),
            team: team.to_string(),
            position: position.to_string(),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Attach a generic `stats` bag.
    pub fn with_stats(mut self, stats: StatBag) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_previous_season(mut self, stats: StatBag) -> Self {
        self.previous_season = Some(stats);
        self
    }

    pub fn normalized_position(&self) -> Position {
        Position::normalize(&self.position)
    }

    /// The price if it is usable for value calculations.
    pub fn valid_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// `featuredStats.regularSeason.subSeason`, when the record has it.
    pub fn featured_current(&self) -> Option<&StatBag> {
        self.featured_stats
            .as_ref()?
            .get("regularSeason")?
            .as_object()?
            .get("subSeason")?
            .as_object()
    }

    /// Top-level statistic fields that hold numbers (or numeric strings).
    /// Identity fields such as `playerId` are left out even when numeric.
    pub fn flat_numeric_stats(&self) -> StatBag {
        self.extra
            .iter()
            .filter(|(k, v)| is_stat_key(k) && coerce_number(v).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

fn lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_number))
}

fn lenient_bag<'de, D>(deserializer: D) -> Result<Option<StatBag>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => Ok(Some(map)),
        _ => Ok(None),
    }
}

fn lenient_bags<'de, D>(deserializer: D) -> Result<Vec<StatBag>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        _ => Ok(Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// De-duplication
// ---------------------------------------------------------------------------

/// Result of collapsing duplicate player names.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub players: Vec<PlayerRecord>,
    pub duplicates_removed: usize,
    pub nameless_dropped: usize,
}

/// Collapse records sharing a name into one.
///
/// A priced record replaces an unpriced one with the same name; otherwise the
/// first record seen is kept. Records without a name are dropped. First-seen
/// order is preserved.
pub fn dedupe_by_name(players: Vec<PlayerRecord>) -> DedupOutcome {
    let mut kept: Vec<PlayerRecord> = Vec::with_capacity(players.len());
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    let mut duplicates_removed = 0;
    let mut nameless_dropped = 0;

    for player in players {
        let name = player.name.trim().to_string();
        if name.is_empty() {
            nameless_dropped += 1;
            continue;
        }
        match index_by_name.get(&name) {
            Some(&idx) => {
                duplicates_removed += 1;
                if kept[idx].valid_price().is_none() && player.valid_price().is_some() {
                    kept[idx] = player;
                }
            }
            None => {
                index_by_name.insert(name, kept.len());
                kept.push(player);
            }
        }
    }

    DedupOutcome {
        players: kept,
        duplicates_removed,
        nameless_dropped,
    }
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
    fn deserializes_api_landing_shape() {
        let raw = json!({
            "name": "Cale Makar",
            "team": "COL",
            "position": "D",
            "cena": 30.9,
            "featuredStats": {
                "season": 20252026,
                "regularSeason": { "subSeason": { "gamesPlayed": 20, "goals": 6 } }
            },
            "seasonTotals": [
                { "season": 20242025, "leagueAbbrev": "NHL", "gameTypeId": 2, "gamesPlayed": 80 },
                "garbage"
            ]
        });
        let record: PlayerRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.price, Some(30.9));
        assert_eq!(record.normalized_position(), Position::Defender);
        let featured = record.featured_current().unwrap();
        assert_eq!(featured.get("goals"), Some(&json!(6)));
        assert_eq!(record.season_totals.len(), 1);
    }

    #[test]
    fn split_season_aliases_are_accepted() {
        let raw = json!({
            "name": "Rookie",
            "position": "C",
            "current_season_stats": { "gamesPlayed": 10 },
            "previous_season_stats": { "gamesPlayed": 0 }
        });
        let record: PlayerRecord = serde_json::from_value(raw).unwrap();
        assert!(record.current_season.is_some());
        assert!(record.previous_season.is_some());
        assert!(record.price.is_none());
    }

    #[test]
    fn string_price_and_non_object_stats_are_tolerated() {
        let raw = json!({ "name": "X", "price": "12.5", "stats": "n/a" });
        let record: PlayerRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.price, Some(12.5));
        assert!(record.stats.is_none());
    }

    #[test]
    fn flat_columns_collect_into_extra() {
        let raw = json!({ "name": "X", "goals": "7", "gamesPlayed": 30, "nationality": "CZE" });
        let record: PlayerRecord = serde_json::from_value(raw).unwrap();
        let flat = record.flat_numeric_stats();
        assert!(flat.contains_key("goals"));
        assert!(flat.contains_key("gamesPlayed"));
        assert!(!flat.contains_key("nationality"));
    }

    #[test]
    fn numeric_identity_fields_are_not_flat_stats() {
        let raw = json!({ "name": "X", "playerId": 8484801, "sweaterNumber": "17", "hits": 4 });
        let record: PlayerRecord = serde_json::from_value(raw).unwrap();
        let flat = record.flat_numeric_stats();
        assert_eq!(flat.len(), 1);
        assert!(flat.contains_key("hits"));
    }

    #[test]
    fn valid_price_rejects_zero_and_negative() {
        assert_eq!(PlayerRecord::new("A", "T", "F").valid_price(), None);
        assert_eq!(PlayerRecord::new("A", "T", "F").with_price(0.0).valid_price(), None);
        assert_eq!(PlayerRecord::new("A", "T", "F").with_price(-3.0).valid_price(), None);
        assert_eq!(PlayerRecord::new("A", "T", "F").with_price(8.0).valid_price(), Some(8.0));
    }

    #[test]
    fn dedupe_prefers_priced_record() {
        let players = vec![
            PlayerRecord::new("Jack Hughes", "NJD", "C"),
            PlayerRecord::new("Quinn Hughes", "VAN", "D").with_price(20.0),
            PlayerRecord::new("Jack Hughes", "NJD", "C").with_price(22.0),
            PlayerRecord::new("Quinn Hughes", "VAN", "D").with_stats(bag(json!({"goals": 1}))),
            PlayerRecord::new("  ", "", "F"),
        ];
        let outcome = dedupe_by_name(players);
        assert_eq!(outcome.players.len(), 2);
        assert_eq!(outcome.duplicates_removed, 2);
        assert_eq!(outcome.nameless_dropped, 1);
        assert_eq!(outcome.players[0].name, "Jack Hughes");
        assert_eq!(outcome.players[0].price, Some(22.0));
        // Both Quinn records priced/unpriced: the first priced one stays.
        assert_eq!(outcome.players[1].price, Some(20.0));
        assert!(outcome.players[1].stats.is_none());
    }
}
