// Player and price file loading.
//
// Players come as JSON (an array of records, or `{"players": [...]}`) or as
// CSV with one player per row. Prices come as scraped CSV lines, either
// `Name,Price` or `Name,Whole,Decimal` (`Makar C.,30,9` = 30.9).

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::player::record::PlayerRecord;
use crate::scoring::stats::coerce_number;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_players_json_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, serde_json::Error> {
    let root: Value = serde_json::from_reader(rdr)?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("players") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(<serde_json::Error as serde::de::Error>::custom(
                    "expected an array of players or an object with a `players` array",
                ))
            }
        },
        _ => {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "expected an array of players or an object with a `players` array",
            ))
        }
    };

    let mut players = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<PlayerRecord>(item) {
            Ok(record) => players.push(record),
            Err(e) => warn!("skipping malformed player entry #{}: {}", i, e),
        }
    }
    Ok(players)
}

/// Identity columns are matched case-insensitively; every other header is
/// kept verbatim as a flat statistic.
fn canonical_column(header: &str) -> String {
    match header.trim().to_lowercase().as_str() {
        "name" | "player" | "jméno" | "meno" => "name".into(),
        "team" | "tím" | "tým" => "team".into(),
        "position" | "pos" | "pozice" | "pozícia" => "position".into(),
        "price" | "cena" => "price".into(),
        _ => header.trim().to_string(),
    }
}

fn load_players_csv_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers: Vec<String> = reader.headers()?.iter().map(canonical_column).collect();

    let mut players = Vec::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
                continue;
            }
        };
        let mut fields = Map::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            let cell = cell.trim();
            if !cell.is_empty() {
                fields.insert(header.clone(), Value::String(cell.to_string()));
            }
        }
        match serde_json::from_value::<PlayerRecord>(Value::Object(fields)) {
            Ok(record) => players.push(record),
            Err(e) => warn!("skipping player row: {}", e),
        }
    }
    Ok(players)
}

/// Parse one price row. `None` for headers, comments, and garbage.
fn parse_price_row(fields: &[&str]) -> Option<(String, f64)> {
    let name = fields.first()?.trim();
    if name.is_empty() {
        return None;
    }
    let whole = fields.get(1)?.trim();
    let price = match fields.get(2).map(|d| d.trim()) {
        Some(decimal)
            if !decimal.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && decimal.chars().all(|c| c.is_ascii_digit()) =>
        {
            format!("{whole}.{decimal}").parse::<f64>().ok()?
        }
        _ => coerce_number(&Value::String(whole.to_string()))?,
    };
    Some((name.to_string(), price))
}

fn load_prices_from_reader<R: Read>(rdr: R) -> Result<HashMap<String, f64>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(rdr);
    let mut prices = HashMap::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed price row: {}", e);
                continue;
            }
        };
        let fields: Vec<&str> = row.iter().collect();
        let Some((name, price)) = parse_price_row(&fields) else {
            debug!("skipping non-price row: {:?}", fields);
            continue;
        };
        if price <= 0.0 {
            warn!("skipping price for '{}': non-positive value {}", name, price);
            continue;
        }
        if prices.contains_key(&name) {
            warn!("duplicate price entry for '{}', using latest value", name);
        }
        prices.insert(name, price);
    }
    Ok(prices)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load players from a `.json` or `.csv` file.
pub fn load_players(path: &Path) -> Result<Vec<PlayerRecord>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let players = match extension.as_str() {
        "json" => load_players_json_from_reader(open(path)?).map_err(|e| LoadError::Json {
            path: path.display().to_string(),
            source: e,
        })?,
        "csv" => load_players_csv_from_reader(open(path)?).map_err(|e| LoadError::Csv {
            path: path.display().to_string(),
            source: e,
        })?,
        other => {
            return Err(LoadError::Validation(format!(
                "unsupported player file type `{other}` for {} (expected .json or .csv)",
                path.display()
            )))
        }
    };
    if players.is_empty() {
        return Err(LoadError::Validation(format!(
            "{} produced zero players",
            path.display()
        )));
    }
    info!(count = players.len(), path = %path.display(), "loaded players");
    Ok(players)
}

/// Load a price list. Returns a map of player name → price.
pub fn load_prices(path: &Path) -> Result<HashMap<String, f64>, LoadError> {
    load_prices_from_reader(open(path)?).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Attach prices by exact, case-insensitive name match. Returns the number
/// of players priced.
pub fn apply_prices(players: &mut [PlayerRecord], prices: &HashMap<String, f64>) -> usize {
    let by_name: HashMap<String, f64> = prices
        .iter()
        .map(|(name, &price)| (name.trim().to_lowercase(), price))
        .collect();
    let mut matched = 0;
    for player in players.iter_mut() {
        if let Some(&price) = by_name.get(&player.name.trim().to_lowercase()) {
            player.price = Some(price);
            matched += 1;
        }
    }
    if matched < prices.len() {
        debug!(
            unmatched = prices.len() - matched,
            "price entries without a matching player"
        );
    }
    matched
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::position::Position;
    use crate::scoring::stats::{get_stat, GOALS};

    // -- JSON --

    #[test]
    fn json_array_of_players() {
        let data = r#"[
            {"name": "Nathan MacKinnon", "team": "COL", "position": "C", "price": 31.5,
             "stats": {"gamesPlayed": 20, "goals": 12}},
            {"name": "Igor Shesterkin", "team": "NYR", "position": "G"}
        ]"#;
        let players = load_players_json_from_reader(data.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].price, Some(31.5));
        assert_eq!(get_stat(players[0].stats.as_ref().unwrap(), GOALS), 12.0);
        assert_eq!(players[1].normalized_position(), Position::Goalie);
    }

    #[test]
    fn json_wrapped_in_players_key() {
        let data = r#"{"updated": "2025-10-01", "players": [{"name": "A"}]}"#;
        let players = load_players_json_from_reader(data.as_bytes()).unwrap();
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn json_non_object_entries_skipped() {
        let data = r#"[{"name": "A"}, 42, "junk", {"name": "B"}]"#;
        let players = load_players_json_from_reader(data.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
    }

    #[test]
    fn json_wrong_root_is_error() {
        assert!(load_players_json_from_reader(r#"{"items": []}"#.as_bytes()).is_err());
        assert!(load_players_json_from_reader("12".as_bytes()).is_err());
        assert!(load_players_json_from_reader("not json".as_bytes()).is_err());
    }

    // -- CSV --

    #[test]
    fn csv_rows_become_flat_stats() {
        let data = "\
Name,Team,Pos,Price,gamesPlayed,goals,assists
Cale Makar,COL,D,30.9,20,6,18
Connor McDavid, EDM ,C,,22,10,25
";
        let players = load_players_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Cale Makar");
        assert_eq!(players[0].normalized_position(), Position::Defender);
        assert_eq!(players[0].price, Some(30.9));
        assert_eq!(players[1].team, "EDM");
        assert_eq!(players[1].price, None);
        let flat = players[1].flat_numeric_stats();
        assert_eq!(get_stat(&flat, GOALS), 10.0);
    }

    #[test]
    fn csv_short_rows_are_tolerated() {
        let data = "name,position,goals\nA,C\nB,D,3\n";
        let players = load_players_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
        assert!(players[0].flat_numeric_stats().is_empty());
    }

    // -- Prices --

    #[test]
    fn price_rows_in_both_formats() {
        let data = "\
# scraped 2025-10-01
Name,Price
Makar C.,30,9
McDavid C.,32.5
Hughes Q.,25,45
";
        let prices = load_prices_from_reader(data.as_bytes()).unwrap();
        assert_eq!(prices.len(), 3);
        assert_eq!(prices["Makar C."], 30.9);
        assert_eq!(prices["McDavid C."], 32.5);
        assert_eq!(prices["Hughes Q."], 25.45);
    }

    #[test]
    fn price_rows_with_garbage_are_skipped() {
        let data = "A,abc\nB,0\nC,-3\n,12\nD\nE,7\n";
        let prices = load_prices_from_reader(data.as_bytes()).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["E"], 7.0);
    }

    #[test]
    fn duplicate_prices_keep_latest() {
        let data = "A,5\nA,6\n";
        let prices = load_prices_from_reader(data.as_bytes()).unwrap();
        assert_eq!(prices["A"], 6.0);
    }

    #[test]
    fn apply_prices_matches_case_insensitively() {
        let mut players = vec![
            PlayerRecord::new("Cale Makar", "COL", "D"),
            PlayerRecord::new("Nobody", "X", "F").with_price(1.0),
        ];
        let prices = HashMap::from([("cale makar".to_string(), 30.9), ("Ghost".to_string(), 5.0)]);
        let matched = apply_prices(&mut players, &prices);
        assert_eq!(matched, 1);
        assert_eq!(players[0].price, Some(30.9));
        assert_eq!(players[1].price, Some(1.0));
    }

    // -- Path loaders --

    #[test]
    fn unsupported_extension_is_validation_error() {
        let err = load_players(Path::new("players.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::Validation(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_players(Path::new("/nonexistent/players.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
