// Lineup history.
//
// Every run appends its starting lineup to a JSON file so earlier picks can
// be compared. Only the most recent `HISTORY_LIMIT` lineups are kept.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::lineup::greedy::Lineup;
use crate::loader::LoadError;

/// Number of lineups kept on disk.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPlayer {
    pub name: String,
    pub position: String,
    pub team: String,
    pub cost: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub cost: f64,
    pub points: f64,
    pub lineup: Vec<HistoryPlayer>,
}

impl HistoryEntry {
    /// Snapshot of a lineup's starters; substitutes are not recorded.
    pub fn from_lineup(lineup: &Lineup, timestamp: DateTime<Local>) -> Self {
        HistoryEntry {
            timestamp,
            cost: lineup.total_cost,
            points: lineup.raw_points,
            lineup: lineup
                .starters
                .iter()
                .map(|entry| HistoryPlayer {
                    name: entry.player.name.clone(),
                    position: entry.player.position.code().to_string(),
                    team: entry.player.team.clone(),
                    cost: entry.player.price,
                    points: entry.player.total_points,
                })
                .collect(),
        }
    }
}

/// Read the history file. A missing file is an empty history; an unreadable
/// or malformed one is logged and treated as empty so a run never fails on it.
pub fn load_history(path: &Path) -> Vec<HistoryEntry> {
    if !path.exists() {
        return Vec::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Vec<HistoryEntry>>(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not load lineup history from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Append an entry, trim to the newest `HISTORY_LIMIT`, and write the file.
/// Returns the history as written.
pub fn append_history(path: &Path, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, LoadError> {
    let mut entries = load_history(path);
    entries.push(entry);
    if entries.len() > HISTORY_LIMIT {
        entries.drain(..entries.len() - HISTORY_LIMIT);
    }

    let text = serde_json::to_string_pretty(&entries).map_err(|e| LoadError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoadError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    std::fs::write(path, text).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    debug!(entries = entries.len(), "lineup history saved to {}", path.display());
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
