// Position normalization across data sources.
//
// Player feeds encode positions in many ways: NHL API codes (C, LW, RW, D, G),
// long English names, and Czech/Slovak labels from the Tipsport price lists.
// Every one of them collapses onto exactly one of three lineup positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lineup position. The derive order (G, D, F) is the order used for
/// grouping, quota filling, and report sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "G")]
    Goalie,
    #[serde(rename = "D")]
    Defender,
    #[serde(rename = "F")]
    Forward,
}

const GOALIE_ALIASES: &[&str] = &["G", "GOALIE", "GOALKEEPER", "B", "BRANKÁR", "BRANKÁŘ", "BRANKAŘ"];

const DEFENDER_ALIASES: &[&str] = &[
    "D",
    "DEFENSE",
    "DEFENCE",
    "DEFENDER",
    "DEFENSEMAN",
    "DEFENCEMAN",
    "O",
    "OBRANCA",
    "OBRÁNCA",
    "OBRÁNCE",
];

/// All lineup positions in grouping order.
pub const ALL_POSITIONS: [Position; 3] = [Position::Goalie, Position::Defender, Position::Forward];

impl Position {
    /// Map any raw position string onto a lineup position.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Forward codes (C, LW, RW, F, "Útočník", ...) and anything unrecognized
    /// resolve to `Forward`.
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if GOALIE_ALIASES.contains(&upper.as_str()) {
            Position::Goalie
        } else if DEFENDER_ALIASES.contains(&upper.as_str()) {
            Position::Defender
        } else {
            Position::Forward
        }
    }

    /// Short code used in reports and config keys.
    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalie => "G",
            Position::Defender => "D",
            Position::Forward => "F",
        }
    }

    /// Plural heading for report sections.
    pub fn section_title(&self) -> &'static str {
        match self {
            Position::Goalie => "GOALKEEPERS",
            Position::Defender => "DEFENDERS",
            Position::Forward => "FORWARDS",
        }
    }

    /// Parse a config key ("G", "D", "F", or any alias). Unlike `normalize`,
    /// this returns `None` for strings that are not a known alias, so a typo
    /// in a roster table is reported instead of silently becoming a forward.
    pub fn from_config_key(key: &str) -> Option<Self> {
        let upper = key.trim().to_uppercase();
        if GOALIE_ALIASES.contains(&upper.as_str()) {
            Some(Position::Goalie)
        } else if DEFENDER_ALIASES.contains(&upper.as_str()) {
            Some(Position::Defender)
        } else if matches!(upper.as_str(), "F" | "FORWARD" | "C" | "LW" | "RW" | "W" | "CENTER" | "WING") {
            Some(Position::Forward)
        } else {
            None
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
