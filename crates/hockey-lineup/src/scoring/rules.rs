// Per-position scoring tables.
//
// Values follow the Tipsport fantasy rules. Any entry can be overridden from
// the `[league.scoring]` table in league.toml; tables not mentioned there
// keep these defaults.

use serde::{Deserialize, Serialize};

use crate::player::position::Position;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Goal, assist, and skater-only values for one position tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkaterTable {
    pub goal_even: f64,
    pub goal_power_play: f64,
    pub goal_shorthanded: f64,
    pub assist_even: f64,
    pub assist_power_play: f64,
    pub assist_shorthanded: f64,
    pub game_winning_goal: f64,
    pub blocked_shot: f64,
    pub hat_trick: f64,
    /// Season goal total below which no hat tricks are estimated.
    pub hat_trick_min_goals: f64,
    /// One estimated hat trick per this many goals.
    pub goals_per_hat_trick: f64,
    /// Guarantee at least one hat trick once the threshold is reached.
    pub hat_trick_at_least_one: bool,
}

impl SkaterTable {
    pub fn forward() -> Self {
        SkaterTable {
            goal_even: 12.0,
            goal_power_play: 10.0,
            goal_shorthanded: 16.0,
            assist_even: 12.0,
            assist_power_play: 12.0,
            assist_shorthanded: 12.0,
            game_winning_goal: 4.0,
            blocked_shot: 4.0,
            hat_trick: 6.0,
            hat_trick_min_goals: 30.0,
            goals_per_hat_trick: 10.0,
            hat_trick_at_least_one: true,
        }
    }

    pub fn defender() -> Self {
        SkaterTable {
            goal_even: 20.0,
            goal_power_play: 18.0,
            goal_shorthanded: 24.0,
            hat_trick_min_goals: 20.0,
            goals_per_hat_trick: 15.0,
            hat_trick_at_least_one: false,
            ..SkaterTable::forward()
        }
    }

    /// Estimated number of hat tricks for a season goal total.
    pub fn estimated_hat_tricks(&self, goals: f64) -> f64 {
        if goals < self.hat_trick_min_goals || self.goals_per_hat_trick <= 0.0 {
            return 0.0;
        }
        let count = (goals / self.goals_per_hat_trick).floor();
        if self.hat_trick_at_least_one {
            count.max(1.0)
        } else {
            count
        }
    }
}

/// Values shared by every skater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonScoring {
    pub shot: f64,
    pub hit: f64,
    pub plus_minus: f64,
    pub penalty_two_minutes: f64,
    pub penalty_five_minutes: f64,
    pub misconduct: f64,
}

impl Default for CommonScoring {
    fn default() -> Self {
        CommonScoring {
            shot: 2.0,
            hit: 2.0,
            plus_minus: 2.0,
            penalty_two_minutes: -2.0,
            penalty_five_minutes: -4.0,
            misconduct: -2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalieScoring {
    pub win: f64,
    pub loss: f64,
    pub shutout: f64,
    pub save: f64,
    pub goal_against: f64,
}

impl Default for GoalieScoring {
    fn default() -> Self {
        GoalieScoring {
            win: 6.0,
            loss: -6.0,
            shutout: 10.0,
            save: 1.0,
            goal_against: -4.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// The complete scoring configuration, keyed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringRules {
    pub forward: SkaterTable,
    pub defender: SkaterTable,
    /// Goals and assists by goalies; forward-tier values.
    pub goalie_skater: SkaterTable,
    pub goalie: GoalieScoring,
    pub common: CommonScoring,
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules {
            forward: SkaterTable::forward(),
            defender: SkaterTable::defender(),
            goalie_skater: SkaterTable::forward(),
            goalie: GoalieScoring::default(),
            common: CommonScoring::default(),
        }
    }
}

impl ScoringRules {
    /// Goal/assist table used for a position.
    pub fn table(&self, position: Position) -> &SkaterTable {
        match position {
            Position::Forward => &self.forward,
            Position::Defender => &self.defender,
            Position::Goalie => &self.goalie_skater,
        }
    }

    /// Default rules with the entries in `overrides` replaced.
    ///
    /// `overrides` mirrors the shape of the rules (`forward.goal_even = 14`,
    /// `goalie.save = 0.5`, ...). Unknown keys and wrongly typed values are
    /// rejected.
    pub fn with_overrides(overrides: &toml::Table) -> Result<Self, toml::de::Error> {
        let defaults = toml::Table::try_from(ScoringRules::default())
            .map_err(|e| <toml::de::Error as serde::de::Error>::custom(e.to_string()))?;
        let merged = merge_tables(defaults, overrides);
        merged.try_into()
    }
}

fn merge_tables(mut base: toml::Table, overrides: &toml::Table) -> toml::Table {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                let merged = merge_tables(std::mem::take(existing), nested);
                *existing = merged;
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
    base
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
