// Lineup constraints and the budget-overage penalty.
//
// Spending above the base budget costs a fixed fraction of the lineup's
// points per unit of overage. The penalty has no upper bound: far enough
// over budget, effective points go negative.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::player::position::{Position, ALL_POSITIONS};

/// Budget and roster shape for one optimization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupConstraints {
    /// Spending up to this amount carries no penalty.
    pub base_budget: f64,
    /// Hard cap for greedy construction.
    pub max_budget: f64,
    /// Fraction of points lost per unit spent above `base_budget`.
    pub penalty_per_unit: f64,
    pub required_positions: BTreeMap<Position, usize>,
}

impl Default for LineupConstraints {
    /// 100 base, 200 cap, 1% per unit over, 2G + 4D + 6F.
    fn default() -> Self {
        LineupConstraints {
            base_budget: 100.0,
            max_budget: 200.0,
            penalty_per_unit: 0.01,
            required_positions: roster(2, 4, 6),
        }
    }
}

impl LineupConstraints {
    /// The starter half of the starters-plus-substitutes model: 1G + 2D + 3F.
    pub fn starters_and_substitutes() -> Self {
        LineupConstraints {
            required_positions: roster(1, 2, 3),
            ..Default::default()
        }
    }

    pub fn with_budget(mut self, base_budget: f64, max_budget: f64) -> Self {
        self.base_budget = base_budget;
        self.max_budget = max_budget;
        self
    }

    pub fn required(&self, position: Position) -> usize {
        self.required_positions.get(&position).copied().unwrap_or(0)
    }

    /// Total number of lineup slots.
    pub fn total_required(&self) -> usize {
        self.required_positions.values().sum()
    }

    /// Penalty fraction for a lineup cost: `max(0, cost - base) * rate`.
    pub fn budget_penalty(&self, total_cost: f64) -> f64 {
        (total_cost - self.base_budget).max(0.0) * self.penalty_per_unit
    }

    /// `raw_points * (1 - penalty)`.
    pub fn effective_points(&self, raw_points: f64, total_cost: f64) -> f64 {
        raw_points * (1.0 - self.budget_penalty(total_cost))
    }
}

fn roster(goalies: usize, defenders: usize, forwards: usize) -> BTreeMap<Position, usize> {
    ALL_POSITIONS
        .into_iter()
        .zip([goalies, defenders, forwards])
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn default_roster_is_twelve() {
        let c = LineupConstraints::default();
        assert_eq!(c.required(Position::Goalie), 2);
        assert_eq!(c.required(Position::Defender), 4);
        assert_eq!(c.required(Position::Forward), 6);
        assert_eq!(c.total_required(), 12);
    }

    #[test]
    fn starter_model_is_six() {
        let c = LineupConstraints::starters_and_substitutes();
        assert_eq!(c.total_required(), 6);
        assert_eq!(c.required(Position::Defender), 2);
    }

    #[test]
    fn no_penalty_at_or_below_base() {
        let c = LineupConstraints::default();
        for cost in [0.0, 50.0, 99.99, 100.0] {
            assert_eq!(c.budget_penalty(cost), 0.0);
            assert_eq!(c.effective_points(500.0, cost), 500.0);
        }
    }

    #[test]
    fn fifteen_over_costs_fifteen_percent() {
        let c = LineupConstraints::default();
        assert!(approx_eq(c.budget_penalty(115.0), 0.15, 1e-12));
        assert!(approx_eq(c.effective_points(1000.0, 115.0), 850.0, 1e-9));
    }

    #[test]
    fn effective_points_non_increasing_in_cost() {
        let c = LineupConstraints::default();
        let mut last = f64::INFINITY;
        for step in 0..400 {
            let cost = step as f64 * 0.5;
            let eff = c.effective_points(1200.0, cost);
            assert!(eff <= last, "effective points rose at cost {cost}");
            last = eff;
        }
    }

    #[test]
    fn penalty_is_uncapped_and_can_go_negative() {
        let c = LineupConstraints::default();
        assert!(approx_eq(c.budget_penalty(250.0), 1.5, 1e-12));
        assert!(c.effective_points(1000.0, 250.0) < 0.0);
    }

    #[test]
    fn unknown_position_requires_nothing() {
        let mut c = LineupConstraints::default();
        c.required_positions.remove(&Position::Goalie);
        assert_eq!(c.required(Position::Goalie), 0);
        assert_eq!(c.total_required(), 10);
    }
}
