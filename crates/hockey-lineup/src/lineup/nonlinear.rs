// Nonlinear lineup formulation: continuous relaxation, rounding, repair.
//
// Season points are projected from GameScore with a least-squares line (or a
// pool-wide ratio when there is too little data). Selection is relaxed to
// x ∈ [0,1] per player and solved by projected gradient ascent on
//
//     f(x) = P(x) * (1 - penalty(C(x))) - mu * max(0, C(x) - max_budget)^2
//
// where each step is projected back onto "exactly n_pos selected per
// position". The relaxed solution is rounded to the top-N players and
// position quotas are repaired by value per cost.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::lineup::constraints::LineupConstraints;
use crate::lineup::greedy::{Lineup, LineupWarning};
use crate::player::position::Position;
use crate::scoring::engine::ScoredPlayer;

const PROJECTION_BISECTION_STEPS: usize = 100;
const CONVERGENCE_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Settings and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearSettings {
    pub max_iterations: usize,
    /// Initial step, as a fraction of the unit box per iteration.
    pub step_size: f64,
    /// Fewer valid samples than this switches to the ratio projection.
    pub min_regression_samples: usize,
    /// Games a projected per-game rate is multiplied by.
    pub season_games: f64,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        NonlinearSettings {
            max_iterations: 1000,
            step_size: 0.05,
            min_regression_samples: 10,
            season_games: 82.0,
        }
    }
}

/// How fantasy points per game were projected from GameScore.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ProjectionModel {
    /// `fp_per_game = slope * game_score + intercept`.
    Regression {
        slope: f64,
        intercept: f64,
        r_squared: f64,
        samples: usize,
    },
    /// `fp_per_game = game_score * points_per_game_score`.
    Ratio {
        points_per_game_score: f64,
        samples: usize,
    },
    /// No usable GameScore at all; observed points per game are kept.
    Observed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub player_id: usize,
    pub position: Position,
    pub price: f64,
    pub games: f64,
    pub game_score: f64,
    pub fp_per_game: f64,
    pub projected_fp_per_game: f64,
    pub projected_season_points: f64,
    pub value_per_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    Added { player_id: usize, position: Position },
    Dropped { player_id: usize, position: Position },
}

#[derive(Debug, Clone, Serialize)]
pub struct NonlinearResult {
    /// Starters carry projected season points as `total_points`.
    pub lineup: Lineup,
    pub model: ProjectionModel,
    pub projections: Vec<Projection>,
    pub iterations: usize,
    pub converged: bool,
    pub repairs: Vec<RepairAction>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Least-squares fit `y = slope * x + intercept`, with R².
fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };
    (slope, intercept, r_squared)
}

/// Project season points for every priced player with games played.
pub fn project_points(
    players: &[ScoredPlayer],
    settings: &NonlinearSettings,
) -> (ProjectionModel, Vec<Projection>) {
    let eligible: Vec<&ScoredPlayer> = players
        .iter()
        .filter(|p| p.is_priced() && p.games_played > 0.0)
        .collect();

    let (xs, ys): (Vec<f64>, Vec<f64>) = eligible
        .iter()
        .map(|p| (p.game_score, p.fantasy_points_per_game()))
        .filter(|(gs, fp)| *gs > 0.0 && *fp > 0.0)
        .unzip();

    let model = if xs.len() >= settings.min_regression_samples.max(2) {
        let (slope, intercept, r_squared) = linear_fit(&xs, &ys);
        info!(slope, intercept, r_squared, samples = xs.len(), "fitted GameScore regression");
        ProjectionModel::Regression {
            slope,
            intercept,
            r_squared,
            samples: xs.len(),
        }
    } else {
        let total_fp: f64 = eligible.iter().map(|p| p.fantasy_points).sum();
        let total_gs: f64 = eligible.iter().map(|p| p.game_score * p.games_played).sum();
        warn!(samples = xs.len(), "insufficient data for regression, using ratio projection");
        if total_gs > 0.0 {
            ProjectionModel::Ratio {
                points_per_game_score: total_fp / total_gs,
                samples: eligible.len(),
            }
        } else {
            ProjectionModel::Observed
        }
    };

    let projections = eligible
        .iter()
        .map(|p| {
            let fp_per_game = p.fantasy_points_per_game();
            let projected = match &model {
                ProjectionModel::Regression {
                    slope, intercept, ..
                } => slope * p.game_score + intercept,
                ProjectionModel::Ratio {
                    points_per_game_score,
                    ..
                } => p.game_score * points_per_game_score,
                ProjectionModel::Observed => fp_per_game,
            }
            .max(0.0);
            let season = projected * settings.season_games;
            Projection {
                player_id: p.id,
                position: p.position,
                price: p.price,
                games: p.games_played,
                game_score: p.game_score,
                fp_per_game,
                projected_fp_per_game: projected,
                projected_season_points: season,
                value_per_cost: season / p.price,
            }
        })
        .collect();

    (model, projections)
}

// ---------------------------------------------------------------------------
// Relaxation
// ---------------------------------------------------------------------------

/// Euclidean projection of `values` onto `{x ∈ [0,1]^n : Σx = k}`.
fn project_capped_simplex(values: &mut [f64], k: f64) {
    let n = values.len() as f64;
    if values.is_empty() {
        return;
    }
    if k <= 0.0 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    if k >= n {
        values.iter_mut().for_each(|v| *v = 1.0);
        return;
    }
    let clamped_sum = |tau: f64, vals: &[f64]| -> f64 {
        vals.iter().map(|v| (v - tau).clamp(0.0, 1.0)).sum()
    };
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min) - 1.0;
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for _ in 0..PROJECTION_BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if clamped_sum(mid, values) > k {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let tau = 0.5 * (lo + hi);
    values.iter_mut().for_each(|v| *v = (*v - tau).clamp(0.0, 1.0));
}

struct Relaxation<'a> {
    points: Vec<f64>,
    costs: Vec<f64>,
    /// Indices into `points` per required position, with the quota.
    groups: Vec<(Vec<usize>, f64)>,
    constraints: &'a LineupConstraints,
    budget_weight: f64,
}

impl Relaxation<'_> {
    fn totals(&self, x: &[f64]) -> (f64, f64) {
        let p = x.iter().zip(&self.points).map(|(xi, pi)| xi * pi).sum();
        let c = x.iter().zip(&self.costs).map(|(xi, ci)| xi * ci).sum();
        (p, c)
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let (p, c) = self.totals(x);
        let limits = self.constraints;
        let keep = 1.0 - limits.budget_penalty(c);
        let penalty_slope = if c > limits.base_budget { limits.penalty_per_unit } else { 0.0 };
        let excess = (c - limits.max_budget).max(0.0);
        self.points
            .iter()
            .zip(&self.costs)
            .map(|(pi, ci)| pi * keep - p * penalty_slope * ci - 2.0 * self.budget_weight * excess * ci)
            .collect()
    }

    fn project(&self, x: &mut [f64]) {
        for (indices, quota) in &self.groups {
            let mut sub: Vec<f64> = indices.iter().map(|&i| x[i]).collect();
            project_capped_simplex(&mut sub, *quota);
            for (&i, v) in indices.iter().zip(sub) {
                x[i] = v;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NonlinearOptimizer {
    pub settings: NonlinearSettings,
}

impl NonlinearOptimizer {
    pub fn new(settings: NonlinearSettings) -> Self {
        NonlinearOptimizer { settings }
    }

    pub fn optimize(&self, players: &[ScoredPlayer], constraints: &LineupConstraints) -> NonlinearResult {
        let (model, projections) = project_points(players, &self.settings);
        if projections.is_empty() {
            warn!("no valid players for nonlinear optimization");
            return NonlinearResult {
                lineup: Lineup {
                    warnings: vec![
                        LineupWarning::NoValidPlayers,
                        LineupWarning::PartialLineup {
                            selected: 0,
                            required: constraints.total_required(),
                        },
                    ],
                    ..Default::default()
                },
                model,
                projections,
                iterations: 0,
                converged: false,
                repairs: Vec::new(),
            };
        }

        let mut groups: BTreeMap<Position, Vec<usize>> = BTreeMap::new();
        for (i, proj) in projections.iter().enumerate() {
            groups.entry(proj.position).or_default().push(i);
        }

        // Start from the best value-per-cost players in each position.
        let mut x = vec![0.0; projections.len()];
        for (&position, &required) in &constraints.required_positions {
            let mut ranked = groups.get(&position).cloned().unwrap_or_default();
            sort_by_value_desc(&mut ranked, &projections);
            for &i in ranked.iter().take(required) {
                x[i] = 1.0;
            }
        }

        let total_points: f64 = projections.iter().map(|p| p.projected_season_points).sum();
        let relaxation = Relaxation {
            points: projections.iter().map(|p| p.projected_season_points).collect(),
            costs: projections.iter().map(|p| p.price).collect(),
            groups: constraints
                .required_positions
                .iter()
                .map(|(pos, &n)| (groups.get(pos).cloned().unwrap_or_default(), n as f64))
                .collect(),
            constraints,
            budget_weight: total_points / constraints.max_budget.max(1.0),
        };
        relaxation.project(&mut x);

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.settings.max_iterations {
            iterations += 1;
            let grad = relaxation.gradient(&x);
            let scale = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if scale == 0.0 {
                converged = true;
                break;
            }
            let step = self.settings.step_size / (1.0 + iterations as f64 / 100.0).sqrt();
            let mut next: Vec<f64> = x
                .iter()
                .zip(&grad)
                .map(|(xi, gi)| xi + step * gi / scale)
                .collect();
            relaxation.project(&mut next);
            let moved = next
                .iter()
                .zip(&x)
                .fold(0.0_f64, |m, (a, b)| m.max((a - b).abs()));
            x = next;
            if moved < CONVERGENCE_TOLERANCE {
                converged = true;
                break;
            }
        }
        let (relaxed_points, relaxed_cost) = relaxation.totals(&x);
        debug!(iterations, converged, relaxed_points, relaxed_cost, "relaxation solved");

        // Round: keep the N largest relaxed values.
        let slots = constraints.total_required();
        let mut order: Vec<usize> = (0..projections.len()).collect();
        order.sort_by(|&a, &b| x[b].partial_cmp(&x[a]).unwrap_or(Ordering::Equal));
        let mut chosen: Vec<usize> = order.into_iter().take(slots).collect();

        let mut warnings = Vec::new();
        let repairs = repair_positions(&mut chosen, &groups, &projections, constraints, &mut warnings);

        let starters: Vec<ScoredPlayer> = chosen
            .iter()
            .filter_map(|&i| {
                let proj = &projections[i];
                players.iter().find(|p| p.id == proj.player_id).map(|p| ScoredPlayer {
                    total_points: proj.projected_season_points,
                    value_per_cost: proj.value_per_cost,
                    ..p.clone()
                })
            })
            .collect();
        let mut lineup = Lineup::from_starters(starters, constraints);

        if lineup.total_cost > constraints.max_budget {
            warnings.push(LineupWarning::OverBudget {
                total_cost: lineup.total_cost,
                max_budget: constraints.max_budget,
            });
        }
        if lineup.starters.len() < slots {
            warnings.push(LineupWarning::PartialLineup {
                selected: lineup.starters.len(),
                required: slots,
            });
        }
        lineup.warnings = warnings;

        NonlinearResult {
            lineup,
            model,
            projections,
            iterations,
            converged,
            repairs,
        }
    }
}

fn sort_by_value_desc(indices: &mut [usize], projections: &[Projection]) {
    indices.sort_by(|&a, &b| {
        projections[b]
            .value_per_cost
            .partial_cmp(&projections[a].value_per_cost)
            .unwrap_or(Ordering::Equal)
    });
}

/// Bring each position to its quota: add the best unselected players by
/// value per cost where short, drop the worst where over.
fn repair_positions(
    chosen: &mut Vec<usize>,
    groups: &BTreeMap<Position, Vec<usize>>,
    projections: &[Projection],
    constraints: &LineupConstraints,
    warnings: &mut Vec<LineupWarning>,
) -> Vec<RepairAction> {
    let mut actions = Vec::new();

    // Players in positions without a quota never belong in the lineup.
    let (kept, stray): (Vec<usize>, Vec<usize>) = chosen
        .iter()
        .partition(|&&i| constraints.required(projections[i].position) > 0);
    for i in stray {
        actions.push(RepairAction::Dropped {
            player_id: projections[i].player_id,
            position: projections[i].position,
        });
    }
    *chosen = kept;

    for (&position, &required) in &constraints.required_positions {
        let mut in_position: Vec<usize> = chosen
            .iter()
            .copied()
            .filter(|&i| projections[i].position == position)
            .collect();

        if in_position.len() > required {
            sort_by_value_desc(&mut in_position, projections);
            for &i in &in_position[required..] {
                debug!(%position, player_id = projections[i].player_id, "repair: dropping");
                actions.push(RepairAction::Dropped {
                    player_id: projections[i].player_id,
                    position,
                });
            }
            let drop: HashSet<usize> = in_position[required..].iter().copied().collect();
            chosen.retain(|i| !drop.contains(i));
        } else if in_position.len() < required {
            let selected: HashSet<usize> = chosen.iter().copied().collect();
            let mut available: Vec<usize> = groups
                .get(&position)
                .map(|g| g.iter().copied().filter(|i| !selected.contains(i)).collect())
                .unwrap_or_default();
            sort_by_value_desc(&mut available, projections);
            let deficit = required - in_position.len();
            for &i in available.iter().take(deficit) {
                debug!(%position, player_id = projections[i].player_id, "repair: adding");
                actions.push(RepairAction::Added {
                    player_id: projections[i].player_id,
                    position,
                });
                chosen.push(i);
            }
            let filled = in_position.len() + available.len().min(deficit);
            if filled < required {
                warn!(%position, filled, required, "position underfilled after repair");
                warnings.push(LineupWarning::UnderfilledPosition {
                    position,
                    required,
                    selected: filled,
                });
            }
        }
    }
    actions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
