// Greedy lineup construction with swap-based local search.
//
// One call runs Init → GroupByPosition → GreedyFill → SwapOptimize →
// SelectSubstitutes → Done. Nothing is printed: progress is recorded as
// `OptimizerEvent`s and problems as `LineupWarning`s on the returned lineup.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use crate::lineup::constraints::LineupConstraints;
use crate::player::position::Position;
use crate::scoring::engine::ScoredPlayer;

/// Effective-point gains below this are treated as no gain.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Metric players are ranked by during greedy fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    ValuePerCost,
    TotalPoints,
}

impl RankMetric {
    pub fn of(&self, player: &ScoredPlayer) -> f64 {
        match self {
            RankMetric::ValuePerCost => player.value_per_cost,
            RankMetric::TotalPoints => player.total_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub rank_by: RankMetric,
    /// Maximum number of swap passes.
    pub swap_iteration_cap: usize,
    /// Swaps may push cost up to `max_budget * (1 + slack)`.
    pub exploration_slack: f64,
    pub substitutes: bool,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            rank_by: RankMetric::ValuePerCost,
            swap_iteration_cap: 1000,
            exploration_slack: 0.15,
            substitutes: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Lineup result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LineupRole {
    Starter,
    /// The highest-scoring starter. Reporting only.
    Captain,
    /// Backup for the starter with the given player id.
    Substitute { replaces: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct LineupEntry {
    pub player: ScoredPlayer,
    #[serde(flatten)]
    pub role: LineupRole,
}

/// Non-fatal conditions the caller may want to act on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum LineupWarning {
    /// No player had both a price and a positive ranking metric.
    NoValidPlayers,
    UnderfilledPosition {
        position: Position,
        required: usize,
        selected: usize,
    },
    /// The position had no more candidates than slots; all were taken
    /// without considering the budget.
    NoAlternatives {
        position: Position,
        candidates: usize,
        required: usize,
    },
    /// Best effort exceeded the budget cap.
    OverBudget { total_cost: f64, max_budget: f64 },
    PartialLineup { selected: usize, required: usize },
}

impl fmt::Display for LineupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineupWarning::NoValidPlayers => {
                write!(f, "no players with both a price and a positive value")
            }
            LineupWarning::UnderfilledPosition {
                position,
                required,
                selected,
            } => write!(f, "only {selected}/{required} {position} slots filled"),
            LineupWarning::NoAlternatives {
                position,
                candidates,
                required,
            } => write!(
                f,
                "{position}: {candidates} candidates for {required} slots, no alternatives to optimize"
            ),
            LineupWarning::OverBudget {
                total_cost,
                max_budget,
            } => write!(f, "lineup cost {total_cost:.2} exceeds cap {max_budget:.2}"),
            LineupWarning::PartialLineup { selected, required } => {
                write!(f, "partial lineup: {selected} of {required} players")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimizerPhase {
    Init,
    GroupByPosition,
    GreedyFill,
    SwapOptimize,
    SelectSubstitutes,
    Done,
}

/// Structured progress record, rendered by the CLI when asked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OptimizerEvent {
    Phase {
        phase: OptimizerPhase,
    },
    Grouped {
        position: Position,
        candidates: usize,
    },
    Selected {
        player_id: usize,
        position: Position,
        price: f64,
        /// Picked while scanning past an unaffordable higher-ranked player.
        alternate: bool,
    },
    SlotUnaffordable {
        position: Position,
        slot: usize,
    },
    Swapped {
        out_id: usize,
        in_id: usize,
        effective_before: f64,
        effective_after: f64,
    },
    SwapCapReached {
        passes: usize,
    },
    SubstituteChosen {
        starter_id: usize,
        substitute_id: usize,
    },
}

/// A selected lineup with its derived totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Lineup {
    pub starters: Vec<LineupEntry>,
    pub substitutes: Vec<LineupEntry>,
    /// Starters only; substitutes never count toward cost or points.
    pub total_cost: f64,
    pub raw_points: f64,
    pub penalty: f64,
    pub effective_points: f64,
    /// Player id of the captain.
    pub captain: Option<usize>,
    pub warnings: Vec<LineupWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<OptimizerEvent>,
}

impl Lineup {
    /// Build a lineup from starters, computing totals and the captain.
    pub fn from_starters(starters: Vec<ScoredPlayer>, constraints: &LineupConstraints) -> Self {
        let total_cost: f64 = starters.iter().map(|p| p.price).sum();
        let raw_points: f64 = starters.iter().map(|p| p.total_points).sum();
        let captain = pick_captain(&starters);
        let starters = starters
            .into_iter()
            .map(|player| LineupEntry {
                role: if Some(player.id) == captain {
                    LineupRole::Captain
                } else {
                    LineupRole::Starter
                },
                player,
            })
            .collect();
        Lineup {
            starters,
            total_cost,
            raw_points,
            penalty: constraints.budget_penalty(total_cost),
            effective_points: constraints.effective_points(raw_points, total_cost),
            captain,
            ..Default::default()
        }
    }

    pub fn count(&self, position: Position) -> usize {
        self.starters
            .iter()
            .filter(|e| e.player.position == position)
            .count()
    }

    /// Whether every position quota is met exactly.
    pub fn is_complete(&self, constraints: &LineupConstraints) -> bool {
        constraints
            .required_positions
            .iter()
            .all(|(&pos, &n)| self.count(pos) == n)
    }

    pub fn captain_entry(&self) -> Option<&LineupEntry> {
        self.starters
            .iter()
            .find(|e| e.role == LineupRole::Captain)
    }

    /// Ids of every player in the lineup, starters then substitutes.
    pub fn player_ids(&self) -> Vec<usize> {
        self.starters
            .iter()
            .chain(&self.substitutes)
            .map(|e| e.player.id)
            .collect()
    }

    pub fn has_warning(&self, predicate: impl Fn(&LineupWarning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }
}

fn pick_captain(starters: &[ScoredPlayer]) -> Option<usize> {
    let mut best: Option<&ScoredPlayer> = None;
    for player in starters {
        if best.map_or(true, |b| player.total_points > b.total_points) {
            best = Some(player);
        }
    }
    best.map(|p| p.id)
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct LineupOptimizer {
    pub settings: OptimizerSettings,
}

impl LineupOptimizer {
    pub fn new(settings: OptimizerSettings) -> Self {
        LineupOptimizer { settings }
    }

    /// Select a lineup from scored players under the given constraints.
    ///
    /// Always returns a best-effort lineup; shortfalls are reported through
    /// `Lineup::warnings`.
    pub fn optimize(&self, players: &[ScoredPlayer], constraints: &LineupConstraints) -> Lineup {
        let mut events = vec![OptimizerEvent::Phase {
            phase: OptimizerPhase::Init,
        }];
        let mut warnings = Vec::new();
        let metric = self.settings.rank_by;

        let valid: Vec<&ScoredPlayer> = players
            .iter()
            .filter(|p| p.is_priced() && metric.of(p) > 0.0 && !p.name.trim().is_empty())
            .collect();
        if valid.is_empty() {
            warn!(total = players.len(), "no valid players for lineup optimization");
            events.push(OptimizerEvent::Phase {
                phase: OptimizerPhase::Done,
            });
            return Lineup {
                warnings: vec![
                    LineupWarning::NoValidPlayers,
                    LineupWarning::PartialLineup {
                        selected: 0,
                        required: constraints.total_required(),
                    },
                ],
                events,
                ..Default::default()
            };
        }

        // -- GroupByPosition --
        events.push(OptimizerEvent::Phase {
            phase: OptimizerPhase::GroupByPosition,
        });
        let groups = group_and_rank(&valid, metric);
        for (&position, group) in &groups {
            events.push(OptimizerEvent::Grouped {
                position,
                candidates: group.len(),
            });
        }

        // -- GreedyFill --
        events.push(OptimizerEvent::Phase {
            phase: OptimizerPhase::GreedyFill,
        });
        let mut selected = self.greedy_fill(&groups, constraints, &mut events, &mut warnings);

        // -- SwapOptimize --
        events.push(OptimizerEvent::Phase {
            phase: OptimizerPhase::SwapOptimize,
        });
        self.swap_optimize(&mut selected, &groups, constraints, &mut events);

        let starters: Vec<ScoredPlayer> = selected.iter().map(|p| (*p).clone()).collect();
        let mut lineup = Lineup::from_starters(starters, constraints);

        // -- SelectSubstitutes --
        if self.settings.substitutes {
            events.push(OptimizerEvent::Phase {
                phase: OptimizerPhase::SelectSubstitutes,
            });
            lineup.substitutes = select_substitutes(&selected, &groups, &mut events);
        }

        if lineup.total_cost > constraints.max_budget {
            warnings.push(LineupWarning::OverBudget {
                total_cost: lineup.total_cost,
                max_budget: constraints.max_budget,
            });
        }
        let required = constraints.total_required();
        if lineup.starters.len() < required {
            warn!(selected = lineup.starters.len(), required, "partial lineup");
            warnings.push(LineupWarning::PartialLineup {
                selected: lineup.starters.len(),
                required,
            });
        }

        events.push(OptimizerEvent::Phase {
            phase: OptimizerPhase::Done,
        });
        lineup.warnings = warnings;
        lineup.events = events;
        lineup
    }

    fn greedy_fill<'a>(
        &self,
        groups: &BTreeMap<Position, Vec<&'a ScoredPlayer>>,
        constraints: &LineupConstraints,
        events: &mut Vec<OptimizerEvent>,
        warnings: &mut Vec<LineupWarning>,
    ) -> Vec<&'a ScoredPlayer> {
        let mut selected: Vec<&'a ScoredPlayer> = Vec::new();
        let mut running_cost = 0.0;

        for (&position, &required) in &constraints.required_positions {
            if required == 0 {
                continue;
            }
            let ranked: &[&'a ScoredPlayer] = groups.get(&position).map(Vec::as_slice).unwrap_or(&[]);

            let mut filled = 0;
            if ranked.len() <= required {
                // Nothing to choose between: take everyone.
                if !ranked.is_empty() {
                    debug!(%position, candidates = ranked.len(), required, "no alternatives, taking all");
                    warnings.push(LineupWarning::NoAlternatives {
                        position,
                        candidates: ranked.len(),
                        required,
                    });
                }
                for &player in ranked {
                    running_cost += player.price;
                    selected.push(player);
                    filled += 1;
                    events.push(OptimizerEvent::Selected {
                        player_id: player.id,
                        position,
                        price: player.price,
                        alternate: false,
                    });
                }
            } else {
                let mut taken = vec![false; ranked.len()];
                for i in 0..ranked.len() {
                    if filled == required {
                        break;
                    }
                    if taken[i] {
                        continue;
                    }
                    let pick = if running_cost + ranked[i].price <= constraints.max_budget {
                        Some((i, false))
                    } else {
                        (i + 1..ranked.len())
                            .find(|&j| {
                                !taken[j] && running_cost + ranked[j].price <= constraints.max_budget
                            })
                            .map(|j| (j, true))
                    };
                    let Some((idx, alternate)) = pick else {
                        // Nothing further down the list fits either.
                        events.push(OptimizerEvent::SlotUnaffordable {
                            position,
                            slot: filled + 1,
                        });
                        break;
                    };
                    taken[idx] = true;
                    let player = ranked[idx];
                    running_cost += player.price;
                    selected.push(player);
                    filled += 1;
                    events.push(OptimizerEvent::Selected {
                        player_id: player.id,
                        position,
                        price: player.price,
                        alternate,
                    });
                }
            }

            if filled < required {
                warn!(%position, filled, required, "position underfilled");
                warnings.push(LineupWarning::UnderfilledPosition {
                    position,
                    required,
                    selected: filled,
                });
            }
        }
        selected
    }

    fn swap_optimize<'a>(
        &self,
        selected: &mut [&'a ScoredPlayer],
        groups: &BTreeMap<Position, Vec<&'a ScoredPlayer>>,
        constraints: &LineupConstraints,
        events: &mut Vec<OptimizerEvent>,
    ) {
        let cost_ceiling = constraints.max_budget * (1.0 + self.settings.exploration_slack);
        let mut cost: f64 = selected.iter().map(|p| p.price).sum();
        let mut raw: f64 = selected.iter().map(|p| p.total_points).sum();
        let mut in_lineup: HashSet<usize> = selected.iter().map(|p| p.id).collect();

        let mut passes = 0;
        loop {
            if passes >= self.settings.swap_iteration_cap {
                debug!(passes, "swap pass cap reached");
                events.push(OptimizerEvent::SwapCapReached { passes });
                return;
            }
            passes += 1;

            let current = constraints.effective_points(raw, cost);
            let mut accepted = None;
            'scan: for (slot, outgoing) in selected.iter().enumerate() {
                let Some(candidates) = groups.get(&outgoing.position) else {
                    continue;
                };
                for &incoming in candidates {
                    if in_lineup.contains(&incoming.id) {
                        continue;
                    }
                    let new_cost = cost - outgoing.price + incoming.price;
                    if new_cost > cost_ceiling {
                        continue;
                    }
                    let new_raw = raw - outgoing.total_points + incoming.total_points;
                    let candidate = constraints.effective_points(new_raw, new_cost);
                    if candidate > current + IMPROVEMENT_EPSILON {
                        accepted = Some((slot, incoming, new_cost, new_raw, candidate));
                        break 'scan;
                    }
                }
            }

            let Some((slot, incoming, new_cost, new_raw, after)) = accepted else {
                return;
            };
            let outgoing = selected[slot];
            debug!(
                out = %outgoing.name,
                incoming = %incoming.name,
                before = current,
                after,
                "accepted swap"
            );
            events.push(OptimizerEvent::Swapped {
                out_id: outgoing.id,
                in_id: incoming.id,
                effective_before: current,
                effective_after: after,
            });
            in_lineup.remove(&outgoing.id);
            in_lineup.insert(incoming.id);
            selected[slot] = incoming;
            cost = new_cost;
            raw = new_raw;
        }
    }
}

fn group_and_rank<'a>(
    players: &[&'a ScoredPlayer],
    metric: RankMetric,
) -> BTreeMap<Position, Vec<&'a ScoredPlayer>> {
    let mut groups: BTreeMap<Position, Vec<&'a ScoredPlayer>> = BTreeMap::new();
    for &player in players {
        groups.entry(player.position).or_default().push(player);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| {
            metric
                .of(b)
                .partial_cmp(&metric.of(a))
                .unwrap_or(Ordering::Equal)
        });
    }
    groups
}

/// For each starter, the best-scoring unused player of the same position
/// who costs strictly less.
fn select_substitutes(
    starters: &[&ScoredPlayer],
    groups: &BTreeMap<Position, Vec<&ScoredPlayer>>,
    events: &mut Vec<OptimizerEvent>,
) -> Vec<LineupEntry> {
    let mut used: HashSet<usize> = starters.iter().map(|p| p.id).collect();
    let mut substitutes = Vec::new();

    for starter in starters {
        let best = groups
            .get(&starter.position)
            .into_iter()
            .flatten()
            .copied()
            .filter(|p| !used.contains(&p.id) && p.price < starter.price)
            .fold(None::<&ScoredPlayer>, |best, p| match best {
                Some(b) if b.total_points >= p.total_points => Some(b),
                _ => Some(p),
            });
        if let Some(sub) = best {
            used.insert(sub.id);
            events.push(OptimizerEvent::SubstituteChosen {
                starter_id: starter.id,
                substitute_id: sub.id,
            });
            substitutes.push(LineupEntry {
                player: sub.clone(),
                role: LineupRole::Substitute {
                    replaces: starter.id,
                },
            });
        }
    }
    substitutes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
