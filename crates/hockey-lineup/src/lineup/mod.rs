// Lineup selection: constraints, the greedy/swap optimizer, the nonlinear
// relaxation solver, and report rendering.

pub mod constraints;
pub mod greedy;
pub mod nonlinear;
pub mod report;
