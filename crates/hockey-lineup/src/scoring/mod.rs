// Fantasy scoring: stat lookup, season blending, scoring tables, and the
// engine that turns raw records into scored players.

pub mod blend;
pub mod engine;
pub mod rules;
pub mod stats;
