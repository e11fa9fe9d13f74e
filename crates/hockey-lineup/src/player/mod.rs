// Player identity, raw statistics shapes, and position normalization.

pub mod position;
pub mod record;
