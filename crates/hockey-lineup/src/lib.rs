// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod config;
pub mod history;
pub mod lineup;
pub mod loader;
pub mod player;
pub mod scoring;
